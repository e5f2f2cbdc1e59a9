//! Event fan-out from the index to the rest of the application.
//!
//! Listeners subscribe to a bus and receive every event emitted after they
//! subscribed. Late subscribers do not receive past events.

use std::sync::Mutex;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::types::{TxHash, TxNotificationType};

/// Events emitted by the address index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// Fired exactly once, after initialization completes: the index is
    /// ready for use by the rest of the application.
    Ready,
    /// A registered transaction touched one of the wallet's addresses.
    AddressTx {
        address: String,
        tx_hash: TxHash,
        kind: TxNotificationType,
    },
}

/// Broadcast bus delivering each emitted event to every subscriber.
#[derive(Debug)]
pub struct EventBus<T: Clone> {
    subscribers: Mutex<Vec<Sender<T>>>,
}

impl<T: Clone> EventBus<T> {
    /// Create an empty bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Create a new subscriber to receive events.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().expect("event bus lock poisoned").push(tx);
        rx
    }

    /// Emit an event to all subscribers, dropping any that disconnected.
    pub fn emit(&self, event: T) {
        let mut subscribers = self.subscribers.lock().expect("event bus lock poisoned");
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
