//! Transaction registration: deciding whether a transaction seen on the
//! network is relevant to the wallet, persisting it when it is, and
//! notifying every interested address space.

use std::collections::HashSet;
use std::sync::Arc;

use crate::account::RelevanceSource;
use crate::error::StorageResult;
use crate::events::WalletEvent;
use crate::index::AddressIndex;
use crate::types::{Tx, TxNotificationType};

impl AddressIndex {
    /// Evaluate a transaction against every wallet address space, persist
    /// it when relevant, and notify listeners.
    ///
    /// Returns whether the transaction counts as registered for the
    /// wallet. Transactions conflicting with confirmed history are
    /// rejected outright. Monitored HD account relevance persists the
    /// transaction but does not by itself mark it registered.
    pub fn register_tx(&self, tx: &Tx, kind: TxNotificationType) -> StorageResult<bool> {
        if self.storage.is_double_spend_with_confirmed(tx)? {
            tracing::warn!(
                tx = %tx.tx_hash,
                "transaction double spends confirmed history, rejected"
            );
            return Ok(false);
        }

        let mut guard = self.locked();
        let inner = &mut *guard;
        self.absorb_derived(inner);

        let in_addresses = self.resolve_input_addresses(tx)?;
        // A locally originated send is persisted whole: the wallet needs
        // the full output list to account for change and fees.
        let compressed = if kind == TxNotificationType::Send {
            tx.clone()
        } else {
            self.compress_tx(inner, tx.clone(), &in_addresses)
        };

        let related: Vec<(Arc<dyn RelevanceSource>, HashSet<String>)> = inner
            .relevance_sources()
            .into_iter()
            .map(|source| {
                let set: HashSet<String> = source
                    .related_addresses(&compressed, &in_addresses)
                    .into_iter()
                    .collect();
                (source, set)
            })
            .collect();

        let mut touched_global: HashSet<String> = HashSet::new();
        let mut touched: Vec<HashSet<String>> = vec![HashSet::new(); related.len()];
        for address in compressed.out_addresses() {
            if inner.membership.contains(&address) {
                touched_global.insert(address.clone());
            }
            for (i, (_, related_set)) in related.iter().enumerate() {
                if related_set.contains(&address) {
                    touched[i].insert(address.clone());
                }
            }
        }

        let registered;
        if let Some(stored) = self.storage.find_tx_by_hash(&tx.tx_hash)? {
            // Already known: only outputs the stored copy lacks can
            // produce fresh notifications.
            for address in stored.out_addresses() {
                touched_global.remove(&address);
                for set in &mut touched {
                    set.remove(&address);
                }
            }
            registered = true;
        } else {
            // First sight: the spending side makes a transaction ours too.
            for address in &in_addresses {
                if inner.membership.contains(address) {
                    touched_global.insert(address.clone());
                }
                for (i, (_, related_set)) in related.iter().enumerate() {
                    if related_set.contains(address) {
                        touched[i].insert(address.clone());
                    }
                }
            }
            registered = !touched_global.is_empty()
                || related
                    .iter()
                    .zip(&touched)
                    .any(|((source, _), set)| source.gates_registration() && !set.is_empty());
        }

        let any_touched = !touched_global.is_empty() || touched.iter().any(|set| !set.is_empty());
        if any_touched {
            self.storage.persist_tx(&compressed)?;
            tracing::info!(tx = %tx.tx_hash, kind = %kind, "transaction persisted");
        }

        // Listeners always receive the original, uncompressed transaction.
        for address in &touched_global {
            self.events.emit(WalletEvent::AddressTx {
                address: address.clone(),
                tx_hash: tx.tx_hash,
                kind,
            });
        }
        for ((source, _), set) in related.iter().zip(&touched) {
            if !set.is_empty() {
                let list: Vec<String> = set.iter().cloned().collect();
                source.on_new_tx(tx, &list, kind);
            }
        }

        Ok(registered)
    }

    /// Whether the transaction touches any tracked address or consulted
    /// account address space, without registering it.
    pub fn is_tx_related(&self, tx: &Tx) -> StorageResult<bool> {
        let in_addresses = self.resolve_input_addresses(tx)?;
        let inner = self.locked();
        for address in self.all_addresses_inner(&inner) {
            if self.address_contains_tx(address.address(), tx)? {
                return Ok(true);
            }
        }
        for source in inner.relevance_sources() {
            if !source.related_addresses(tx, &in_addresses).is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn address_contains_tx(&self, address: &str, tx: &Tx) -> StorageResult<bool> {
        if tx.out_addresses().iter().any(|a| a == address) {
            return Ok(true);
        }
        self.storage.is_address_contains_tx(address, tx)
    }

    /// Resolve each input to the address paid by the output it spends,
    /// using previously stored transactions. Unknown outpoints are
    /// skipped rather than failing the evaluation.
    fn resolve_input_addresses(&self, tx: &Tx) -> StorageResult<Vec<String>> {
        let mut addresses = Vec::new();
        for input in &tx.ins {
            if let Some(prev) = self.storage.find_tx_by_hash(&input.prev_tx_hash)? {
                if let Some(address) = prev
                    .out_by_sn(input.prev_out_sn)
                    .and_then(|out| out.out_address.clone())
                {
                    addresses.push(address);
                }
            }
        }
        Ok(addresses)
    }
}
