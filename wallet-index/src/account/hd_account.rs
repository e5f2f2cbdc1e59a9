//! HD account address spaces: the seed-derived account, its monitored
//! variant and the desktop HDM keychain all expose the same set-of-strings
//! shape and differ only in scope.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::account::{AccountScope, DerivedAddressSender, RelevanceSource};
use crate::types::{Tx, TxHash, TxNotificationType};

/// A seed-derived address space generating addresses on demand.
///
/// Covers the HD account, the HD account (monitored) and the desktop HDM
/// keychain, distinguished by [`AccountScope`]. Addresses derived after
/// construction are reported to the index through the addresses-added
/// channel.
pub struct HdAccount {
    scope: AccountScope,
    seed_id: u32,
    addresses: Mutex<HashSet<String>>,
    sync_complete: AtomicBool,
    notified: Mutex<Vec<(TxHash, Vec<String>, TxNotificationType)>>,
    derived_tx: DerivedAddressSender,
}

impl HdAccount {
    /// Create an account for the given scope over an initial address set.
    pub fn new(
        scope: AccountScope,
        seed_id: u32,
        addresses: impl IntoIterator<Item = String>,
        derived_tx: DerivedAddressSender,
    ) -> Self {
        Self {
            scope,
            seed_id,
            addresses: Mutex::new(addresses.into_iter().collect()),
            sync_complete: AtomicBool::new(false),
            notified: Mutex::new(Vec::new()),
            derived_tx,
        }
    }

    /// Identifier of the stored seed this account was constructed from.
    pub fn seed_id(&self) -> u32 {
        self.seed_id
    }

    /// Snapshot of the addresses currently exposed by this account.
    pub fn addresses(&self) -> Vec<String> {
        self.locked_addresses().iter().cloned().collect()
    }

    /// Number of addresses currently exposed.
    pub fn address_count(&self) -> usize {
        self.locked_addresses().len()
    }

    /// Whether the given address string belongs to this account.
    pub fn contains(&self, address: &str) -> bool {
        self.locked_addresses().contains(address)
    }

    /// Record newly derived addresses and report them to the index.
    pub fn add_addresses(&self, addresses: Vec<String>) {
        if addresses.is_empty() {
            return;
        }
        {
            let mut set = self.locked_addresses();
            set.extend(addresses.iter().cloned());
        }
        tracing::debug!(
            scope = self.scope.name(),
            count = addresses.len(),
            "derived new account addresses"
        );
        // The index drains this channel before every relevance evaluation;
        // a dropped index just means nobody is listening anymore.
        let _ = self.derived_tx.send(addresses);
    }

    /// Flip the sync-complete flag for this account.
    pub fn set_sync_complete(&self, complete: bool) {
        self.sync_complete.store(complete, Ordering::SeqCst);
    }

    /// Transactions this account has been notified about, oldest first.
    pub fn notified_txs(&self) -> Vec<(TxHash, Vec<String>, TxNotificationType)> {
        self.notified.lock().expect("hd account lock poisoned").clone()
    }

    fn locked_addresses(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.addresses.lock().expect("hd account lock poisoned")
    }
}

impl RelevanceSource for HdAccount {
    fn scope(&self) -> AccountScope {
        self.scope
    }

    fn related_addresses(&self, tx: &Tx, in_addresses: &[String]) -> Vec<String> {
        let set = self.locked_addresses();
        let mut related = Vec::new();
        let mut seen = HashSet::new();
        for address in tx.out_addresses().iter().chain(in_addresses.iter()) {
            if set.contains(address) && seen.insert(address.clone()) {
                related.push(address.clone());
            }
        }
        related
    }

    fn belongs_here(&self, addresses: &[String]) -> HashSet<String> {
        let set = self.locked_addresses();
        addresses.iter().filter(|a| set.contains(*a)).cloned().collect()
    }

    fn is_send_from_here(&self, in_addresses: &[String]) -> bool {
        let set = self.locked_addresses();
        in_addresses.iter().any(|a| set.contains(a))
    }

    fn on_new_tx(&self, tx: &Tx, related: &[String], kind: TxNotificationType) {
        tracing::debug!(
            scope = self.scope.name(),
            tx = %tx.tx_hash,
            touched = related.len(),
            kind = %kind,
            "account notified of transaction"
        );
        self.notified
            .lock()
            .expect("hd account lock poisoned")
            .push((tx.tx_hash, related.to_vec(), kind));
    }

    fn is_sync_complete(&self) -> bool {
        self.sync_complete.load(Ordering::SeqCst)
    }

    fn gates_registration(&self) -> bool {
        // Monitored accounts gate persistence but not the registered flag.
        self.scope != AccountScope::HdAccountMonitored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxOut;
    use crossbeam_channel::unbounded;

    fn account(scope: AccountScope, addresses: &[&str]) -> (HdAccount, crossbeam_channel::Receiver<Vec<String>>) {
        let (tx, rx) = unbounded();
        let account = HdAccount::new(scope, 1, addresses.iter().map(|s| s.to_string()), tx);
        (account, rx)
    }

    fn tx_to(addresses: &[&str]) -> Tx {
        let mut tx = Tx::new(TxHash::new([7u8; 32]));
        for (sn, address) in addresses.iter().enumerate() {
            tx.outs.push(TxOut {
                out_sn: sn as u32,
                out_address: Some(address.to_string()),
                value: 1000,
            });
        }
        tx
    }

    #[test]
    fn related_addresses_covers_outputs_and_inputs() {
        let (account, _rx) = account(AccountScope::HdAccount, &["hd-1", "hd-2"]);
        let tx = tx_to(&["hd-1", "external"]);
        let related = account.related_addresses(&tx, &["hd-2".to_string()]);
        assert_eq!(related.len(), 2);
        assert!(related.contains(&"hd-1".to_string()));
        assert!(related.contains(&"hd-2".to_string()));
    }

    #[test]
    fn derived_addresses_reach_the_channel() {
        let (account, rx) = account(AccountScope::HdAccount, &[]);
        account.add_addresses(vec!["hd-9".to_string()]);
        assert_eq!(rx.try_recv().unwrap(), vec!["hd-9".to_string()]);
        assert!(account.is_send_from_here(&["hd-9".to_string()]));
    }

    #[test]
    fn empty_derivation_sends_nothing() {
        let (account, rx) = account(AccountScope::HdAccount, &[]);
        account.add_addresses(Vec::new());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn monitored_accounts_do_not_gate_registration() {
        let (plain, _rx1) = account(AccountScope::HdAccount, &[]);
        let (monitored, _rx2) = account(AccountScope::HdAccountMonitored, &[]);
        let (desktop, _rx3) = account(AccountScope::DesktopHdm, &[]);
        assert!(plain.gates_registration());
        assert!(!monitored.gates_registration());
        assert!(desktop.gates_registration());
    }

    #[test]
    fn on_new_tx_is_recorded() {
        let (account, _rx) = account(AccountScope::HdAccount, &["hd-1"]);
        let tx = tx_to(&["hd-1"]);
        account.on_new_tx(&tx, &["hd-1".to_string()], TxNotificationType::Receive);
        let notified = account.notified_txs();
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].0, tx.tx_hash);
        assert_eq!(notified[0].2, TxNotificationType::Receive);
    }
}
