//! In-memory storage implementation.
//!
//! Backs the index in tests and in ephemeral setups where nothing has to
//! survive a restart.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::account::AccountScope;
use crate::address::Address;
use crate::error::StorageResult;
use crate::storage::WalletStorage;
use crate::types::{Tx, TxHash};

#[derive(Default)]
struct Inner {
    addresses: HashMap<String, Address>,
    account_ids: HashMap<AccountScope, Vec<u32>>,
    account_addresses: HashMap<(AccountScope, u32), Vec<String>>,
    keychain_addresses: HashMap<(AccountScope, u32), Vec<Address>>,
    aliases: HashMap<String, String>,
    vanity_lens: HashMap<String, u32>,
    txs: HashMap<TxHash, Tx>,
    // Outpoints consumed by confirmed transactions, keyed by
    // (prev tx hash, prev out sn), valued by the confirmed spender.
    spent_by_confirmed: HashMap<(TxHash, u32), TxHash>,
}

/// In-memory storage collaborator.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the stored ids for an account scope.
    pub fn seed_account_ids(&self, scope: AccountScope, ids: Vec<u32>) {
        self.locked().account_ids.insert(scope, ids);
    }

    /// Seed the derived address strings of an HD-style account.
    pub fn seed_account_addresses(&self, scope: AccountScope, id: u32, addresses: Vec<String>) {
        self.locked().account_addresses.insert((scope, id), addresses);
    }

    /// Seed the address entities of an HDM-style keychain.
    pub fn seed_keychain_addresses(&self, scope: AccountScope, id: u32, addresses: Vec<Address>) {
        self.locked().keychain_addresses.insert((scope, id), addresses);
    }

    /// Seed a stored alias.
    pub fn seed_alias(&self, address: &str, alias: &str) {
        self.locked().aliases.insert(address.to_string(), alias.to_string());
    }

    /// Seed a stored vanity length.
    pub fn seed_vanity_len(&self, address: &str, len: u32) {
        self.locked().vanity_lens.insert(address.to_string(), len);
    }

    /// Store a transaction and mark it confirmed, claiming its inputs.
    pub fn insert_confirmed_tx(&self, tx: Tx) {
        let mut inner = self.locked();
        for input in &tx.ins {
            inner
                .spent_by_confirmed
                .insert((input.prev_tx_hash, input.prev_out_sn), tx.tx_hash);
        }
        inner.txs.insert(tx.tx_hash, tx);
    }

    /// Store a transaction without confirming it.
    pub fn insert_tx(&self, tx: Tx) {
        self.locked().txs.insert(tx.tx_hash, tx);
    }

    /// Number of stored transactions.
    pub fn tx_count(&self) -> usize {
        self.locked().txs.len()
    }

    /// The stored record for an address string, if any.
    pub fn address_record(&self, address: &str) -> Option<Address> {
        self.locked().addresses.get(address).cloned()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory storage lock poisoned")
    }

    fn scope_membership(inner: &Inner, scope: AccountScope) -> HashSet<String> {
        let mut membership = HashSet::new();
        for ((s, _), addresses) in &inner.account_addresses {
            if *s == scope {
                membership.extend(addresses.iter().cloned());
            }
        }
        for ((s, _), addresses) in &inner.keychain_addresses {
            if *s == scope {
                membership.extend(addresses.iter().map(|a| a.address().to_string()));
            }
        }
        membership
    }
}

impl WalletStorage for MemoryStorage {
    fn load_addresses(&self) -> StorageResult<Vec<Address>> {
        let inner = self.locked();
        let mut addresses: Vec<Address> = inner.addresses.values().cloned().collect();
        addresses.sort_by(|a, b| b.sort_time().cmp(&a.sort_time()));
        Ok(addresses)
    }

    fn load_account_ids(&self, scope: AccountScope) -> StorageResult<Vec<u32>> {
        Ok(self.locked().account_ids.get(&scope).cloned().unwrap_or_default())
    }

    fn load_account_addresses(&self, scope: AccountScope, id: u32) -> StorageResult<Vec<String>> {
        Ok(self.locked().account_addresses.get(&(scope, id)).cloned().unwrap_or_default())
    }

    fn load_keychain_addresses(&self, scope: AccountScope, id: u32) -> StorageResult<Vec<Address>> {
        Ok(self.locked().keychain_addresses.get(&(scope, id)).cloned().unwrap_or_default())
    }

    fn load_aliases(&self) -> StorageResult<HashMap<String, String>> {
        Ok(self.locked().aliases.clone())
    }

    fn load_vanity_lens(&self) -> StorageResult<HashMap<String, u32>> {
        Ok(self.locked().vanity_lens.clone())
    }

    fn persist_address(&self, address: &Address) -> StorageResult<()> {
        self.locked().addresses.insert(address.address().to_string(), address.clone());
        Ok(())
    }

    fn trash_address(&self, address: &str) -> StorageResult<()> {
        if let Some(record) = self.locked().addresses.get_mut(address) {
            record.set_trashed(true);
        }
        Ok(())
    }

    fn restore_address(&self, address: &Address) -> StorageResult<()> {
        self.locked().addresses.insert(address.address().to_string(), address.clone());
        Ok(())
    }

    fn remove_watch_only_address(&self, address: &str) -> StorageResult<()> {
        self.locked().addresses.remove(address);
        Ok(())
    }

    fn is_double_spend_with_confirmed(&self, tx: &Tx) -> StorageResult<bool> {
        let inner = self.locked();
        Ok(tx.ins.iter().any(|input| {
            inner
                .spent_by_confirmed
                .get(&(input.prev_tx_hash, input.prev_out_sn))
                .is_some_and(|spender| *spender != tx.tx_hash)
        }))
    }

    fn find_tx_by_hash(&self, hash: &TxHash) -> StorageResult<Option<Tx>> {
        Ok(self.locked().txs.get(hash).cloned())
    }

    fn persist_tx(&self, tx: &Tx) -> StorageResult<()> {
        self.locked().txs.insert(tx.tx_hash, tx.clone());
        Ok(())
    }

    fn is_address_contains_tx(&self, address: &str, tx: &Tx) -> StorageResult<bool> {
        let inner = self.locked();
        if let Some(stored) = inner.txs.get(&tx.tx_hash) {
            if stored.out_addresses().iter().any(|a| a == address) {
                return Ok(true);
            }
        }
        for input in &tx.ins {
            if let Some(prev) = inner.txs.get(&input.prev_tx_hash) {
                let spends_address = prev
                    .out_by_sn(input.prev_out_sn)
                    .and_then(|out| out.out_address.as_deref())
                    .is_some_and(|a| a == address);
                if spends_address {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn belongs_to_account(
        &self,
        scope: AccountScope,
        addresses: &[String],
    ) -> StorageResult<HashSet<String>> {
        let inner = self.locked();
        let membership = Self::scope_membership(&inner, scope);
        Ok(addresses.iter().filter(|a| membership.contains(*a)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxIn;

    fn tx_spending(hash_byte: u8, prev: TxHash, prev_sn: u32) -> Tx {
        let mut tx = Tx::new(TxHash::new([hash_byte; 32]));
        tx.ins.push(TxIn {
            prev_tx_hash: prev,
            prev_out_sn: prev_sn,
        });
        tx
    }

    #[test]
    fn double_spend_against_confirmed_is_detected() {
        let storage = MemoryStorage::new();
        let prev = TxHash::new([9u8; 32]);

        let confirmed = tx_spending(1, prev, 0);
        storage.insert_confirmed_tx(confirmed.clone());

        let conflicting = tx_spending(2, prev, 0);
        assert!(storage.is_double_spend_with_confirmed(&conflicting).unwrap());

        // The confirmed transaction itself is not its own double spend.
        assert!(!storage.is_double_spend_with_confirmed(&confirmed).unwrap());

        // Spending a different output of the same transaction is fine.
        let sibling = tx_spending(3, prev, 1);
        assert!(!storage.is_double_spend_with_confirmed(&sibling).unwrap());
    }

    #[test]
    fn trash_flag_round_trips_through_storage() {
        let storage = MemoryStorage::new();
        let address = Address::with_priv_key("k1").with_sort_time(5);
        storage.persist_address(&address).unwrap();

        storage.trash_address("k1").unwrap();
        assert!(storage.address_record("k1").unwrap().is_trashed());

        storage.restore_address(&address).unwrap();
        assert!(!storage.address_record("k1").unwrap().is_trashed());
    }

    #[test]
    fn load_addresses_orders_newest_first() {
        let storage = MemoryStorage::new();
        storage.persist_address(&Address::with_priv_key("old").with_sort_time(1)).unwrap();
        storage.persist_address(&Address::with_priv_key("new").with_sort_time(2)).unwrap();

        let loaded = storage.load_addresses().unwrap();
        assert_eq!(loaded[0].address(), "new");
        assert_eq!(loaded[1].address(), "old");
    }

    #[test]
    fn belongs_to_account_filters_by_scope() {
        let storage = MemoryStorage::new();
        storage.seed_account_addresses(
            AccountScope::HdAccount,
            1,
            vec!["hd-1".to_string(), "hd-2".to_string()],
        );

        let query = vec!["hd-1".to_string(), "external".to_string()];
        let belong = storage.belongs_to_account(AccountScope::HdAccount, &query).unwrap();
        assert_eq!(belong.len(), 1);
        assert!(belong.contains("hd-1"));

        let other = storage.belongs_to_account(AccountScope::DesktopHdm, &query).unwrap();
        assert!(other.is_empty());
    }
}
