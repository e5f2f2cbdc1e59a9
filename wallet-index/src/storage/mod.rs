//! Storage abstraction consumed by the address index.
//!
//! The index owns no persistence of its own; everything durable goes through
//! this trait. Implementations are assumed synchronous, fast and locally
//! consistent.

pub mod memory;

pub use memory::MemoryStorage;

use std::collections::{HashMap, HashSet};

use crate::account::AccountScope;
use crate::address::Address;
use crate::error::StorageResult;
use crate::types::{Tx, TxHash};

/// Contract between the address index and its storage collaborator.
pub trait WalletStorage: Send + Sync {
    /// Load every classic address ever created, trashed ones included,
    /// ordered by descending sort time.
    fn load_addresses(&self) -> StorageResult<Vec<Address>>;

    /// Identifiers of the stored seeds (or enterprise ids) for the given
    /// account scope. The index binds only the first.
    fn load_account_ids(&self, scope: AccountScope) -> StorageResult<Vec<u32>>;

    /// Address strings currently derived for an HD-style account scope.
    fn load_account_addresses(&self, scope: AccountScope, id: u32) -> StorageResult<Vec<String>>;

    /// Full address entities of an HDM-style keychain.
    fn load_keychain_addresses(&self, scope: AccountScope, id: u32) -> StorageResult<Vec<Address>>;

    /// User-assigned labels keyed by address string.
    fn load_aliases(&self) -> StorageResult<HashMap<String, String>>;

    /// Vanity prefix lengths keyed by address string.
    fn load_vanity_lens(&self) -> StorageResult<HashMap<String, u32>>;

    /// Persist a newly added address.
    fn persist_address(&self, address: &Address) -> StorageResult<()>;

    /// Mark a stored address as trashed. Addresses are never physically
    /// deleted once created; trash is a soft state.
    fn trash_address(&self, address: &str) -> StorageResult<()>;

    /// Clear the trashed state of a stored address and record its new
    /// sort time.
    fn restore_address(&self, address: &Address) -> StorageResult<()>;

    /// Permanently remove a watch-only address.
    fn remove_watch_only_address(&self, address: &str) -> StorageResult<()>;

    /// Whether the transaction conflicts with an already-confirmed
    /// transaction by spending one of its inputs.
    fn is_double_spend_with_confirmed(&self, tx: &Tx) -> StorageResult<bool>;

    /// Look up a stored transaction by hash.
    fn find_tx_by_hash(&self, hash: &TxHash) -> StorageResult<Option<Tx>>;

    /// Persist a transaction (possibly compressed).
    fn persist_tx(&self, tx: &Tx) -> StorageResult<()>;

    /// Whether the stored history relates the given address to the
    /// transaction (beyond its in-memory outputs).
    fn is_address_contains_tx(&self, address: &str, tx: &Tx) -> StorageResult<bool>;

    /// The subset of the given addresses that belong to the account scope
    /// according to stored derivation records.
    fn belongs_to_account(
        &self,
        scope: AccountScope,
        addresses: &[String],
    ) -> StorageResult<HashSet<String>>;
}
