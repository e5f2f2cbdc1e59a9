//! The address entity tracked by the index.

use core::fmt;
use core::hash::{Hash, Hasher};

/// One classic, watch-only or HDM wallet address.
///
/// Identity is the address string alone: two `Address` values compare equal
/// when their strings match, whatever the rest of their state. An address
/// string lives in exactly one of the active key-controlled, watch-only or
/// trashed lists of the index.
#[derive(Debug, Clone)]
pub struct Address {
    address: String,
    has_priv_key: bool,
    is_hdm: bool,
    trashed: bool,
    sort_time: u64,
    sync_complete: bool,
    balance: u64,
    alias: Option<String>,
    vanity_len: Option<u32>,
}

impl Address {
    /// Create an active key-controlled address.
    pub fn with_priv_key(address: impl Into<String>) -> Self {
        Self::new(address, true, false)
    }

    /// Create a watch-only address.
    pub fn watch_only(address: impl Into<String>) -> Self {
        Self::new(address, false, false)
    }

    /// Create an address belonging to an HDM keychain.
    pub fn hdm(address: impl Into<String>) -> Self {
        Self::new(address, true, true)
    }

    fn new(address: impl Into<String>, has_priv_key: bool, is_hdm: bool) -> Self {
        Self {
            address: address.into(),
            has_priv_key,
            is_hdm,
            trashed: false,
            sort_time: 0,
            sync_complete: false,
            balance: 0,
            alias: None,
            vanity_len: None,
        }
    }

    /// The address string.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the wallet holds spending authority for this address.
    pub fn has_priv_key(&self) -> bool {
        self.has_priv_key
    }

    /// Whether this address belongs to an HDM keychain.
    pub fn is_hdm(&self) -> bool {
        self.is_hdm
    }

    /// Whether this address has been moved to the trash list.
    pub fn is_trashed(&self) -> bool {
        self.trashed
    }

    /// Monotonic ordering key; newest addresses sort first.
    pub fn sort_time(&self) -> u64 {
        self.sort_time
    }

    /// Whether history for this address is fully synchronized.
    pub fn is_sync_complete(&self) -> bool {
        self.sync_complete
    }

    /// Last known balance in base units.
    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Optional user-assigned label.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Length of the vanity prefix, if this is a vanity address.
    pub fn vanity_len(&self) -> Option<u32> {
        self.vanity_len
    }

    /// Set the trashed flag when restoring from storage.
    pub fn mark_trashed(mut self) -> Self {
        self.trashed = true;
        self
    }

    /// Set the sort time when restoring from storage.
    pub fn with_sort_time(mut self, sort_time: u64) -> Self {
        self.sort_time = sort_time;
        self
    }

    pub(crate) fn set_trashed(&mut self, trashed: bool) {
        self.trashed = trashed;
    }

    pub(crate) fn set_sort_time(&mut self, sort_time: u64) {
        self.sort_time = sort_time;
    }

    pub(crate) fn set_sync_complete(&mut self, sync_complete: bool) {
        self.sync_complete = sync_complete;
    }

    pub(crate) fn set_balance(&mut self, balance: u64) {
        self.balance = balance;
    }

    pub(crate) fn set_alias(&mut self, alias: Option<String>) {
        self.alias = alias;
    }

    pub(crate) fn set_vanity_len(&mut self, vanity_len: Option<u32>) {
        self.vanity_len = vanity_len;
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_the_address_string() {
        let a = Address::with_priv_key("addr-1").with_sort_time(10);
        let b = Address::watch_only("addr-1");
        assert_eq!(a, b);

        let c = Address::with_priv_key("addr-2");
        assert_ne!(a, c);
    }

    #[test]
    fn hdm_addresses_are_key_controlled() {
        let a = Address::hdm("hdm-1");
        assert!(a.has_priv_key());
        assert!(a.is_hdm());
        assert!(!a.is_trashed());
    }
}
