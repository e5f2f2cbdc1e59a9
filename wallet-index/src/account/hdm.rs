//! Multi-signature HDM keychains (classic and enterprise variants).
//!
//! Unlike the HD account spaces, keychain addresses are full [`Address`]
//! entities: they appear in the index's display ordering and carry trash,
//! sync and balance state. The classic and enterprise variants share this
//! shape and differ only in scope.

use std::sync::Mutex;

use crate::account::{AccountScope, DerivedAddressSender};
use crate::address::Address;

/// A multi-signature HDM keychain holding completed addresses.
pub struct HdmKeychain {
    scope: AccountScope,
    keychain_id: u32,
    addresses: Mutex<Vec<Address>>,
    derived_tx: DerivedAddressSender,
}

impl HdmKeychain {
    /// Create a classic HDM keychain over an initial address list.
    pub fn classic(
        keychain_id: u32,
        addresses: Vec<Address>,
        derived_tx: DerivedAddressSender,
    ) -> Self {
        Self::new(AccountScope::Hdm, keychain_id, addresses, derived_tx)
    }

    /// Create an enterprise HDM keychain over an initial address list.
    pub fn enterprise(
        keychain_id: u32,
        addresses: Vec<Address>,
        derived_tx: DerivedAddressSender,
    ) -> Self {
        Self::new(AccountScope::EnterpriseHdm, keychain_id, addresses, derived_tx)
    }

    fn new(
        scope: AccountScope,
        keychain_id: u32,
        addresses: Vec<Address>,
        derived_tx: DerivedAddressSender,
    ) -> Self {
        Self {
            scope,
            keychain_id,
            addresses: Mutex::new(addresses),
            derived_tx,
        }
    }

    /// Which keychain variant this is.
    pub fn scope(&self) -> AccountScope {
        self.scope
    }

    /// Identifier of the stored seed or enterprise id.
    pub fn keychain_id(&self) -> u32 {
        self.keychain_id
    }

    /// Snapshot of the live (non-trashed) keychain addresses.
    pub fn addresses(&self) -> Vec<Address> {
        self.locked().clone()
    }

    /// Number of live keychain addresses.
    pub fn address_count(&self) -> usize {
        self.locked().len()
    }

    /// Whether the given address string belongs to this keychain.
    pub fn contains(&self, address: &str) -> bool {
        self.locked().iter().any(|a| a.address() == address)
    }

    /// Record newly completed addresses and report them to the index.
    pub fn add_addresses(&self, addresses: Vec<Address>) {
        if addresses.is_empty() {
            return;
        }
        let strings: Vec<String> = addresses.iter().map(|a| a.address().to_string()).collect();
        {
            let mut list = self.locked();
            for address in addresses {
                if !list.contains(&address) {
                    list.push(address);
                }
            }
        }
        tracing::debug!(
            scope = self.scope.name(),
            count = strings.len(),
            "keychain completed new addresses"
        );
        let _ = self.derived_tx.send(strings);
    }

    /// Whether every live keychain address is fully synchronized.
    pub fn is_sync_complete(&self) -> bool {
        self.locked().iter().all(|a| a.is_sync_complete())
    }

    pub(crate) fn remove_address(&self, address: &str) -> Option<Address> {
        let mut list = self.locked();
        let position = list.iter().position(|a| a.address() == address)?;
        Some(list.remove(position))
    }

    pub(crate) fn restore_address(&self, address: Address) {
        let mut list = self.locked();
        if !list.contains(&address) {
            list.push(address);
        }
    }

    pub(crate) fn with_address_mut<R>(
        &self,
        address: &str,
        f: impl FnOnce(&mut Address) -> R,
    ) -> Option<R> {
        let mut list = self.locked();
        list.iter_mut().find(|a| a.address() == address).map(f)
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, Vec<Address>> {
        self.addresses.lock().expect("hdm keychain lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn keychain(addresses: &[&str]) -> (HdmKeychain, crossbeam_channel::Receiver<Vec<String>>) {
        let (tx, rx) = unbounded();
        let addresses = addresses.iter().map(|s| Address::hdm(*s)).collect();
        (HdmKeychain::classic(3, addresses, tx), rx)
    }

    #[test]
    fn added_addresses_are_reported_as_strings() {
        let (keychain, rx) = keychain(&["hdm-1"]);
        keychain.add_addresses(vec![Address::hdm("hdm-2")]);
        assert_eq!(rx.try_recv().unwrap(), vec!["hdm-2".to_string()]);
        assert_eq!(keychain.address_count(), 2);
        assert!(keychain.contains("hdm-2"));
    }

    #[test]
    fn duplicate_addresses_are_not_doubled() {
        let (keychain, _rx) = keychain(&["hdm-1"]);
        keychain.add_addresses(vec![Address::hdm("hdm-1")]);
        assert_eq!(keychain.address_count(), 1);
    }

    #[test]
    fn sync_complete_requires_every_address() {
        let (keychain, _rx) = keychain(&["hdm-1", "hdm-2"]);
        assert!(!keychain.is_sync_complete());
        keychain.with_address_mut("hdm-1", |a| a.set_sync_complete(true));
        assert!(!keychain.is_sync_complete());
        keychain.with_address_mut("hdm-2", |a| a.set_sync_complete(true));
        assert!(keychain.is_sync_complete());
    }

    #[test]
    fn remove_and_restore_round_trip() {
        let (keychain, _rx) = keychain(&["hdm-1", "hdm-2"]);
        let removed = keychain.remove_address("hdm-1").unwrap();
        assert_eq!(keychain.address_count(), 1);
        keychain.restore_address(removed);
        assert_eq!(keychain.address_count(), 2);
    }
}
