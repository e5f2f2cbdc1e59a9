//! Transaction output compression.
//!
//! A transaction that fans out to many recipients carries mostly outputs the
//! wallet will never care about. Before persistence, such transactions are
//! stripped down to the outputs that pay a wallet address, unless the wallet
//! itself is a sender of the transaction: a sender needs the full output list
//! to account for change and fees.

use std::collections::{HashMap, HashSet};

use crate::account::{AccountScope, RelevanceSource};
use crate::error::StorageResult;
use crate::index::{AddressIndex, IndexInner};
use crate::types::{Tx, TxHash};

/// Which address space a batch compression pass runs on behalf of.
#[derive(Debug, Clone, Copy)]
pub enum CompressScope<'a> {
    /// A single classic or watch-only address.
    Address(&'a str),
    /// The HD account address space.
    HdAccount,
    /// The monitored HD account address space.
    HdAccountMonitored,
    /// The desktop HDM keychain address space.
    DesktopHdm,
}

impl AddressIndex {
    /// Compress a transaction against the live index state before
    /// persistence. Transactions at or under the output threshold, and
    /// transactions the wallet sent, pass through unchanged.
    pub(crate) fn compress_tx(&self, inner: &IndexInner, mut tx: Tx, in_addresses: &[String]) -> Tx {
        if tx.outs.len() <= self.config.compress_out_threshold {
            return tx;
        }
        if self.is_send_from_me(inner, in_addresses) {
            return tx;
        }
        let before = tx.outs.len();
        tx.outs.retain(|out| {
            out.out_address.as_deref().is_some_and(|address| {
                inner.membership.contains(address)
                    || inner.hd_account.as_ref().is_some_and(|a| a.contains(address))
                    || inner
                        .hd_account_monitored
                        .as_ref()
                        .is_some_and(|a| a.contains(address))
            })
        });
        tracing::debug!(
            tx = %tx.tx_hash,
            before,
            after = tx.outs.len(),
            "compressed transaction outputs"
        );
        tx
    }

    /// Whether any resolved input address belongs to a wallet address
    /// space, i.e. whether the wallet is a sender of the transaction.
    pub(crate) fn is_send_from_me(&self, inner: &IndexInner, in_addresses: &[String]) -> bool {
        in_addresses.iter().any(|a| inner.membership.contains(a))
            || inner
                .hd_account
                .as_ref()
                .is_some_and(|a| a.is_send_from_here(in_addresses))
            || inner
                .hd_account_monitored
                .as_ref()
                .is_some_and(|a| a.is_send_from_here(in_addresses))
    }

    /// Batch-compress stored transactions on behalf of one address space,
    /// typically while re-importing its history.
    ///
    /// Input addresses are resolved against the batch itself, so a
    /// transaction chain can be compressed without storage round trips.
    /// Send detection is scoped to the address space being compressed:
    /// another space being a sender does not exempt a transaction here.
    pub fn compress_txs(&self, txs: Vec<Tx>, scope: CompressScope<'_>) -> StorageResult<Vec<Tx>> {
        let mut outpoints: HashMap<(TxHash, u32), String> = HashMap::new();
        for tx in &txs {
            for out in &tx.outs {
                if let Some(address) = &out.out_address {
                    outpoints.insert((tx.tx_hash, out.out_sn), address.clone());
                }
            }
        }

        let mut result = Vec::with_capacity(txs.len());
        for mut tx in txs {
            if tx.outs.len() <= self.config.compress_out_threshold {
                result.push(tx);
                continue;
            }
            let in_addresses: Vec<String> = tx
                .ins
                .iter()
                .filter_map(|input| outpoints.get(&(input.prev_tx_hash, input.prev_out_sn)))
                .cloned()
                .collect();
            if !self.scope_members(scope, &in_addresses)?.is_empty() {
                result.push(tx);
                continue;
            }
            let keep = self.scope_members(scope, &tx.out_addresses())?;
            tx.outs
                .retain(|out| out.out_address.as_deref().is_some_and(|a| keep.contains(a)));
            result.push(tx);
        }
        Ok(result)
    }

    fn scope_members(
        &self,
        scope: CompressScope<'_>,
        addresses: &[String],
    ) -> StorageResult<HashSet<String>> {
        match scope {
            CompressScope::Address(address) => Ok(addresses
                .iter()
                .filter(|a| a.as_str() == address)
                .cloned()
                .collect()),
            CompressScope::HdAccount => {
                self.storage.belongs_to_account(AccountScope::HdAccount, addresses)
            }
            CompressScope::HdAccountMonitored => self
                .storage
                .belongs_to_account(AccountScope::HdAccountMonitored, addresses),
            CompressScope::DesktopHdm => {
                self.storage.belongs_to_account(AccountScope::DesktopHdm, addresses)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::config::IndexConfig;
    use crate::storage::MemoryStorage;
    use crate::types::{TxIn, TxOut};
    use std::sync::Arc;

    fn tx_with_outs(hash_byte: u8, addresses: &[&str]) -> Tx {
        let mut tx = Tx::new(TxHash::new([hash_byte; 32]));
        for (sn, address) in addresses.iter().enumerate() {
            tx.outs.push(TxOut {
                out_sn: sn as u32,
                out_address: Some(address.to_string()),
                value: 1000,
            });
        }
        tx
    }

    fn index_with_threshold(threshold: usize) -> AddressIndex {
        let config = IndexConfig {
            compress_out_threshold: threshold,
            ..IndexConfig::default()
        };
        AddressIndex::load(Arc::new(MemoryStorage::new()), config).expect("load index")
    }

    #[test]
    fn small_transactions_pass_through_unchanged() {
        let index = index_with_threshold(3);
        index.add_address(Address::watch_only("w1")).unwrap();
        let tx = tx_with_outs(1, &["w1", "x1", "x2"]);

        let inner = index.locked();
        let compressed = index.compress_tx(&inner, tx.clone(), &[]);
        assert_eq!(compressed.outs.len(), 3);
    }

    #[test]
    fn wide_receives_keep_only_wallet_outputs() {
        let index = index_with_threshold(2);
        index.add_address(Address::watch_only("w1")).unwrap();
        let tx = tx_with_outs(1, &["w1", "x1", "x2", "x3"]);

        let inner = index.locked();
        let compressed = index.compress_tx(&inner, tx, &[]);
        assert_eq!(compressed.outs.len(), 1);
        assert_eq!(compressed.outs[0].out_address.as_deref(), Some("w1"));
    }

    #[test]
    fn sends_are_never_compressed() {
        let index = index_with_threshold(2);
        index.add_address(Address::with_priv_key("k1")).unwrap();
        let tx = tx_with_outs(1, &["x1", "x2", "x3", "x4"]);

        let inner = index.locked();
        let compressed = index.compress_tx(&inner, tx, &["k1".to_string()]);
        assert_eq!(compressed.outs.len(), 4);
    }

    #[test]
    fn twenty_outputs_two_local_compress_to_two() {
        let index = index_with_threshold(10);
        index.add_address(Address::watch_only("local-1")).unwrap();
        index.add_address(Address::watch_only("local-2")).unwrap();

        let mut recipients: Vec<String> = (0..18).map(|i| format!("other-{i}")).collect();
        recipients.push("local-1".to_string());
        recipients.push("local-2".to_string());
        let refs: Vec<&str> = recipients.iter().map(|s| s.as_str()).collect();
        let tx = tx_with_outs(1, &refs);
        assert_eq!(tx.outs.len(), 20);

        let inner = index.locked();
        let compressed = index.compress_tx(&inner, tx, &[]);
        assert_eq!(compressed.outs.len(), 2);
        let kept: Vec<&str> = compressed
            .outs
            .iter()
            .filter_map(|o| o.out_address.as_deref())
            .collect();
        assert!(kept.contains(&"local-1"));
        assert!(kept.contains(&"local-2"));
    }

    #[test]
    fn batch_compression_scopes_to_one_address() {
        let index = index_with_threshold(2);
        let txs = vec![
            tx_with_outs(1, &["a1", "x1", "x2", "x3"]),
            tx_with_outs(2, &["x4", "x5"]),
        ];
        let compressed = index
            .compress_txs(txs, CompressScope::Address("a1"))
            .unwrap();
        assert_eq!(compressed[0].outs.len(), 1);
        assert_eq!(compressed[0].outs[0].out_address.as_deref(), Some("a1"));
        // Under the threshold, untouched.
        assert_eq!(compressed[1].outs.len(), 2);
    }

    #[test]
    fn batch_compression_resolves_inputs_within_the_batch() {
        let index = index_with_threshold(2);
        let funding = tx_with_outs(1, &["a1", "x1", "x2"]);
        let mut spend = tx_with_outs(2, &["x3", "x4", "x5", "x6"]);
        // Spends the funding output paying a1, so a1 is a sender of this
        // transaction and it must not be compressed.
        spend.ins.push(TxIn {
            prev_tx_hash: funding.tx_hash,
            prev_out_sn: 0,
        });

        let compressed = index
            .compress_txs(vec![funding, spend], CompressScope::Address("a1"))
            .unwrap();
        assert_eq!(compressed[1].outs.len(), 4);
    }

    #[test]
    fn batch_compression_uses_stored_account_membership() {
        let storage = Arc::new(MemoryStorage::new());
        storage.seed_account_addresses(
            AccountScope::HdAccount,
            1,
            vec!["hd-1".to_string()],
        );
        let config = IndexConfig {
            compress_out_threshold: 2,
            ..IndexConfig::default()
        };
        let index = AddressIndex::load(storage, config).expect("load index");

        let txs = vec![tx_with_outs(1, &["hd-1", "x1", "x2", "x3"])];
        let compressed = index
            .compress_txs(txs, CompressScope::HdAccount)
            .unwrap();
        assert_eq!(compressed[0].outs.len(), 1);
        assert_eq!(compressed[0].outs[0].out_address.as_deref(), Some("hd-1"));
    }

    #[test]
    fn another_scope_being_a_sender_does_not_exempt_this_one() {
        let storage = Arc::new(MemoryStorage::new());
        storage.seed_account_addresses(
            AccountScope::HdAccount,
            1,
            vec!["hd-1".to_string()],
        );
        storage.seed_account_addresses(
            AccountScope::DesktopHdm,
            1,
            vec!["desk-1".to_string()],
        );
        let config = IndexConfig {
            compress_out_threshold: 2,
            ..IndexConfig::default()
        };
        let index = AddressIndex::load(storage, config).expect("load index");

        let funding = tx_with_outs(1, &["desk-1", "x0", "x9"]);
        let mut spend = tx_with_outs(2, &["hd-1", "x1", "x2", "x3"]);
        spend.ins.push(TxIn {
            prev_tx_hash: funding.tx_hash,
            prev_out_sn: 0,
        });

        // The desktop keychain sent this transaction, but an HD-scoped
        // pass still compresses it down to the HD outputs.
        let compressed = index
            .compress_txs(vec![funding, spend], CompressScope::HdAccount)
            .unwrap();
        assert_eq!(compressed[1].outs.len(), 1);
        assert_eq!(compressed[1].outs[0].out_address.as_deref(), Some("hd-1"));
    }
}
