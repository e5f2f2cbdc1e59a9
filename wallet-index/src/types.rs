//! Core transaction types shared across the index.

use core::fmt;

/// Number of bytes in a transaction hash.
pub const TX_HASH_LEN: usize = 32;

/// A transaction hash, stored as raw bytes and rendered as hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash([u8; TX_HASH_LEN]);

impl TxHash {
    /// Create a transaction hash from raw bytes.
    pub const fn new(bytes: [u8; TX_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes of this hash.
    pub fn as_bytes(&self) -> &[u8; TX_HASH_LEN] {
        &self.0
    }
}

impl From<[u8; TX_HASH_LEN]> for TxHash {
    fn from(bytes: [u8; TX_HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A transaction input, referencing an output of a previous transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    /// Hash of the transaction whose output is being spent.
    pub prev_tx_hash: TxHash,
    /// Sequence number of the spent output within the previous transaction.
    pub prev_out_sn: u32,
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    /// Sequence number of this output within its transaction.
    pub out_sn: u32,
    /// Destination address, if the output script resolves to one.
    pub out_address: Option<String>,
    /// Value in base units.
    pub value: u64,
}

/// A transaction as seen by the index.
///
/// Transactions are immutable once persisted, except for the single
/// compression rewrite applied before first persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tx {
    /// Transaction hash, the identity of this transaction.
    pub tx_hash: TxHash,
    /// Ordered inputs.
    pub ins: Vec<TxIn>,
    /// Ordered outputs.
    pub outs: Vec<TxOut>,
}

impl Tx {
    /// Create a transaction with the given hash and no inputs or outputs.
    pub fn new(tx_hash: TxHash) -> Self {
        Self {
            tx_hash,
            ins: Vec::new(),
            outs: Vec::new(),
        }
    }

    /// Destination addresses of all outputs that have one, in output order.
    pub fn out_addresses(&self) -> Vec<String> {
        self.outs.iter().filter_map(|out| out.out_address.clone()).collect()
    }

    /// Find the output with the given sequence number.
    pub fn out_by_sn(&self, sn: u32) -> Option<&TxOut> {
        self.outs.iter().find(|out| out.out_sn == sn)
    }
}

/// How a transaction reached the wallet, carried through to notification
/// listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxNotificationType {
    /// Constructed and broadcast by this wallet. Exempt from compression:
    /// the sender needs full visibility into where every output went.
    Send,
    /// Received from the peer network.
    Receive,
    /// Fetched from a remote API during catch-up.
    FromApi,
    /// Observed double spend of an unconfirmed transaction.
    DoubleSpend,
}

impl fmt::Display for TxNotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxNotificationType::Send => write!(f, "send"),
            TxNotificationType::Receive => write!(f, "receive"),
            TxNotificationType::FromApi => write!(f, "from-api"),
            TxNotificationType::DoubleSpend => write!(f, "double-spend"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_hash_displays_as_hex() {
        let mut bytes = [0u8; TX_HASH_LEN];
        bytes[0] = 0xab;
        bytes[31] = 0x01;
        let hash = TxHash::new(bytes);
        let rendered = hash.to_string();
        assert_eq!(rendered.len(), 64);
        assert!(rendered.starts_with("ab"));
        assert!(rendered.ends_with("01"));
    }

    #[test]
    fn out_addresses_skips_unresolvable_outputs() {
        let mut tx = Tx::new(TxHash::new([1u8; TX_HASH_LEN]));
        tx.outs.push(TxOut {
            out_sn: 0,
            out_address: Some("addr-a".to_string()),
            value: 100,
        });
        tx.outs.push(TxOut {
            out_sn: 1,
            out_address: None,
            value: 200,
        });
        tx.outs.push(TxOut {
            out_sn: 2,
            out_address: Some("addr-b".to_string()),
            value: 300,
        });
        assert_eq!(tx.out_addresses(), vec!["addr-a".to_string(), "addr-b".to_string()]);
        assert_eq!(tx.out_by_sn(1).unwrap().value, 200);
        assert!(tx.out_by_sn(9).is_none());
    }
}
