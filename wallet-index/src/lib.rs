//! In-memory wallet address and transaction relevance index.
//!
//! The crate tracks every address a wallet controls or watches, across the
//! classic key-controlled and watch-only lists, the trash, and the HD and
//! HDM account address spaces layered on top. Its centerpiece is
//! [`AddressIndex::register_tx`], which decides whether a transaction seen
//! on the network is relevant to the wallet, persists it (compressed when
//! it fans out widely), and notifies listeners and account collaborators.
//!
//! A single [`AddressIndex`] exists per running wallet. All state sits
//! behind one coarse lock so callers never observe a torn combination of
//! the address lists and the flattened membership set. Persistence goes
//! through the [`storage::WalletStorage`] trait; [`storage::MemoryStorage`]
//! backs tests and ephemeral setups.

pub mod account;
pub mod address;
pub mod compress;
pub mod config;
pub mod error;
pub mod events;
pub mod index;
pub mod storage;
pub mod types;

pub use account::{AccountScope, DerivedAddressSender, HdAccount, HdmKeychain, RelevanceSource};
pub use address::Address;
pub use compress::CompressScope;
pub use config::{AppMode, IndexConfig};
pub use error::{StorageError, StorageResult};
pub use events::{EventBus, WalletEvent};
pub use index::AddressIndex;
pub use storage::{MemoryStorage, WalletStorage};
pub use types::{Tx, TxHash, TxIn, TxNotificationType, TxOut, TX_HASH_LEN};
