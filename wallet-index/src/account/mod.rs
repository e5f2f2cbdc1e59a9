//! Account collaborators: the HD and HDM address spaces overlaid on the
//! classic address lists.
//!
//! Each collaborator owns its address space and answers one question for the
//! relevance engine: given a transaction and its resolved input addresses,
//! which of my addresses does it touch? Newly derived addresses flow back to
//! the index through an addresses-added channel rather than a callback.

mod hd_account;
mod hdm;

pub use hd_account::HdAccount;
pub use hdm::HdmKeychain;

use std::collections::HashSet;

use crossbeam_channel::Sender;

use crate::types::{Tx, TxNotificationType};

/// The address-space variants an account collaborator can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountScope {
    /// Hierarchical-deterministic account derived from a locally held seed.
    HdAccount,
    /// Monitored (cold-seed) variant of the HD account.
    HdAccountMonitored,
    /// Desktop-paired HDM keychain.
    DesktopHdm,
    /// Classic multi-signature HDM keychain.
    Hdm,
    /// Enterprise multi-signature HDM keychain.
    EnterpriseHdm,
}

impl AccountScope {
    /// Short name used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            AccountScope::HdAccount => "hd-account",
            AccountScope::HdAccountMonitored => "hd-account-monitored",
            AccountScope::DesktopHdm => "desktop-hdm",
            AccountScope::Hdm => "hdm",
            AccountScope::EnterpriseHdm => "enterprise-hdm",
        }
    }
}

/// Channel end handed to collaborators for reporting newly derived
/// addresses back to the index membership set.
pub type DerivedAddressSender = Sender<Vec<String>>;

/// Capability set of an address space consulted during relevance
/// evaluation.
pub trait RelevanceSource: Send + Sync {
    /// Which variant this source is.
    fn scope(&self) -> AccountScope;

    /// The subset of this source's addresses touched by the transaction,
    /// across both its outputs and the resolved input addresses.
    fn related_addresses(&self, tx: &Tx, in_addresses: &[String]) -> Vec<String>;

    /// The subset of the given addresses that belong to this source.
    fn belongs_here(&self, addresses: &[String]) -> HashSet<String>;

    /// Whether any of the resolved input addresses belongs to this source,
    /// i.e. whether this address space is a sender of the transaction.
    fn is_send_from_here(&self, in_addresses: &[String]) -> bool;

    /// Notify this source that a registered transaction touched the given
    /// subset of its addresses.
    fn on_new_tx(&self, tx: &Tx, related: &[String], kind: TxNotificationType);

    /// Whether history for this address space is fully synchronized.
    fn is_sync_complete(&self) -> bool;

    /// Whether a nonempty touched set here marks a first-seen transaction
    /// as registered. Monitored accounts are observational and do not gate
    /// registration, while they still gate persistence.
    fn gates_registration(&self) -> bool {
        true
    }
}
