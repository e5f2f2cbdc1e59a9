//! The address index: the single source of truth for which addresses the
//! wallet controls, watches or has trashed.
//!
//! Exactly one index exists per running wallet. It is constructed once at
//! startup via [`AddressIndex::load`], shared by reference with every caller,
//! and guards all of its lists and the derived membership set behind one
//! coarse lock: callers never observe a torn combination of list contents
//! and membership.

mod register;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::account::{AccountScope, HdAccount, HdmKeychain, RelevanceSource};
use crate::address::Address;
use crate::config::{AppMode, IndexConfig};
use crate::error::StorageResult;
use crate::events::{EventBus, WalletEvent};
use crate::storage::WalletStorage;

/// Aggregate state guarded by the index lock.
pub(crate) struct IndexInner {
    pub(crate) priv_key_addresses: Vec<Address>,
    pub(crate) watch_only_addresses: Vec<Address>,
    pub(crate) trash_addresses: Vec<Address>,
    /// Flattened set of every address string currently tracked by any
    /// local address space, for O(1) relevance lookup.
    pub(crate) membership: HashSet<String>,
    pub(crate) hd_account: Option<Arc<HdAccount>>,
    pub(crate) hd_account_monitored: Option<Arc<HdAccount>>,
    pub(crate) desktop_keychains: Vec<Arc<HdAccount>>,
    pub(crate) hdm_keychain: Option<Arc<HdmKeychain>>,
    pub(crate) enterprise_keychain: Option<Arc<HdmKeychain>>,
}

impl IndexInner {
    fn empty() -> Self {
        Self {
            priv_key_addresses: Vec::new(),
            watch_only_addresses: Vec::new(),
            trash_addresses: Vec::new(),
            membership: HashSet::new(),
            hd_account: None,
            hd_account_monitored: None,
            desktop_keychains: Vec::new(),
            hdm_keychain: None,
            enterprise_keychain: None,
        }
    }

    /// The address spaces consulted during relevance evaluation. Only the
    /// first desktop HDM keychain is consulted even when several are
    /// registered; this mirrors long-standing wallet behavior.
    pub(crate) fn relevance_sources(&self) -> Vec<Arc<dyn RelevanceSource>> {
        let mut sources: Vec<Arc<dyn RelevanceSource>> = Vec::new();
        if let Some(account) = &self.hd_account {
            sources.push(account.clone());
        }
        if let Some(account) = &self.hd_account_monitored {
            sources.push(account.clone());
        }
        if let Some(keychain) = self.desktop_keychains.first() {
            sources.push(keychain.clone());
        }
        sources
    }
}

/// The in-memory address/transaction relevance index.
pub struct AddressIndex {
    pub(crate) storage: Arc<dyn WalletStorage>,
    pub(crate) config: IndexConfig,
    pub(crate) events: EventBus<WalletEvent>,
    derived_tx: Sender<Vec<String>>,
    derived_rx: Receiver<Vec<String>>,
    inner: Mutex<IndexInner>,
}

impl AddressIndex {
    /// Load the index from storage, constructing every account collaborator
    /// from its stored seed or id.
    pub fn load(storage: Arc<dyn WalletStorage>, config: IndexConfig) -> StorageResult<Self> {
        Self::load_with_events(storage, config, EventBus::new())
    }

    /// Load the index, emitting [`WalletEvent::Ready`] on the given bus
    /// once initialization completes. Use this when listeners must observe
    /// the ready signal: subscribe to the bus before loading.
    pub fn load_with_events(
        storage: Arc<dyn WalletStorage>,
        config: IndexConfig,
        events: EventBus<WalletEvent>,
    ) -> StorageResult<Self> {
        let (derived_tx, derived_rx) = unbounded();
        let mut inner = IndexInner::empty();

        for address in storage.load_addresses()? {
            if address.is_trashed() {
                inner.trash_addresses.push(address);
            } else {
                inner.membership.insert(address.address().to_string());
                if address.has_priv_key() {
                    inner.priv_key_addresses.push(address);
                } else {
                    inner.watch_only_addresses.push(address);
                }
            }
        }

        if let Some(id) = storage.load_account_ids(AccountScope::Hdm)?.first() {
            let addresses = storage.load_keychain_addresses(AccountScope::Hdm, *id)?;
            let keychain = Arc::new(HdmKeychain::classic(*id, addresses, derived_tx.clone()));
            for address in keychain.addresses() {
                inner.membership.insert(address.address().to_string());
            }
            inner.hdm_keychain = Some(keychain);
        }

        if let Some(id) = storage.load_account_ids(AccountScope::EnterpriseHdm)?.first() {
            let addresses = storage.load_keychain_addresses(AccountScope::EnterpriseHdm, *id)?;
            let keychain = Arc::new(HdmKeychain::enterprise(*id, addresses, derived_tx.clone()));
            for address in keychain.addresses() {
                inner.membership.insert(address.address().to_string());
            }
            inner.enterprise_keychain = Some(keychain);
        }

        if let Some(id) = storage.load_account_ids(AccountScope::HdAccount)?.first() {
            let addresses = storage.load_account_addresses(AccountScope::HdAccount, *id)?;
            inner.hd_account = Some(Arc::new(HdAccount::new(
                AccountScope::HdAccount,
                *id,
                addresses,
                derived_tx.clone(),
            )));
        }

        if let Some(id) = storage.load_account_ids(AccountScope::HdAccountMonitored)?.first() {
            let addresses =
                storage.load_account_addresses(AccountScope::HdAccountMonitored, *id)?;
            inner.hd_account_monitored = Some(Arc::new(HdAccount::new(
                AccountScope::HdAccountMonitored,
                *id,
                addresses,
                derived_tx.clone(),
            )));
        }

        for id in storage.load_account_ids(AccountScope::DesktopHdm)? {
            let addresses = storage.load_account_addresses(AccountScope::DesktopHdm, id)?;
            inner.desktop_keychains.push(Arc::new(HdAccount::new(
                AccountScope::DesktopHdm,
                id,
                addresses,
                derived_tx.clone(),
            )));
        }

        Self::apply_display_metadata(&storage, &mut inner)?;

        tracing::info!(
            priv_key = inner.priv_key_addresses.len(),
            watch_only = inner.watch_only_addresses.len(),
            trashed = inner.trash_addresses.len(),
            membership = inner.membership.len(),
            "address index loaded"
        );

        let index = Self {
            storage,
            config,
            events,
            derived_tx,
            derived_rx,
            inner: Mutex::new(inner),
        };
        index.events.emit(WalletEvent::Ready);
        Ok(index)
    }

    fn apply_display_metadata(
        storage: &Arc<dyn WalletStorage>,
        inner: &mut IndexInner,
    ) -> StorageResult<()> {
        let aliases = storage.load_aliases()?;
        let vanity_lens = storage.load_vanity_lens()?;
        if aliases.is_empty() && vanity_lens.is_empty() {
            return Ok(());
        }
        for address in inner
            .priv_key_addresses
            .iter_mut()
            .chain(inner.watch_only_addresses.iter_mut())
        {
            if let Some(alias) = aliases.get(address.address()) {
                address.set_alias(Some(alias.clone()));
            }
            if let Some(len) = vanity_lens.get(address.address()) {
                address.set_vanity_len(Some(*len));
            }
        }
        for keychain in inner.hdm_keychain.iter().chain(inner.enterprise_keychain.iter()) {
            for (address, alias) in &aliases {
                keychain.with_address_mut(address, |a| a.set_alias(Some(alias.clone())));
            }
        }
        Ok(())
    }

    /// Subscribe to index events.
    pub fn subscribe(&self) -> Receiver<WalletEvent> {
        self.events.subscribe()
    }

    /// Channel end for collaborators created after load to report their
    /// derived addresses into the membership set.
    pub fn derived_address_sender(&self) -> Sender<Vec<String>> {
        self.derived_tx.clone()
    }

    pub(crate) fn locked(&self) -> MutexGuard<'_, IndexInner> {
        self.inner.lock().expect("address index lock poisoned")
    }

    /// Fold addresses reported by collaborators since the last call into
    /// the membership set. Runs under the index lock before every
    /// relevance evaluation and membership read.
    pub(crate) fn absorb_derived(&self, inner: &mut IndexInner) {
        while let Ok(batch) = self.derived_rx.try_recv() {
            inner.membership.extend(batch);
        }
    }

    /// Add a classic or watch-only address.
    ///
    /// Returns `Ok(false)` if the address already exists anywhere in the
    /// index. A key-controlled address found in the trash is restored
    /// instead of re-created.
    pub fn add_address(&self, mut address: Address) -> StorageResult<bool> {
        let mut inner = self.locked();
        self.absorb_derived(&mut inner);
        let exists = self
            .all_addresses_inner(&inner)
            .iter()
            .any(|a| a.address() == address.address());
        if exists {
            tracing::debug!(address = %address, "address already present, not added");
            return Ok(false);
        }
        if address.has_priv_key() {
            address.set_sort_time(Self::next_sort_time(&inner.priv_key_addresses));
            let trashed_at = inner
                .trash_addresses
                .iter()
                .position(|a| a.address() == address.address());
            if let Some(position) = trashed_at {
                address.set_sync_complete(false);
                address.set_trashed(false);
                self.storage.restore_address(&address)?;
                inner.trash_addresses.remove(position);
            } else {
                self.storage.persist_address(&address)?;
            }
            inner.membership.insert(address.address().to_string());
            tracing::info!(address = %address, "added key-controlled address");
            inner.priv_key_addresses.insert(0, address);
        } else {
            address.set_sort_time(Self::next_sort_time(&inner.watch_only_addresses));
            self.storage.persist_address(&address)?;
            inner.membership.insert(address.address().to_string());
            tracing::info!(address = %address, "added watch-only address");
            inner.watch_only_addresses.insert(0, address);
        }
        Ok(true)
    }

    /// Permanently drop a watch-only address. Key-controlled addresses
    /// cannot be dropped this way; trash them instead.
    pub fn stop_monitor(&self, address: &str) -> StorageResult<bool> {
        let mut inner = self.locked();
        if inner.priv_key_addresses.iter().any(|a| a.address() == address) {
            return Ok(false);
        }
        let Some(position) = inner
            .watch_only_addresses
            .iter()
            .position(|a| a.address() == address)
        else {
            return Ok(false);
        };
        self.storage.remove_watch_only_address(address)?;
        inner.watch_only_addresses.remove(position);
        inner.membership.remove(address);
        tracing::info!(address, "stopped monitoring watch-only address");
        Ok(true)
    }

    /// Move a zero-balance key-controlled or HDM address to the trash.
    ///
    /// An HDM keychain must keep at least one address; trashing its last
    /// one is rejected.
    pub fn trash_priv_key(&self, address: &str) -> StorageResult<bool> {
        let mut inner = self.locked();
        if let Some(position) = inner
            .priv_key_addresses
            .iter()
            .position(|a| a.address() == address)
        {
            if inner.priv_key_addresses[position].balance() != 0 {
                return Ok(false);
            }
            self.storage.trash_address(address)?;
            let mut entry = inner.priv_key_addresses.remove(position);
            entry.set_trashed(true);
            inner.membership.remove(address);
            inner.trash_addresses.push(entry);
            tracing::info!(address, "trashed key-controlled address");
            return Ok(true);
        }

        let keychain = inner.hdm_keychain.clone();
        if let Some(keychain) = keychain {
            if keychain.contains(address) {
                let balance = keychain.with_address_mut(address, |a| a.balance()).unwrap_or(0);
                if balance != 0 || keychain.address_count() <= 1 {
                    return Ok(false);
                }
                self.storage.trash_address(address)?;
                if let Some(mut entry) = keychain.remove_address(address) {
                    entry.set_trashed(true);
                    inner.membership.remove(address);
                    inner.trash_addresses.push(entry);
                    tracing::info!(address, "trashed HDM address");
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Restore a trashed key-controlled or HDM address to active
    /// monitoring. The address re-enters with a fresh sort time and its
    /// sync state reset, forcing a re-sync.
    pub fn restore_priv_key(&self, address: &str) -> StorageResult<bool> {
        let mut inner = self.locked();
        let Some(position) = inner
            .trash_addresses
            .iter()
            .position(|a| a.address() == address)
        else {
            return Ok(false);
        };
        if !inner.trash_addresses[position].has_priv_key()
            && !inner.trash_addresses[position].is_hdm()
        {
            return Ok(false);
        }
        let mut entry = inner.trash_addresses[position].clone();
        entry.set_sort_time(Self::next_sort_time(&inner.priv_key_addresses));
        entry.set_sync_complete(false);
        entry.set_trashed(false);
        self.storage.restore_address(&entry)?;
        inner.trash_addresses.remove(position);
        inner.membership.insert(address.to_string());
        tracing::info!(address, "restored trashed address");
        if entry.is_hdm() {
            // HDM addresses are tracked by their keychain, not this list.
            if let Some(keychain) = &inner.hdm_keychain {
                keychain.restore_address(entry);
            }
        } else {
            inner.priv_key_addresses.insert(0, entry);
        }
        Ok(true)
    }

    /// Sort time for the next insert into the given list: strictly greater
    /// than the current maximum even under rapid bulk insertion with
    /// coarse clock resolution.
    fn next_sort_time(list: &[Address]) -> u64 {
        let mut sort_time = now_millis();
        if let Some(first) = list.first() {
            let floor = first.sort_time() + list.len() as u64;
            if sort_time < floor {
                sort_time = floor;
            }
        }
        sort_time
    }

    /// Active key-controlled addresses, newest first.
    pub fn priv_key_addresses(&self) -> Vec<Address> {
        self.locked().priv_key_addresses.clone()
    }

    /// Watch-only addresses, newest first.
    pub fn watch_only_addresses(&self) -> Vec<Address> {
        self.locked().watch_only_addresses.clone()
    }

    /// Trashed addresses.
    pub fn trash_addresses(&self) -> Vec<Address> {
        self.locked().trash_addresses.clone()
    }

    /// Every displayed address, in the fixed order other components rely
    /// on: HDM keychain, key-controlled, watch-only, enterprise HDM.
    pub fn get_all_addresses(&self) -> Vec<Address> {
        let inner = self.locked();
        self.all_addresses_inner(&inner)
    }

    pub(crate) fn all_addresses_inner(&self, inner: &IndexInner) -> Vec<Address> {
        let mut result = Vec::new();
        if self.has_hdm_keychain_inner(inner) {
            if let Some(keychain) = &inner.hdm_keychain {
                result.extend(keychain.addresses());
            }
        }
        result.extend(inner.priv_key_addresses.iter().cloned());
        result.extend(inner.watch_only_addresses.iter().cloned());
        if self.has_enterprise_keychain_inner(inner) {
            if let Some(keychain) = &inner.enterprise_keychain {
                result.extend(keychain.addresses());
            }
        }
        result
    }

    /// Snapshot of the membership set.
    pub fn membership(&self) -> HashSet<String> {
        let mut inner = self.locked();
        self.absorb_derived(&mut inner);
        inner.membership.clone()
    }

    /// Bind the HD account. Binding a different account while one is
    /// already bound is an integration error and panics.
    pub fn attach_hd_account(&self, account: Arc<HdAccount>) {
        let mut inner = self.locked();
        match &inner.hd_account {
            Some(existing) if Arc::ptr_eq(existing, &account) => {}
            Some(_) => panic!("cannot attach a different HD account to the address index"),
            None => inner.hd_account = Some(account),
        }
    }

    /// Bind the monitored HD account; same rules as [`Self::attach_hd_account`].
    pub fn attach_hd_account_monitored(&self, account: Arc<HdAccount>) {
        let mut inner = self.locked();
        match &inner.hd_account_monitored {
            Some(existing) if Arc::ptr_eq(existing, &account) => {}
            Some(_) => {
                panic!("cannot attach a different monitored HD account to the address index")
            }
            None => inner.hd_account_monitored = Some(account),
        }
    }

    /// Bind the classic HDM keychain and fold its addresses into the
    /// membership set; same rules as [`Self::attach_hd_account`].
    pub fn attach_hdm_keychain(&self, keychain: Arc<HdmKeychain>) {
        let mut inner = self.locked();
        match &inner.hdm_keychain {
            Some(existing) if Arc::ptr_eq(existing, &keychain) => {}
            Some(_) => panic!("cannot attach a different HDM keychain to the address index"),
            None => {
                for address in keychain.addresses() {
                    inner.membership.insert(address.address().to_string());
                }
                inner.hdm_keychain = Some(keychain);
            }
        }
    }

    /// Bind the enterprise HDM keychain; same rules as
    /// [`Self::attach_hdm_keychain`].
    pub fn attach_enterprise_keychain(&self, keychain: Arc<HdmKeychain>) {
        let mut inner = self.locked();
        match &inner.enterprise_keychain {
            Some(existing) if Arc::ptr_eq(existing, &keychain) => {}
            Some(_) => {
                panic!("cannot attach a different enterprise HDM keychain to the address index")
            }
            None => {
                for address in keychain.addresses() {
                    inner.membership.insert(address.address().to_string());
                }
                inner.enterprise_keychain = Some(keychain);
            }
        }
    }

    /// Register an additional desktop HDM keychain. Several may be
    /// registered; only the first is consulted for relevance.
    pub fn add_desktop_keychain(&self, keychain: Arc<HdAccount>) {
        self.locked().desktop_keychains.push(keychain);
    }

    pub fn has_hd_account(&self) -> bool {
        self.locked().hd_account.is_some()
    }

    pub fn has_hd_account_monitored(&self) -> bool {
        self.locked().hd_account_monitored.is_some()
    }

    pub fn has_desktop_hdm_keychain(&self) -> bool {
        !self.locked().desktop_keychains.is_empty()
    }

    pub fn has_hdm_keychain(&self) -> bool {
        let inner = self.locked();
        self.has_hdm_keychain_inner(&inner)
    }

    pub fn has_enterprise_hdm_keychain(&self) -> bool {
        let inner = self.locked();
        self.has_enterprise_keychain_inner(&inner)
    }

    fn has_hdm_keychain_inner(&self, inner: &IndexInner) -> bool {
        match self.config.app_mode {
            AppMode::Cold => inner.hdm_keychain.is_some(),
            AppMode::Hot => {
                inner.hdm_keychain.as_ref().is_some_and(|k| k.address_count() > 0)
            }
        }
    }

    fn has_enterprise_keychain_inner(&self, inner: &IndexInner) -> bool {
        match self.config.app_mode {
            AppMode::Cold => false,
            AppMode::Hot => inner.enterprise_keychain.is_some(),
        }
    }

    pub fn hd_account(&self) -> Option<Arc<HdAccount>> {
        self.locked().hd_account.clone()
    }

    pub fn hd_account_monitored(&self) -> Option<Arc<HdAccount>> {
        self.locked().hd_account_monitored.clone()
    }

    pub fn hdm_keychain(&self) -> Option<Arc<HdmKeychain>> {
        self.locked().hdm_keychain.clone()
    }

    pub fn enterprise_hdm_keychain(&self) -> Option<Arc<HdmKeychain>> {
        self.locked().enterprise_keychain.clone()
    }

    pub fn desktop_hdm_keychains(&self) -> Vec<Arc<HdAccount>> {
        self.locked().desktop_keychains.clone()
    }

    /// Flip the per-address sync flag wherever the address lives.
    pub fn set_sync_complete(&self, address: &str, complete: bool) -> bool {
        let mut guard = self.locked();
        let inner = &mut *guard;
        for entry in inner
            .priv_key_addresses
            .iter_mut()
            .chain(inner.watch_only_addresses.iter_mut())
            .chain(inner.trash_addresses.iter_mut())
        {
            if entry.address() == address {
                entry.set_sync_complete(complete);
                return true;
            }
        }
        for keychain in inner.hdm_keychain.iter().chain(inner.enterprise_keychain.iter()) {
            if keychain
                .with_address_mut(address, |a| a.set_sync_complete(complete))
                .is_some()
            {
                return true;
            }
        }
        false
    }

    /// Record the last known balance for an address wherever it lives.
    pub fn update_balance(&self, address: &str, balance: u64) -> bool {
        let mut guard = self.locked();
        let inner = &mut *guard;
        for entry in inner
            .priv_key_addresses
            .iter_mut()
            .chain(inner.watch_only_addresses.iter_mut())
            .chain(inner.trash_addresses.iter_mut())
        {
            if entry.address() == address {
                entry.set_balance(balance);
                return true;
            }
        }
        for keychain in inner.hdm_keychain.iter().chain(inner.enterprise_keychain.iter()) {
            if keychain.with_address_mut(address, |a| a.set_balance(balance)).is_some() {
                return true;
            }
        }
        false
    }

    /// Whether every tracked address and every consulted account
    /// collaborator reports its history fully synchronized.
    pub fn address_is_sync_complete(&self) -> bool {
        let inner = self.locked();
        if self.all_addresses_inner(&inner).iter().any(|a| !a.is_sync_complete()) {
            return false;
        }
        if inner.hd_account.as_ref().is_some_and(|a| !a.is_sync_complete()) {
            return false;
        }
        if inner
            .hd_account_monitored
            .as_ref()
            .is_some_and(|a| !a.is_sync_complete())
        {
            return false;
        }
        if inner
            .desktop_keychains
            .first()
            .is_some_and(|k| !k.is_sync_complete())
        {
            return false;
        }
        true
    }

    /// Whether no further key-controlled addresses may be created.
    pub fn is_private_limit(&self) -> bool {
        let inner = self.locked();
        let max = match self.config.app_mode {
            AppMode::Cold => self.config.watch_only_limit,
            AppMode::Hot => self.config.private_key_limit,
        };
        inner.priv_key_addresses.len() >= max
    }

    /// Whether no further watch-only addresses may be added.
    pub fn is_watch_only_limit(&self) -> bool {
        self.locked().watch_only_addresses.len() >= self.config.watch_only_limit
    }

    /// How many more key-controlled addresses may be created.
    pub fn can_add_private_key_count(&self) -> usize {
        let inner = self.locked();
        match self.config.app_mode {
            AppMode::Cold => self
                .config
                .watch_only_limit
                .saturating_sub(self.all_addresses_inner(&inner).len()),
            AppMode::Hot => self
                .config
                .private_key_limit
                .saturating_sub(inner.priv_key_addresses.len()),
        }
    }

    /// Whether an HDM keychain already exists (and so another may not be
    /// created).
    pub fn is_hdm_keychain_limit(&self) -> bool {
        let inner = self.locked();
        match self.config.app_mode {
            AppMode::Cold => inner.hdm_keychain.is_some(),
            AppMode::Hot => {
                inner.hdm_keychain.as_ref().is_some_and(|k| k.address_count() > 0)
            }
        }
    }

    /// Whether the HDM keychain has reached its per-seed address cap.
    pub fn is_hdm_address_limit(&self) -> bool {
        let inner = self.locked();
        match self.config.app_mode {
            AppMode::Cold => true,
            AppMode::Hot => inner
                .hdm_keychain
                .as_ref()
                .is_some_and(|k| k.address_count() >= self.config.hdm_address_per_seed),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
