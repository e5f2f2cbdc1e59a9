//! Configuration for the address index.

/// Operating mode of the wallet application.
///
/// Cold wallets hold keys offline and never see the network; several
/// count-limit policies differ between the two modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Online wallet with network access.
    Hot,
    /// Offline signing wallet.
    Cold,
}

/// Tunables for the address index and its storage-compression policy.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Transactions with more outputs than this are candidates for
    /// compression before persistence.
    pub compress_out_threshold: usize,
    /// Maximum number of key-controlled addresses in hot mode.
    pub private_key_limit: usize,
    /// Maximum number of watch-only addresses (also the key-controlled
    /// cap in cold mode).
    pub watch_only_limit: usize,
    /// Maximum number of completed HDM addresses per keychain seed.
    pub hdm_address_per_seed: usize,
    /// Operating mode of the hosting application.
    pub app_mode: AppMode,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            compress_out_threshold: 5,
            private_key_limit: 50,
            watch_only_limit: 150,
            hdm_address_per_seed: 100,
            app_mode: AppMode::Hot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_hot_mode() {
        let config = IndexConfig::default();
        assert_eq!(config.app_mode, AppMode::Hot);
        assert_eq!(config.compress_out_threshold, 5);
    }
}
