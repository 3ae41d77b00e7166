//! Custody configuration.
//!
//! Loaded from the TOML file named by `CONFIG_PATH` (default `custody.toml`).
//! A missing file means defaults; endpoint URLs can be overridden from the
//! environment. The mnemonic is never read from this file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::blockchain::bitcoin::utxo::FeePolicy;
use crate::core::derivation::validate_address;
use crate::core::domain::Network;
use crate::core::errors::ConfigError;

pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "custody.toml";

const ENDPOINT_OVERRIDES: [&str; 4] = [
    "CUSTODY_BTC_INDEXER_URL",
    "CUSTODY_EVM_RPC_URL",
    "CUSTODY_TRON_API_URL",
    "CUSTODY_SOLANA_RPC_URL",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Esplora-compatible REST base, e.g. `https://blockstream.info/api`.
    #[serde(default = "EndpointsConfig::default_btc_indexer_url")]
    pub btc_indexer_url: String,

    #[serde(default = "EndpointsConfig::default_evm_rpc_url")]
    pub evm_rpc_url: String,

    /// TRON full-node HTTP API base.
    #[serde(default = "EndpointsConfig::default_tron_api_url")]
    pub tron_api_url: String,

    #[serde(default = "EndpointsConfig::default_solana_rpc_url")]
    pub solana_rpc_url: String,
}

impl EndpointsConfig {
    fn default_btc_indexer_url() -> String { "https://blockstream.info/api".to_string() }
    fn default_evm_rpc_url() -> String { "https://eth.llamarpc.com".to_string() }
    fn default_tron_api_url() -> String { "https://api.trongrid.io".to_string() }
    fn default_solana_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            btc_indexer_url: Self::default_btc_indexer_url(),
            evm_rpc_url: Self::default_evm_rpc_url(),
            tron_api_url: Self::default_tron_api_url(),
            solana_rpc_url: Self::default_solana_rpc_url(),
        }
    }
}

/// Bitcoin network names as written in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BitcoinNetworkName {
    #[default]
    Bitcoin,
    Testnet,
    Signet,
    Regtest,
}

impl From<BitcoinNetworkName> for bitcoin::Network {
    fn from(name: BitcoinNetworkName) -> Self {
        match name {
            BitcoinNetworkName::Bitcoin => bitcoin::Network::Bitcoin,
            BitcoinNetworkName::Testnet => bitcoin::Network::Testnet,
            BitcoinNetworkName::Signet => bitcoin::Network::Signet,
            BitcoinNetworkName::Regtest => bitcoin::Network::Regtest,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BitcoinConfig {
    #[serde(default)]
    pub network: BitcoinNetworkName,
}

/// The single ERC-20 token this deployment tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Erc20Config {
    /// Token contract; ERC-20 balances fail until it is set.
    #[serde(default)]
    pub contract: Option<String>,

    #[serde(default = "Erc20Config::default_symbol")]
    pub symbol: String,
}

impl Erc20Config {
    fn default_symbol() -> String { "USDT".to_string() }
}

impl Default for Erc20Config {
    fn default() -> Self {
        Self {
            contract: None,
            symbol: Self::default_symbol(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub fee: FeePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Per HTTP request.
    #[serde(default = "TimeoutsConfig::default_http_secs")]
    pub http_secs: u64,

    /// Per balance adapter call, as seen by the oracle.
    #[serde(default = "TimeoutsConfig::default_oracle_secs")]
    pub oracle_secs: u64,
}

impl TimeoutsConfig {
    fn default_http_secs() -> u64 { 20 }
    fn default_oracle_secs() -> u64 { 30 }

    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_secs)
    }

    pub fn oracle(&self) -> Duration {
        Duration::from_secs(self.oracle_secs)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            http_secs: Self::default_http_secs(),
            oracle_secs: Self::default_oracle_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustodyConfig {
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    #[serde(default)]
    pub bitcoin: BitcoinConfig,

    #[serde(default)]
    pub erc20: Erc20Config,

    /// Treasury address per network tag, e.g. `btc = "bc1q..."`.
    #[serde(default)]
    pub treasury: BTreeMap<String, String>,

    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

impl CustodyConfig {
    /// Load from `CONFIG_PATH` (or `custody.toml`), apply env overrides, validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            warn!(path = %path, "config file not found, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path, "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Replace endpoint URLs with non-empty values returned by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in ENDPOINT_OVERRIDES {
            let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            info!(key, "endpoint overridden from environment");
            let slot = match key {
                "CUSTODY_BTC_INDEXER_URL" => &mut self.endpoints.btc_indexer_url,
                "CUSTODY_EVM_RPC_URL" => &mut self.endpoints.evm_rpc_url,
                "CUSTODY_TRON_API_URL" => &mut self.endpoints.tron_api_url,
                _ => &mut self.endpoints.solana_rpc_url,
            };
            *slot = value;
        }
    }

    pub fn bitcoin_network(&self) -> bitcoin::Network {
        self.bitcoin.network.into()
    }

    pub fn treasury_for(&self, network: Network) -> Option<&str> {
        self.treasury
            .iter()
            .find(|(tag, _)| tag.parse::<Network>().ok() == Some(network))
            .map(|(_, address)| address.as_str())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let btc_network = self.bitcoin_network();
        for (tag, address) in &self.treasury {
            let network: Network = tag
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("treasury: {}", e)))?;
            validate_address(network, address, btc_network)
                .map_err(|e| ConfigError::Invalid(format!("treasury: {}", e)))?;
        }

        if let Some(contract) = &self.erc20.contract {
            validate_address(Network::Erc20, contract, btc_network)
                .map_err(|e| ConfigError::Invalid(format!("erc20.contract: {}", e)))?;
        }

        if self.timeouts.http_secs == 0 || self.timeouts.oracle_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".to_string()));
        }

        self.sweep.fee.validate().map_err(ConfigError::Invalid)?;

        for (name, url) in [
            ("btc_indexer_url", &self.endpoints.btc_indexer_url),
            ("evm_rpc_url", &self.endpoints.evm_rpc_url),
            ("tron_api_url", &self.endpoints.tron_api_url),
            ("solana_rpc_url", &self.endpoints.solana_rpc_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!("endpoints.{} must be an http(s) URL", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[endpoints]
btc_indexer_url = "http://127.0.0.1:3002"

[bitcoin]
network = "testnet"

[erc20]
contract = "0xdAC17F958D2ee523a2206206994597C13D831ec7"

[treasury]
btc = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx"
eth = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"

[sweep.fee]
policy = "fixed"
sats = 2000

[timeouts]
oracle_secs = 10
"#;

    #[test]
    fn test_parse_sample() {
        let config = CustodyConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.endpoints.btc_indexer_url, "http://127.0.0.1:3002");
        assert_eq!(config.endpoints.tron_api_url, "https://api.trongrid.io");
        assert_eq!(config.bitcoin_network(), bitcoin::Network::Testnet);
        assert_eq!(config.erc20.symbol, "USDT");
        assert_eq!(config.sweep.fee, FeePolicy::Fixed { sats: 2000 });
        assert_eq!(config.timeouts.oracle(), Duration::from_secs(10));
        assert_eq!(config.timeouts.http(), Duration::from_secs(20));
        assert!(config.treasury_for(Network::Btc).is_some());
        assert!(config.treasury_for(Network::Sol).is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let config = CustodyConfig::from_toml_str("").unwrap();
        assert_eq!(config.bitcoin_network(), bitcoin::Network::Bitcoin);
        assert_eq!(config.timeouts.oracle_secs, 30);
        config.validate().unwrap();
    }

    #[test]
    fn test_treasury_on_wrong_network_rejected() {
        let mut config = CustodyConfig::from_toml_str(SAMPLE).unwrap();
        config.bitcoin.network = BitcoinNetworkName::Bitcoin;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_overrides() {
        let mut config = CustodyConfig::default();
        config.apply_overrides(|key| match key {
            "CUSTODY_EVM_RPC_URL" => Some("http://localhost:8545".to_string()),
            "CUSTODY_SOLANA_RPC_URL" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.endpoints.evm_rpc_url, "http://localhost:8545");
        assert_eq!(config.endpoints.solana_rpc_url, "https://api.mainnet-beta.solana.com");
    }

    #[test]
    fn test_unknown_network_key_rejected() {
        let config = CustodyConfig::from_toml_str("[treasury]\ndoge = \"D123\"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_treasury_accepts_long_tags() {
        let config = CustodyConfig::from_toml_str(
            "[treasury]\nethereum = \"0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed\"\n",
        )
        .unwrap();
        assert!(config.treasury_for(Network::Eth).is_some());
        config.validate().unwrap();
    }
}
