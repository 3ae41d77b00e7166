//! The three operations collaborators consume: derive, check balance, sweep.

use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::balance::{BalanceOracle, BalanceReading};
use super::sweep::{SweepPipeline, SweepReport};
use crate::blockchain::bitcoin::EsploraClient;
use crate::blockchain::ethereum::{Erc20BalanceAdapter, EthBalanceAdapter};
use crate::blockchain::rpc::{http_client, JsonRpcClient};
use crate::blockchain::solana::SolBalanceAdapter;
use crate::blockchain::tron::TronBalanceAdapter;
use crate::core::config::CustodyConfig;
use crate::core::derivation::{KeyDerivationEngine, LocatedAddress};
use crate::core::domain::Network;
use crate::core::errors::{ChainError, DerivationError, SeedError};
use crate::core::seed::MasterSeed;

/// Startup failures of the service.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Address and exported key for one user index.
pub struct DepositKey {
    pub network: Network,
    pub index: u32,
    pub path: String,
    pub address: String,
    /// Hex private key for collaborators that custody keys themselves.
    pub private_key_hex: zeroize::Zeroizing<String>,
}

impl std::fmt::Debug for DepositKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepositKey")
            .field("network", &self.network)
            .field("index", &self.index)
            .field("path", &self.path)
            .field("address", &self.address)
            .field("private_key_hex", &"[REDACTED]")
            .finish()
    }
}

pub struct CustodyService {
    engine: Arc<KeyDerivationEngine>,
    oracle: BalanceOracle,
    sweeper: SweepPipeline,
    config: CustodyConfig,
}

impl CustodyService {
    pub fn new(engine: Arc<KeyDerivationEngine>, oracle: BalanceOracle, sweeper: SweepPipeline, config: CustodyConfig) -> Self {
        Self {
            engine,
            oracle,
            sweeper,
            config,
        }
    }

    /// Wire every adapter from configuration.
    pub fn from_config(seed: MasterSeed, config: CustodyConfig) -> Result<Self, StartupError> {
        let btc_network = config.bitcoin_network();
        let engine = Arc::new(KeyDerivationEngine::new(seed).with_bitcoin_network(btc_network));
        let http = http_client(config.timeouts.http())?;

        let esplora = Arc::new(EsploraClient::new(config.endpoints.btc_indexer_url.clone(), http.clone()));
        let oracle = BalanceOracle::new(config.timeouts.oracle())
            .with_bitcoin_network(btc_network)
            .with_adapter(esplora.clone())
            .with_adapter(Arc::new(EthBalanceAdapter::new(JsonRpcClient::new(
                config.endpoints.evm_rpc_url.clone(),
                http.clone(),
            ))))
            .with_adapter(Arc::new(Erc20BalanceAdapter::new(
                JsonRpcClient::new(config.endpoints.evm_rpc_url.clone(), http.clone()),
                config.erc20.contract.clone(),
                config.erc20.symbol.clone(),
            )))
            .with_adapter(Arc::new(TronBalanceAdapter::new(
                config.endpoints.tron_api_url.clone(),
                http.clone(),
            )))
            .with_adapter(Arc::new(SolBalanceAdapter::new(JsonRpcClient::new(
                config.endpoints.solana_rpc_url.clone(),
                http,
            ))))
            .with_unit(Network::Erc20, config.erc20.symbol.clone());

        let sweeper = SweepPipeline::new(engine.clone(), esplora, config.sweep.fee.clone());
        info!(bitcoin_network = %btc_network, "custody service ready");
        Ok(Self::new(engine, oracle, sweeper, config))
    }

    /// Load the mnemonic from the environment, then [`Self::from_config`].
    pub fn from_env(config: CustodyConfig) -> Result<Self, StartupError> {
        Self::from_config(MasterSeed::from_env()?, config)
    }

    pub fn derive_key(&self, network: Network, index: u32) -> Result<DepositKey, DerivationError> {
        let key = self.engine.derive_key(network, index)?;
        Ok(DepositKey {
            network,
            index,
            path: key.path.clone(),
            address: key.address.clone(),
            private_key_hex: key.private_key.to_hex(),
        })
    }

    /// Zero on any failure; see [`Self::read_balance`] for the typed result.
    pub async fn get_balance(&self, network: Network, address: &str) -> Decimal {
        self.oracle.get_balance(network, address).await
    }

    pub async fn read_balance(&self, network: Network, address: &str) -> BalanceReading {
        self.oracle.read(network, address).await
    }

    pub async fn read_balances(&self, queries: &[(Network, String)]) -> Vec<BalanceReading> {
        self.oracle.read_many(queries).await
    }

    /// Sweep the deposit address of `source_index` into the configured treasury.
    pub async fn sweep(&self, network: Network, source_index: u32) -> Result<SweepReport, DerivationError> {
        if !network.spec().utxo_model {
            return Err(DerivationError::UnsupportedNetwork(format!(
                "{} is not sweepable by this service",
                network
            )));
        }
        let treasury = self.config.treasury_for(network).ok_or_else(|| {
            DerivationError::invalid_address(network, "", "no treasury address configured")
        })?;
        self.sweeper.sweep(network, source_index, treasury).await
    }

    pub fn locate(&self, network: Network, address: &str, max_index: u32) -> Result<Vec<LocatedAddress>, DerivationError> {
        self.engine.locate(network, address, max_index)
    }
}
