//! Balance Oracle.
//!
//! Reads balances through per-network adapters and never fails outward: each
//! read yields a [`BalanceReading`] that is either `Ok` or `Failed(reason)`.
//! Collapsing failures to zero happens only in [`BalanceOracle::get_balance`].

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::blockchain::BalanceAdapter;
use crate::core::derivation::validate_address;
use crate::core::domain::Network;
use crate::core::errors::ChainError;

pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReadingStatus {
    Ok,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceReading {
    pub network: Network,
    pub address: String,
    /// In display units. Zero when the read failed.
    pub amount: Decimal,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub status: ReadingStatus,
}

impl BalanceReading {
    pub fn is_ok(&self) -> bool {
        self.status == ReadingStatus::Ok
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.status {
            ReadingStatus::Ok => None,
            ReadingStatus::Failed { reason } => Some(reason),
        }
    }
}

pub struct BalanceOracle {
    adapters: HashMap<Network, Arc<dyn BalanceAdapter>>,
    units: HashMap<Network, String>,
    timeout: Duration,
    btc_network: bitcoin::Network,
}

impl BalanceOracle {
    pub fn new(timeout: Duration) -> Self {
        Self {
            adapters: HashMap::new(),
            units: HashMap::new(),
            timeout,
            btc_network: bitcoin::Network::Bitcoin,
        }
    }

    /// Register an adapter for the network it reports.
    pub fn with_adapter(mut self, adapter: Arc<dyn BalanceAdapter>) -> Self {
        self.adapters.insert(adapter.network(), adapter);
        self
    }

    /// Override the unit name shown for a network (e.g. the ERC-20 symbol).
    pub fn with_unit(mut self, network: Network, unit: impl Into<String>) -> Self {
        self.units.insert(network, unit.into());
        self
    }

    pub fn with_bitcoin_network(mut self, network: bitcoin::Network) -> Self {
        self.btc_network = network;
        self
    }

    fn unit(&self, network: Network) -> String {
        self.units
            .get(&network)
            .cloned()
            .unwrap_or_else(|| network.symbol().to_string())
    }

    /// One typed reading. Never returns an error.
    pub async fn read(&self, network: Network, address: &str) -> BalanceReading {
        let result = self.query(network, address).await;
        let (amount, status) = match result {
            Ok(amount) => {
                debug!(network = %network, address, amount = %amount, "balance read");
                (amount, ReadingStatus::Ok)
            }
            Err(e) => {
                warn!(network = %network, address, error = %e, "balance read failed");
                (Decimal::ZERO, ReadingStatus::Failed { reason: e.to_string() })
            }
        };
        BalanceReading {
            network,
            address: address.to_string(),
            amount,
            unit: self.unit(network),
            timestamp: Utc::now(),
            status,
        }
    }

    async fn query(&self, network: Network, address: &str) -> Result<Decimal, ChainError> {
        validate_address(network, address, self.btc_network)?;
        let adapter = self
            .adapters
            .get(&network)
            .ok_or_else(|| ChainError::Unconfigured(format!("no balance adapter for {}", network)))?;
        match tokio::time::timeout(self.timeout, adapter.query_balance(address)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(network = %network, address, timeout_secs = self.timeout.as_secs(), "adapter deadline elapsed");
                Err(ChainError::Timeout)
            }
        }
    }

    /// Concurrent reads; output order matches `queries`.
    pub async fn read_many(&self, queries: &[(Network, String)]) -> Vec<BalanceReading> {
        join_all(
            queries
                .iter()
                .map(|(network, address)| self.read(*network, address)),
        )
        .await
    }

    /// Balance or zero. Failures are logged by [`Self::read`].
    pub async fn get_balance(&self, network: Network, address: &str) -> Decimal {
        self.read(network, address).await.amount
    }
}
