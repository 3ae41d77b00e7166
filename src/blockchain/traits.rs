use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::blockchain::bitcoin::utxo::Utxo;
use crate::core::domain::Network;
use crate::core::errors::ChainError;

/// Reads the balance of one address on one network.
#[async_trait]
pub trait BalanceAdapter: Send + Sync {
    fn network(&self) -> Network;

    /// Balance in display units. Malformed responses are errors, never zero.
    async fn query_balance(&self, address: &str) -> Result<Decimal, ChainError>;
}

/// Fee estimates keyed by confirmation target in blocks, in sat/vB.
pub type FeeEstimates = Vec<(u16, f64)>;

/// UTXO indexer and relay used by the sweep pipeline.
#[async_trait]
pub trait UtxoSource: Send + Sync {
    async fn fetch_utxos(&self, address: &str) -> Result<Vec<Utxo>, ChainError>;

    /// Serialized previous transaction, hex encoded.
    async fn fetch_raw_transaction(&self, txid: &str) -> Result<String, ChainError>;

    /// Relay a signed transaction. Returns the txid the relay reports.
    async fn broadcast(&self, tx_hex: &str) -> Result<String, ChainError>;

    async fn fee_estimates(&self) -> Result<FeeEstimates, ChainError>;
}
