//! Solana balance adapter (`getBalance` over JSON-RPC).

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::rpc::JsonRpcClient;
use super::traits::BalanceAdapter;
use crate::core::domain::Network;
use crate::core::errors::ChainError;
use crate::core::units::from_base_units;

const LAMPORT_DECIMALS: u32 = 9;

/// `{"context": {...}, "value": <lamports>}`
#[derive(Debug, Deserialize)]
struct BalanceResult {
    value: u64,
}

pub struct SolBalanceAdapter {
    rpc: JsonRpcClient,
}

impl SolBalanceAdapter {
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl BalanceAdapter for SolBalanceAdapter {
    fn network(&self) -> Network {
        Network::Sol
    }

    async fn query_balance(&self, address: &str) -> Result<Decimal, ChainError> {
        let result: BalanceResult = self
            .rpc
            .call("getBalance", json!([address, { "commitment": "confirmed" }]))
            .await?;
        from_base_units(u128::from(result.value), LAMPORT_DECIMALS)
    }
}
