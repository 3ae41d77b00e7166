//! EVM balance adapters: native ETH and one ERC-20 token.

use async_trait::async_trait;
use primitive_types::U256;
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::rpc::JsonRpcClient;
use super::traits::BalanceAdapter;
use crate::core::domain::Network;
use crate::core::errors::ChainError;
use crate::core::units::{from_base_units, parse_hex_quantity};

/// `balanceOf(address)`
const BALANCE_OF_SELECTOR: &str = "0x70a08231";
/// `decimals()`
const DECIMALS_SELECTOR: &str = "0x313ce567";

const ETH_DECIMALS: u32 = 18;

pub struct EthBalanceAdapter {
    rpc: JsonRpcClient,
}

impl EthBalanceAdapter {
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl BalanceAdapter for EthBalanceAdapter {
    fn network(&self) -> Network {
        Network::Eth
    }

    async fn query_balance(&self, address: &str) -> Result<Decimal, ChainError> {
        let wei: String = self.rpc.call("eth_getBalance", json!([address, "latest"])).await?;
        from_base_units(parse_hex_quantity(&wei)?, ETH_DECIMALS)
    }
}

pub struct Erc20BalanceAdapter {
    rpc: JsonRpcClient,
    contract: Option<String>,
    symbol: String,
    decimals: OnceCell<u32>,
}

impl Erc20BalanceAdapter {
    pub fn new(rpc: JsonRpcClient, contract: Option<String>, symbol: impl Into<String>) -> Self {
        Self {
            rpc,
            contract,
            symbol: symbol.into(),
            decimals: OnceCell::new(),
        }
    }

    fn contract(&self) -> Result<&str, ChainError> {
        self.contract
            .as_deref()
            .ok_or_else(|| ChainError::Unconfigured("erc20.contract".to_string()))
    }

    async fn eth_call(&self, data: String) -> Result<U256, ChainError> {
        let contract = self.contract()?;
        let result: String = self
            .rpc
            .call("eth_call", json!([{ "to": contract, "data": data }, "latest"]))
            .await?;
        // A non-contract address answers "0x".
        if result == "0x" {
            return Err(ChainError::Parse(format!("{} returned empty data", contract)));
        }
        parse_hex_quantity(&result)
    }

    /// Token decimals, read from the contract once.
    pub async fn decimals(&self) -> Result<u32, ChainError> {
        self.decimals
            .get_or_try_init(|| async {
                let raw = self.eth_call(DECIMALS_SELECTOR.to_string()).await?;
                // ERC-20 declares decimals as uint8.
                if raw > U256::from(u8::MAX) {
                    return Err(ChainError::Parse(format!("decimals() returned {}", raw)));
                }
                let decimals = raw.low_u32();
                info!(symbol = %self.symbol, decimals, "token decimals loaded");
                Ok(decimals)
            })
            .await
            .copied()
    }
}

/// `balanceOf` calldata: selector plus the address left-padded to 32 bytes.
pub fn balance_of_calldata(address: &str) -> String {
    let body = address.trim_start_matches("0x").to_ascii_lowercase();
    format!("{}{:0>64}", BALANCE_OF_SELECTOR, body)
}

#[async_trait]
impl BalanceAdapter for Erc20BalanceAdapter {
    fn network(&self) -> Network {
        Network::Erc20
    }

    async fn query_balance(&self, address: &str) -> Result<Decimal, ChainError> {
        let decimals = self.decimals().await?;
        let raw = self.eth_call(balance_of_calldata(address)).await?;
        debug!(address, raw = %raw, symbol = %self.symbol, "token balance");
        from_base_units(raw, decimals)
    }
}
