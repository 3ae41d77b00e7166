//! TRON balance adapter over the full-node HTTP API.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::traits::BalanceAdapter;
use crate::core::domain::Network;
use crate::core::errors::ChainError;
use crate::core::units::from_base_units;

const SUN_DECIMALS: u32 = 6;

/// Subset of `/wallet/getaccount`. An account that never received funds is `{}`.
#[derive(Debug, Deserialize)]
struct AccountResponse {
    /// Balance in sun. Omitted for activated accounts holding zero.
    #[serde(default)]
    balance: Option<u64>,
    #[serde(rename = "Error", default)]
    error: Option<String>,
}

pub struct TronBalanceAdapter {
    base_url: String,
    http: HttpClient,
}

impl TronBalanceAdapter {
    pub fn new(base_url: impl Into<String>, http: HttpClient) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }
}

#[async_trait]
impl BalanceAdapter for TronBalanceAdapter {
    fn network(&self) -> Network {
        Network::Trx
    }

    async fn query_balance(&self, address: &str) -> Result<Decimal, ChainError> {
        let response = self
            .http
            .post(format!("{}/wallet/getaccount", self.base_url))
            .json(&json!({ "address": address, "visible": true }))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ChainError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let account: AccountResponse = serde_json::from_str(&body)?;
        if let Some(error) = account.error {
            return Err(ChainError::Rpc { code: -1, message: error });
        }
        from_base_units(u128::from(account.balance.unwrap_or(0)), SUN_DECIMALS)
    }
}
