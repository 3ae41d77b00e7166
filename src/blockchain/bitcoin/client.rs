//! Esplora REST client: UTXO source, relay and BTC balance adapter.
//!
//! Endpoints used:
//! - `GET  /address/:address/utxo`
//! - `GET  /tx/:txid/hex`
//! - `POST /tx` (raw hex body, txid in response body)
//! - `GET  /fee-estimates`

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::utxo::Utxo;
use crate::blockchain::traits::{BalanceAdapter, FeeEstimates, UtxoSource};
use crate::core::domain::Network;
use crate::core::errors::ChainError;
use crate::core::units::from_base_units;

pub struct EsploraClient {
    base_url: String,
    http: HttpClient,
}

impl EsploraClient {
    pub fn new(base_url: impl Into<String>, http: HttpClient) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_text(&self, path: &str) -> Result<String, ChainError> {
        let response = self.http.get(self.url(path)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ChainError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl UtxoSource for EsploraClient {
    async fn fetch_utxos(&self, address: &str) -> Result<Vec<Utxo>, ChainError> {
        let body = self.get_text(&format!("/address/{}/utxo", address)).await?;
        let utxos: Vec<Utxo> = serde_json::from_str(&body)?;
        debug!(address, count = utxos.len(), "fetched utxos");
        Ok(utxos)
    }

    async fn fetch_raw_transaction(&self, txid: &str) -> Result<String, ChainError> {
        let body = self.get_text(&format!("/tx/{}/hex", txid)).await?;
        Ok(body.trim().to_string())
    }

    async fn broadcast(&self, tx_hex: &str) -> Result<String, ChainError> {
        let response = self
            .http
            .post(self.url("/tx"))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(tx_hex.to_string())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let txid = body.trim().to_string();
            info!(txid = %txid, "transaction relayed");
            return Ok(txid);
        }
        if status == StatusCode::BAD_REQUEST {
            // Esplora reports policy and consensus failures as 400 with the node's message.
            warn!(status = status.as_u16(), reason = %body.trim(), "relay rejected transaction");
            return Err(ChainError::Rejected(body.trim().to_string()));
        }
        Err(ChainError::Http {
            status: status.as_u16(),
            body,
        })
    }

    async fn fee_estimates(&self) -> Result<FeeEstimates, ChainError> {
        let body = self.get_text("/fee-estimates").await?;
        let raw: HashMap<String, f64> = serde_json::from_str(&body)?;
        let mut estimates = raw
            .into_iter()
            .map(|(target, rate)| {
                target
                    .parse::<u16>()
                    .map(|t| (t, rate))
                    .map_err(|_| ChainError::Parse(format!("bad fee target '{}'", target)))
            })
            .collect::<Result<FeeEstimates, _>>()?;
        estimates.sort_by_key(|(target, _)| *target);
        Ok(estimates)
    }
}

#[async_trait]
impl BalanceAdapter for EsploraClient {
    fn network(&self) -> Network {
        Network::Btc
    }

    async fn query_balance(&self, address: &str) -> Result<Decimal, ChainError> {
        let utxos = self.fetch_utxos(address).await?;
        let total = utxos
            .iter()
            .try_fold(0u128, |acc, u| acc.checked_add(u128::from(u.value_sats)))
            .ok_or_else(|| ChainError::Parse("UTXO sum overflow".to_string()))?;
        from_base_units(total, 8)
    }
}
