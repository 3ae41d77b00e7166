//! Minimal JSON-RPC 2.0 client shared by the EVM and Solana adapters.

use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::core::errors::ChainError;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

pub struct JsonRpcClient {
    url: String,
    http: HttpClient,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, http: HttpClient) -> Self {
        Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, url = %self.url, "rpc call");

        let response = self.http.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let rpc: RpcResponse = response.json().await?;
        if let Some(error) = rpc.error {
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        let result = rpc
            .result
            .ok_or_else(|| ChainError::Parse(format!("{}: response has no result", method)))?;
        Ok(serde_json::from_value(result)?)
    }
}

/// HTTP client with the configured per-request timeout.
pub fn http_client(timeout: Duration) -> Result<HttpClient, ChainError> {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ChainError::Network(format!("failed to build HTTP client: {}", e)))
}
