//! Esplora wire format and an end-to-end sweep over HTTP.

use hd_custody::blockchain::bitcoin::EsploraClient;
use hd_custody::blockchain::rpc::http_client;
use hd_custody::blockchain::UtxoSource;
use hd_custody::core::config::CustodyConfig;
use hd_custody::service::sweep::SweepState;
use hd_custody::{ChainError, CustodyService, MasterSeed, Network};
use httpmock::{Method, MockServer};
use serde_json::json;
use std::time::Duration;

const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn client(server: &MockServer) -> EsploraClient {
    EsploraClient::new(format!("{}/", server.base_url()), http_client(Duration::from_secs(5)).unwrap())
}

#[tokio::test]
async fn fetch_raw_transaction_trims_body() {
    let server = MockServer::start_async().await;
    let txid = "ab".repeat(32);
    server
        .mock_async(|when, then| {
            when.method(Method::GET).path(format!("/tx/{}/hex", txid));
            then.status(200).body("0200000000\n");
        })
        .await;

    assert_eq!(client(&server).fetch_raw_transaction(&txid).await.unwrap(), "0200000000");
}

#[tokio::test]
async fn broadcast_posts_raw_hex() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/tx").body("deadbeef");
            then.status(200).body("cd".repeat(32));
        })
        .await;

    let txid = client(&server).broadcast("deadbeef").await.unwrap();
    assert_eq!(txid, "cd".repeat(32));
    mock.assert_async().await;
}

#[tokio::test]
async fn broadcast_rejection_carries_relay_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/tx");
            then.status(400)
                .body("sendrawtransaction RPC error: {\"code\":-26,\"message\":\"dust\"}");
        })
        .await;

    match client(&server).broadcast("00").await {
        Err(ChainError::Rejected(msg)) => assert!(msg.contains("dust")),
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn server_errors_are_retryable() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/tx");
            then.status(503);
        })
        .await;

    let err = client(&server).broadcast("00").await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn slow_indexer_surfaces_timeout() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::GET).path_contains("/utxo");
            then.status(200).json_body(json!([])).delay(Duration::from_secs(3));
        })
        .await;

    let client = EsploraClient::new(server.base_url(), http_client(Duration::from_secs(1)).unwrap());
    let err = client.fetch_utxos("bc1qany").await.unwrap_err();
    assert!(matches!(err, ChainError::Timeout), "{:?}", err);
    assert_eq!(err.to_string(), "request timed out");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn fee_estimates_sorted_by_target() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::GET).path("/fee-estimates");
            then.status(200)
                .json_body(json!({"144": 1.027, "1": 87.882, "6": 68.285, "3": 75.5}));
        })
        .await;

    let estimates = client(&server).fee_estimates().await.unwrap();
    let targets: Vec<u16> = estimates.iter().map(|(t, _)| *t).collect();
    assert_eq!(targets, vec![1, 3, 6, 144]);
}

#[tokio::test]
async fn malformed_utxo_list_is_parse_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::GET).path_contains("/utxo");
            then.status(200).json_body(json!({"unexpected": true}));
        })
        .await;

    assert!(matches!(
        client(&server).fetch_utxos("bc1qany").await,
        Err(ChainError::Parse(_))
    ));
}

#[tokio::test]
async fn custody_service_sweep_over_http_with_empty_wallet() {
    let server = MockServer::start_async().await;
    let config = CustodyConfig::from_toml_str(&format!(
        r#"
[endpoints]
btc_indexer_url = "{}"

[treasury]
btc = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"

[sweep.fee]
policy = "fixed"
sats = 2000
"#,
        server.base_url()
    ))
    .unwrap();

    let service =
        CustodyService::from_config(MasterSeed::from_mnemonic(TEST_MNEMONIC, "").unwrap(), config).unwrap();
    let source = service.derive_key(Network::Btc, 0).unwrap();

    let utxos = server
        .mock_async(|when, then| {
            when.method(Method::GET).path(format!("/address/{}/utxo", source.address));
            then.status(200).json_body(json!([]));
        })
        .await;
    let relay = server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/tx");
            then.status(200).body("00");
        })
        .await;

    let report = service.sweep(Network::Btc, 0).await.unwrap();
    assert_eq!(report.status, SweepState::Empty);
    utxos.assert_async().await;
    relay.assert_hits_async(0).await;

    // Balance through the same indexer.
    assert!(service.read_balance(Network::Btc, &source.address).await.is_ok());
}

#[tokio::test]
async fn custody_service_rejects_sweep_without_treasury() {
    let service = CustodyService::from_config(
        MasterSeed::from_mnemonic(TEST_MNEMONIC, "").unwrap(),
        CustodyConfig::default(),
    )
    .unwrap();
    assert!(service.sweep(Network::Btc, 0).await.is_err());
    assert!(service.sweep(Network::Sol, 0).await.is_err());
}
