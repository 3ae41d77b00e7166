//! Process startup from the environment: mnemonic variables and config file discovery.

use hd_custody::core::config::CustodyConfig;
use hd_custody::core::seed::{MNEMONIC_ENV, PASSPHRASE_ENV};
use hd_custody::{ConfigError, CustodyService, MasterSeed, Network, SeedError};
use serial_test::serial;
use std::env;
use std::io::Write;

const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn clear_env() {
    env::remove_var(MNEMONIC_ENV);
    env::remove_var(PASSPHRASE_ENV);
    env::remove_var("CONFIG_PATH");
    env::remove_var("CUSTODY_EVM_RPC_URL");
}

#[test]
#[serial]
fn missing_mnemonic_is_fatal() {
    clear_env();
    assert!(matches!(MasterSeed::from_env(), Err(SeedError::Missing(_))));

    env::set_var(MNEMONIC_ENV, "   ");
    assert!(matches!(MasterSeed::from_env(), Err(SeedError::Missing(_))));
    clear_env();
}

#[test]
#[serial]
fn invalid_mnemonic_is_fatal() {
    clear_env();
    env::set_var(MNEMONIC_ENV, "abandon abandon abandon");
    assert!(MasterSeed::from_env().is_err());
    clear_env();
}

#[test]
#[serial]
fn passphrase_from_env_changes_addresses() {
    clear_env();
    env::set_var(MNEMONIC_ENV, TEST_MNEMONIC);
    let plain = CustodyService::from_env(CustodyConfig::default())
        .unwrap()
        .derive_key(Network::Eth, 0)
        .unwrap();
    assert_eq!(plain.address, "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");

    env::set_var(PASSPHRASE_ENV, "TREZOR");
    let salted = CustodyService::from_env(CustodyConfig::default())
        .unwrap()
        .derive_key(Network::Eth, 0)
        .unwrap();
    assert_ne!(plain.address, salted.address);
    clear_env();
}

#[test]
#[serial]
fn load_reads_config_path_and_env_overrides() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[endpoints]
btc_indexer_url = "http://127.0.0.1:3002"

[bitcoin]
network = "testnet"

[treasury]
btc = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx"
"#
    )
    .unwrap();

    env::set_var("CONFIG_PATH", file.path());
    env::set_var("CUSTODY_EVM_RPC_URL", "http://127.0.0.1:8545");
    let config = CustodyConfig::load().unwrap();
    assert_eq!(config.endpoints.btc_indexer_url, "http://127.0.0.1:3002");
    assert_eq!(config.endpoints.evm_rpc_url, "http://127.0.0.1:8545");
    assert_eq!(config.bitcoin_network(), bitcoin::Network::Testnet);
    clear_env();
}

#[test]
#[serial]
fn load_without_file_uses_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    env::set_var("CONFIG_PATH", dir.path().join("absent.toml"));
    let config = CustodyConfig::load().unwrap();
    assert_eq!(config.bitcoin_network(), bitcoin::Network::Bitcoin);
    assert!(config.treasury_for(Network::Btc).is_none());
    clear_env();
}

#[test]
#[serial]
fn load_rejects_inconsistent_file() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    // Mainnet by default, testnet treasury.
    writeln!(file, "[treasury]\nbtc = \"tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx\"").unwrap();
    env::set_var("CONFIG_PATH", file.path());
    assert!(matches!(CustodyConfig::load(), Err(ConfigError::Invalid(_))));

    let mut broken = tempfile::NamedTempFile::new().unwrap();
    writeln!(broken, "[endpoints\nbtc_indexer_url = 1").unwrap();
    env::set_var("CONFIG_PATH", broken.path());
    assert!(CustodyConfig::load().is_err());
    clear_env();
}
