//! Network-specific address encoding and validation.
//!
//! - BTC: bech32 P2WPKH
//! - ETH / ERC-20: EIP-55 checksummed hex of `keccak256(pubkey)[12..]`
//! - TRX: base58check of `0x41 || keccak256(pubkey)[12..]`
//! - SOL: base58 of the raw ed25519 public key

use bitcoin::secp256k1::PublicKey;
use bitcoin::{Address, Network as BtcNetwork, PublicKey as BitcoinPublicKey};
use sha3::{Digest, Keccak256};
use std::str::FromStr;

use crate::core::domain::Network;
use crate::core::errors::DerivationError;

const TRON_PREFIX: u8 = 0x41;

pub fn bitcoin_p2wpkh(public_key: &PublicKey, network: BtcNetwork) -> Result<String, DerivationError> {
    let btc_pubkey = BitcoinPublicKey::new(*public_key);
    let address = Address::p2wpkh(&btc_pubkey, network)
        .map_err(|e| DerivationError::KeyDerivation(format!("P2WPKH address failed: {}", e)))?;
    Ok(address.to_string())
}

/// Last 20 bytes of keccak256 over the uncompressed key without its 0x04 prefix.
fn keccak_account_id(public_key: &PublicKey) -> [u8; 20] {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = Keccak256::digest(&uncompressed[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    out
}

pub fn ethereum_address(public_key: &PublicKey) -> String {
    to_checksum(&keccak_account_id(public_key))
}

/// EIP-55 mixed-case checksum encoding.
pub fn to_checksum(account: &[u8; 20]) -> String {
    let lower = hex::encode(account);
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> if i % 2 == 0 { 4 } else { 0 }) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn tron_address(public_key: &PublicKey) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(TRON_PREFIX);
    payload.extend_from_slice(&keccak_account_id(public_key));
    bs58::encode(payload).with_check().into_string()
}

pub fn solana_address(public_key: &[u8; 32]) -> String {
    bs58::encode(public_key).into_string()
}

/// Check that `address` is well-formed for `network`.
pub fn validate_address(network: Network, address: &str, btc_network: BtcNetwork) -> Result<(), DerivationError> {
    let invalid = |reason: String| DerivationError::invalid_address(network, address, reason);

    match network {
        Network::Btc => {
            Address::from_str(address)
                .map_err(|e| invalid(e.to_string()))?
                .require_network(btc_network)
                .map_err(|e| invalid(e.to_string()))?;
            Ok(())
        }
        Network::Eth | Network::Erc20 => {
            let body = address
                .strip_prefix("0x")
                .ok_or_else(|| invalid("missing 0x prefix".to_string()))?;
            let bytes = hex::decode(body).map_err(|e| invalid(e.to_string()))?;
            let account: [u8; 20] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| invalid(format!("expected 20 bytes, got {}", bytes.len())))?;
            let mixed_case = body.chars().any(|c| c.is_ascii_uppercase())
                && body.chars().any(|c| c.is_ascii_lowercase());
            if mixed_case && to_checksum(&account) != address {
                return Err(invalid("EIP-55 checksum mismatch".to_string()));
            }
            Ok(())
        }
        Network::Trx => {
            let bytes = bs58::decode(address)
                .with_check(None)
                .into_vec()
                .map_err(|e| invalid(e.to_string()))?;
            if bytes.len() != 21 || bytes[0] != TRON_PREFIX {
                return Err(invalid("expected 21 bytes with 0x41 prefix".to_string()));
            }
            Ok(())
        }
        Network::Sol => {
            let bytes = bs58::decode(address)
                .into_vec()
                .map_err(|e| invalid(e.to_string()))?;
            if bytes.len() != 32 {
                return Err(invalid(format!("expected 32 bytes, got {}", bytes.len())));
            }
            Ok(())
        }
    }
}
