//! Core domain types: the network table, key material wrappers and derived keys.

use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::core::errors::DerivationError;

/// Elliptic curve a network signs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    /// BIP32 derivation, hardened and non-hardened steps.
    Secp256k1,
    /// SLIP-0010 derivation, hardened steps only.
    Ed25519,
}

/// Networks this core issues deposit addresses for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Btc,
    Eth,
    /// ERC-20 token on the EVM chain; shares ETH keys and addresses.
    Erc20,
    Trx,
    Sol,
}

/// One row of the network table.
#[derive(Debug, Clone, Copy)]
pub struct NetworkSpec {
    pub network: Network,
    pub symbol: &'static str,
    pub curve: Curve,
    pub coin_type: u32,
    /// Canonical derivation path; `{index}` is replaced by the user index.
    pub path_template: &'static str,
    /// Base-unit exponent. `None` means the asset declares its own (ERC-20).
    pub decimals: Option<u32>,
    /// Whether funds sit in UTXOs and can be swept by this core.
    pub utxo_model: bool,
}

const NETWORK_TABLE: [NetworkSpec; 5] = [
    NetworkSpec {
        network: Network::Btc,
        symbol: "BTC",
        curve: Curve::Secp256k1,
        coin_type: 0,
        path_template: "m/44'/0'/0'/0/{index}",
        decimals: Some(8),
        utxo_model: true,
    },
    NetworkSpec {
        network: Network::Eth,
        symbol: "ETH",
        curve: Curve::Secp256k1,
        coin_type: 60,
        path_template: "m/44'/60'/0'/0/{index}",
        decimals: Some(18),
        utxo_model: false,
    },
    NetworkSpec {
        network: Network::Erc20,
        symbol: "ERC20",
        curve: Curve::Secp256k1,
        coin_type: 60,
        path_template: "m/44'/60'/0'/0/{index}",
        decimals: None,
        utxo_model: false,
    },
    NetworkSpec {
        network: Network::Trx,
        symbol: "TRX",
        curve: Curve::Secp256k1,
        coin_type: 195,
        path_template: "m/44'/195'/0'/0/{index}",
        decimals: Some(6),
        utxo_model: false,
    },
    NetworkSpec {
        network: Network::Sol,
        symbol: "SOL",
        curve: Curve::Ed25519,
        coin_type: 501,
        path_template: "m/44'/501'/{index}'/0'",
        decimals: Some(9),
        utxo_model: false,
    },
];

impl Network {
    pub const ALL: [Network; 5] = [
        Network::Btc,
        Network::Eth,
        Network::Erc20,
        Network::Trx,
        Network::Sol,
    ];

    pub fn spec(self) -> &'static NetworkSpec {
        // The table is ordered like the enum.
        &NETWORK_TABLE[self as usize]
    }

    pub fn curve(self) -> Curve {
        self.spec().curve
    }

    pub fn symbol(self) -> &'static str {
        self.spec().symbol
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Network {
    type Err = DerivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btc" | "bitcoin" => Ok(Network::Btc),
            "eth" | "ethereum" => Ok(Network::Eth),
            "erc20" | "erc-20" | "usdt-erc20" | "usdt_erc20" => Ok(Network::Erc20),
            "trx" | "tron" => Ok(Network::Trx),
            "sol" | "solana" => Ok(Network::Sol),
            _ => Err(DerivationError::UnsupportedNetwork(s.to_string())),
        }
    }
}

/// 32-byte private key. Zeroized on drop and only reachable through scoped access.
pub struct PrivateKey(Secret<[u8; 32]>);

impl PrivateKey {
    pub fn new(k: [u8; 32]) -> Self {
        Self(Secret::new(k))
    }

    /// Try to construct a PrivateKey from a byte slice (must be 32 bytes).
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, DerivationError> {
        if slice.len() != 32 {
            return Err(DerivationError::KeyDerivation(format!(
                "private key must be 32 bytes, got {}",
                slice.len()
            )));
        }
        let mut arr = Zeroizing::new([0u8; 32]);
        arr.copy_from_slice(slice);
        Ok(PrivateKey::new(*arr))
    }

    /// Scoped access to the underlying secret bytes.
    pub fn with_secret<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8; 32]) -> R,
    {
        f(self.0.expose_secret())
    }

    /// Hex export for collaborators that store keys themselves.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0.expose_secret()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// Result of one derivation call. Drop it as soon as signing is done.
#[derive(Debug)]
pub struct DerivedKey {
    pub network: Network,
    pub index: u32,
    pub path: String,
    pub address: String,
    /// Compressed secp256k1 (33 bytes) or raw ed25519 (32 bytes) public key.
    pub public_key: Vec<u8>,
    pub private_key: PrivateKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_enum_order() {
        for network in Network::ALL {
            assert_eq!(network.spec().network, network);
        }
    }

    #[test]
    fn test_curve_conventions() {
        assert_eq!(Network::Btc.curve(), Curve::Secp256k1);
        assert_eq!(Network::Eth.curve(), Curve::Secp256k1);
        assert_eq!(Network::Erc20.curve(), Curve::Secp256k1);
        assert_eq!(Network::Trx.curve(), Curve::Secp256k1);
        assert_eq!(Network::Sol.curve(), Curve::Ed25519);
    }

    #[test]
    fn test_parse_network_tags() {
        assert_eq!("BTC".parse::<Network>().unwrap(), Network::Btc);
        assert_eq!("ethereum".parse::<Network>().unwrap(), Network::Eth);
        assert_eq!("usdt-erc20".parse::<Network>().unwrap(), Network::Erc20);
        assert_eq!("Tron".parse::<Network>().unwrap(), Network::Trx);
        assert_eq!(" sol ".parse::<Network>().unwrap(), Network::Sol);
        assert!(matches!(
            "doge".parse::<Network>(),
            Err(DerivationError::UnsupportedNetwork(tag)) if tag == "doge"
        ));
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let pk = PrivateKey::new([7u8; 32]);
        assert_eq!(format!("{:?}", pk), "PrivateKey([REDACTED])");
        assert_eq!(pk.to_hex().as_str(), "07".repeat(32));
    }

    #[test]
    fn test_private_key_rejects_short_slice() {
        assert!(PrivateKey::try_from_slice(&[1u8; 16]).is_err());
        assert!(PrivateKey::try_from_slice(&[1u8; 32]).is_ok());
    }
}
