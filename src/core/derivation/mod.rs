//! Key Derivation Engine.
//!
//! One engine owns the master seed and turns `(network, index)` into a
//! [`DerivedKey`]. The curve, path template and address encoder all come from
//! the network table, so there is exactly one canonical derivation per network.
//! The account-indexed scheme is only reachable through [`KeyDerivationEngine::locate`]
//! and [`KeyDerivationEngine::derive_with_scheme`] for recovering old addresses.

pub mod address;
pub mod bip32;
pub mod path;
pub mod slip10;

use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::Network as BtcNetwork;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::domain::{Curve, DerivedKey, Network, PrivateKey};
use crate::core::errors::DerivationError;
use crate::core::seed::MasterSeed;

pub use address::validate_address;
pub use bip32::Bip32;
pub use path::{ChildNumber, DerivationPath};
pub use slip10::Slip10Ed25519;

/// Path layouts the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationScheme {
    /// The network table's template. Used for all issuance.
    Canonical,
    /// `m/44'/coin'/{index}'/0/0` (SOL: `m/44'/501'/0'/{index}'`). Recovery only.
    AccountIndexed,
}

impl DerivationScheme {
    pub const ALL: [DerivationScheme; 2] = [DerivationScheme::Canonical, DerivationScheme::AccountIndexed];

    pub fn template(self, network: Network) -> String {
        let spec = network.spec();
        match self {
            DerivationScheme::Canonical => spec.path_template.to_string(),
            DerivationScheme::AccountIndexed => match spec.curve {
                Curve::Secp256k1 => format!("m/44'/{}'/{{index}}'/0/0", spec.coin_type),
                Curve::Ed25519 => format!("m/44'/{}'/0'/{{index}}'", spec.coin_type),
            },
        }
    }
}

/// A `locate` hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatedAddress {
    pub scheme: DerivationScheme,
    pub index: u32,
    pub path: String,
}

pub struct KeyDerivationEngine {
    seed: MasterSeed,
    secp: Secp256k1<All>,
    btc_network: BtcNetwork,
}

impl KeyDerivationEngine {
    pub fn new(seed: MasterSeed) -> Self {
        Self {
            seed,
            secp: Secp256k1::new(),
            btc_network: BtcNetwork::Bitcoin,
        }
    }

    /// Select the Bitcoin network used for address HRPs.
    pub fn with_bitcoin_network(mut self, network: BtcNetwork) -> Self {
        self.btc_network = network;
        self
    }

    pub fn bitcoin_network(&self) -> BtcNetwork {
        self.btc_network
    }

    /// Canonical key for a user index on a network.
    pub fn derive_key(&self, network: Network, index: u32) -> Result<DerivedKey, DerivationError> {
        self.derive_with_scheme(network, index, DerivationScheme::Canonical)
    }

    pub fn derive_with_scheme(
        &self,
        network: Network,
        index: u32,
        scheme: DerivationScheme,
    ) -> Result<DerivedKey, DerivationError> {
        let path = DerivationPath::from_template(network, &scheme.template(network), index)?;
        let key = self.derive_at(&path)?;
        debug!(network = %network, index, path = %path, address = %key.address, "derived key");
        Ok(key)
    }

    /// Derive along an explicit path, checked against the network's curve.
    pub fn derive_path(&self, network: Network, path: &str) -> Result<DerivedKey, DerivationError> {
        let path = DerivationPath::parse(network, path)?;
        self.derive_at(&path)
    }

    fn derive_at(&self, path: &DerivationPath) -> Result<DerivedKey, DerivationError> {
        let seed = self.seed.expose();
        let (public_key, private_key, address) = match path.curve {
            Curve::Secp256k1 => {
                let node = Bip32::from_seed(seed)?.derive_path(&self.secp, path.children())?;
                let public = node.public_key(&self.secp);
                let address = match path.network {
                    Network::Btc => address::bitcoin_p2wpkh(&public, self.btc_network)?,
                    Network::Eth | Network::Erc20 => address::ethereum_address(&public),
                    Network::Trx => address::tron_address(&public),
                    Network::Sol => {
                        return Err(DerivationError::KeyDerivation(
                            "SOL keys are ed25519".to_string(),
                        ))
                    }
                };
                let secret = node.secret_bytes();
                (public.serialize().to_vec(), PrivateKey::new(*secret), address)
            }
            Curve::Ed25519 => {
                let node = Slip10Ed25519::from_seed(seed)?.derive_path(path.children())?;
                let public = node.public_key();
                let secret = node.secret_bytes();
                (public.to_vec(), PrivateKey::new(*secret), address::solana_address(&public))
            }
        };

        Ok(DerivedKey {
            network: path.network,
            index: path.index.unwrap_or_else(|| last_index(path)),
            path: path.to_string(),
            address,
            public_key,
            private_key,
        })
    }

    pub fn validate_address(&self, network: Network, address: &str) -> Result<(), DerivationError> {
        validate_address(network, address, self.btc_network)
    }

    /// Find which scheme and index produced `address`, scanning `0..=max_index`.
    /// Discovery only: nothing is swept.
    pub fn locate(
        &self,
        network: Network,
        address: &str,
        max_index: u32,
    ) -> Result<Vec<LocatedAddress>, DerivationError> {
        self.validate_address(network, address)?;
        let want = normalize(network, address);

        let mut hits = Vec::new();
        for scheme in DerivationScheme::ALL {
            for index in 0..=max_index {
                let key = self.derive_with_scheme(network, index, scheme)?;
                if normalize(network, &key.address) == want {
                    hits.push(LocatedAddress {
                        scheme,
                        index,
                        path: key.path.clone(),
                    });
                }
            }
        }
        info!(network = %network, address, max_index, hits = hits.len(), "locate finished");
        Ok(hits)
    }
}

impl std::fmt::Debug for KeyDerivationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDerivationEngine")
            .field("seed", &self.seed)
            .field("btc_network", &self.btc_network)
            .finish()
    }
}

/// `derive_key(seed, network, index)` without holding an engine.
pub fn derive_key(seed: MasterSeed, network: Network, index: u32) -> Result<DerivedKey, DerivationError> {
    KeyDerivationEngine::new(seed).derive_key(network, index)
}

fn last_index(path: &DerivationPath) -> u32 {
    path.children().last().map(|c| c.index).unwrap_or(0)
}

// EVM addresses compare case-insensitively; bech32 is lowercase on the wire.
fn normalize(network: Network, address: &str) -> String {
    match network {
        Network::Eth | Network::Erc20 | Network::Btc => address.to_ascii_lowercase(),
        Network::Trx | Network::Sol => address.to_string(),
    }
}
