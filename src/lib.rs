//! HD custody core.
//!
//! Derives per-user deposit addresses for BTC, ETH, ERC-20, TRX and SOL from a
//! single BIP39 mnemonic, reads their balances through per-network adapters,
//! and sweeps BTC deposits into a treasury address.

pub mod blockchain;
pub mod core;
pub mod service;

pub use crate::core::config::CustodyConfig;
pub use crate::core::derivation::{DerivationScheme, KeyDerivationEngine};
pub use crate::core::domain::{DerivedKey, Network};
pub use crate::core::errors::{ChainError, ConfigError, DerivationError, SeedError};
pub use crate::core::seed::MasterSeed;
pub use crate::service::{BalanceReading, CustodyService, SweepReport};
