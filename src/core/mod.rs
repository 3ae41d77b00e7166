pub mod config;
pub mod derivation;
pub mod domain;
pub mod errors;
pub mod seed;
pub mod units;

pub use derivation::KeyDerivationEngine;
pub use domain::{DerivedKey, Network, PrivateKey};
pub use seed::MasterSeed;
