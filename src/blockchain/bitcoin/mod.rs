//! Bitcoin support: Esplora indexer client, UTXOs and sweep transactions.

pub mod client;
pub mod transaction;
pub mod utxo;

pub use client::EsploraClient;
pub use transaction::{InputSigner, SweepPlan, TransactionError};
pub use utxo::{FeePolicy, Utxo, DUST_THRESHOLD};
