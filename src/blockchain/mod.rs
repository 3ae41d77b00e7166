pub mod bitcoin;
pub mod ethereum;
pub mod rpc;
pub mod solana;
pub mod traits;
pub mod tron;

pub use traits::{BalanceAdapter, FeeEstimates, UtxoSource};
