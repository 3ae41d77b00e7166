//! UTXOs and sweep fee policy.

use bitcoin::Txid;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::blockchain::traits::FeeEstimates;
use crate::core::errors::ChainError;

/// Segwit v0 transaction overhead in vbytes (10.5, rounded up).
const TX_OVERHEAD_VBYTES: u64 = 11;
/// P2WPKH input: 41 non-witness bytes + ~107 witness bytes / 4.
const P2WPKH_INPUT_VBYTES: u64 = 68;
/// Output without its script: 8 value + 1 script length.
const OUTPUT_BASE_VBYTES: u64 = 9;

/// Outputs below this are non-standard and never relayed.
pub const DUST_THRESHOLD: u64 = 546;

/// An unspent output as reported by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    /// Amount in satoshi.
    #[serde(rename = "value")]
    pub value_sats: u64,
    #[serde(default)]
    pub status: UtxoStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoStatus {
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
}

impl Utxo {
    pub fn new(txid: impl Into<String>, vout: u32, value_sats: u64) -> Self {
        Self {
            txid: txid.into(),
            vout,
            value_sats,
            status: UtxoStatus {
                confirmed: true,
                block_height: None,
            },
        }
    }

    pub fn txid(&self) -> Result<Txid, ChainError> {
        Txid::from_str(&self.txid)
            .map_err(|e| ChainError::Parse(format!("invalid txid '{}': {}", self.txid, e)))
    }
}

/// Virtual size of a transaction spending `inputs` P2WPKH outputs into one
/// output whose script is `output_script_len` bytes (22 for P2WPKH, 34 for P2TR).
pub fn estimate_vsize(inputs: usize, output_script_len: usize) -> u64 {
    TX_OVERHEAD_VBYTES + P2WPKH_INPUT_VBYTES * inputs as u64 + OUTPUT_BASE_VBYTES + output_script_len as u64
}

/// How the sweep fee is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FeePolicy {
    /// Flat fee regardless of size.
    Fixed { sats: u64 },
    /// Fee rate applied to the estimated vsize.
    Rate { sat_per_vbyte: u64 },
    /// Rate from the indexer's `/fee-estimates` for a confirmation target.
    Indexer {
        target_blocks: u16,
        fallback_sat_per_vbyte: u64,
    },
}

impl Default for FeePolicy {
    fn default() -> Self {
        FeePolicy::Indexer {
            target_blocks: 6,
            fallback_sat_per_vbyte: 5,
        }
    }
}

impl FeePolicy {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            FeePolicy::Fixed { sats } if *sats == 0 => Err("fixed fee must be positive".to_string()),
            FeePolicy::Rate { sat_per_vbyte } if *sat_per_vbyte == 0 => {
                Err("fee rate must be positive".to_string())
            }
            FeePolicy::Indexer {
                target_blocks,
                fallback_sat_per_vbyte,
            } if *target_blocks == 0 || *fallback_sat_per_vbyte == 0 => {
                Err("indexer fee target and fallback must be positive".to_string())
            }
            _ => Ok(()),
        }
    }

    pub fn needs_estimates(&self) -> bool {
        matches!(self, FeePolicy::Indexer { .. })
    }

    /// Fee in satoshi for a sweep of `inputs` into one output paying a script
    /// of `output_script_len` bytes.
    ///
    /// `estimates` is only consulted by [`FeePolicy::Indexer`]; `None` means the
    /// indexer could not be reached and the fallback rate applies.
    pub fn fee_for(&self, inputs: usize, output_script_len: usize, estimates: Option<&FeeEstimates>) -> u64 {
        let vsize = estimate_vsize(inputs, output_script_len);
        match self {
            FeePolicy::Fixed { sats } => *sats,
            FeePolicy::Rate { sat_per_vbyte } => vsize.saturating_mul(*sat_per_vbyte),
            FeePolicy::Indexer {
                target_blocks,
                fallback_sat_per_vbyte,
            } => {
                let rate = estimates
                    .and_then(|e| rate_for_target(e, *target_blocks))
                    .unwrap_or(*fallback_sat_per_vbyte);
                vsize.saturating_mul(rate)
            }
        }
    }
}

/// Rate for the highest target at or below `target`, rounded up to whole sat/vB.
fn rate_for_target(estimates: &FeeEstimates, target: u16) -> Option<u64> {
    estimates
        .iter()
        .filter(|(blocks, rate)| *blocks <= target && rate.is_finite() && *rate > 0.0)
        .max_by_key(|(blocks, _)| *blocks)
        .map(|(_, rate)| rate.ceil() as u64)
}
