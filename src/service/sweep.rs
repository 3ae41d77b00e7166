//! Sweep Pipeline.
//!
//! One attempt per source address moves through
//! `Idle -> FetchingUtxos -> BuildingTransaction -> Signing -> Broadcasting`
//! and ends in `Confirmed`, `Empty`, `InsufficientBalance` or `Failed`.
//! Transactional failures are data ([`SweepOutcome`]); only request validation
//! (unsupported network, bad treasury address) is an `Err`. Nothing is retried
//! here: the next attempt refetches UTXOs from scratch.

use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::{Address, ScriptBuf};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::blockchain::bitcoin::transaction::{self, bind_prevout, build_unsigned, plan_sweep, InputSigner, SweepPlan};
use crate::blockchain::bitcoin::utxo::FeePolicy;
use crate::blockchain::UtxoSource;
use crate::core::derivation::KeyDerivationEngine;
use crate::core::domain::{DerivedKey, Network};
use crate::core::errors::{ChainError, DerivationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepState {
    Idle,
    FetchingUtxos,
    BuildingTransaction,
    Signing,
    Broadcasting,
    Confirmed,
    Empty,
    InsufficientBalance,
    Failed,
}

impl SweepState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SweepState::Confirmed | SweepState::Empty | SweepState::InsufficientBalance | SweepState::Failed
        )
    }

    fn can_advance_to(self, next: SweepState) -> bool {
        use SweepState::*;
        match (self, next) {
            (_, Failed) => !self.is_terminal(),
            (Idle, FetchingUtxos) => true,
            (FetchingUtxos, Empty | InsufficientBalance | BuildingTransaction) => true,
            (BuildingTransaction, Signing) => true,
            (Signing, Broadcasting) => true,
            (Broadcasting, Confirmed) => true,
            _ => false,
        }
    }
}

/// Terminal result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Confirmed {
        txid: String,
        amount_sats: u64,
        fee_sats: u64,
    },
    Empty,
    InsufficientBalance {
        total_sats: u64,
        fee_sats: u64,
    },
    Failed {
        reason: String,
        retryable: bool,
    },
}

impl SweepOutcome {
    pub fn state(&self) -> SweepState {
        match self {
            SweepOutcome::Confirmed { .. } => SweepState::Confirmed,
            SweepOutcome::Empty => SweepState::Empty,
            SweepOutcome::InsufficientBalance { .. } => SweepState::InsufficientBalance,
            SweepOutcome::Failed { .. } => SweepState::Failed,
        }
    }

    fn failed(err: impl std::fmt::Display, retryable: bool) -> Self {
        SweepOutcome::Failed {
            reason: err.to_string(),
            retryable,
        }
    }
}

/// Serializable summary handed to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub status: SweepState,
    pub network: Network,
    pub index: u32,
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_sats: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_sats: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl SweepReport {
    pub fn new(outcome: &SweepOutcome, network: Network, index: u32, from: &str, to: &str) -> Self {
        let mut report = Self {
            status: outcome.state(),
            network,
            index,
            from: from.to_string(),
            to: to.to_string(),
            txid: None,
            amount_sats: None,
            fee_sats: None,
            error: None,
            retryable: false,
        };
        match outcome {
            SweepOutcome::Confirmed {
                txid,
                amount_sats,
                fee_sats,
            } => {
                report.txid = Some(txid.clone());
                report.amount_sats = Some(*amount_sats);
                report.fee_sats = Some(*fee_sats);
            }
            SweepOutcome::Empty => {}
            SweepOutcome::InsufficientBalance { total_sats, fee_sats } => {
                report.amount_sats = Some(*total_sats);
                report.fee_sats = Some(*fee_sats);
            }
            SweepOutcome::Failed { reason, retryable } => {
                report.error = Some(reason.clone());
                report.retryable = *retryable;
            }
        }
        report
    }
}

/// One async lock per source address.
#[derive(Default)]
pub struct AddressLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl AddressLocks {
    pub async fn acquire(&self, address: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock();
            // Drop entries nobody holds or waits on.
            map.retain(|key, lock| key == address || Arc::strong_count(lock) > 1);
            map.entry(address.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// State tracker for one attempt.
struct Attempt<'a> {
    address: &'a str,
    state: SweepState,
}

impl<'a> Attempt<'a> {
    fn new(address: &'a str) -> Self {
        Self {
            address,
            state: SweepState::Idle,
        }
    }

    fn advance(&mut self, next: SweepState) {
        debug_assert!(self.state.can_advance_to(next), "{:?} -> {:?}", self.state, next);
        debug!(address = self.address, from = ?self.state, to = ?next, "sweep state");
        self.state = next;
    }

    fn finish(mut self, outcome: SweepOutcome) -> SweepOutcome {
        self.advance(outcome.state());
        outcome
    }
}

pub struct SweepPipeline {
    engine: Arc<KeyDerivationEngine>,
    source: Arc<dyn UtxoSource>,
    fee_policy: FeePolicy,
    locks: AddressLocks,
    secp: Secp256k1<All>,
}

impl SweepPipeline {
    pub fn new(engine: Arc<KeyDerivationEngine>, source: Arc<dyn UtxoSource>, fee_policy: FeePolicy) -> Self {
        Self {
            engine,
            source,
            fee_policy,
            locks: AddressLocks::default(),
            secp: Secp256k1::new(),
        }
    }

    /// Sweep everything held by the address of `source_index` into `treasury`.
    pub async fn sweep(
        &self,
        network: Network,
        source_index: u32,
        treasury: &str,
    ) -> Result<SweepReport, DerivationError> {
        if !network.spec().utxo_model {
            return Err(DerivationError::UnsupportedNetwork(format!(
                "{} is not sweepable by this service",
                network
            )));
        }
        let destination = self.destination_script(treasury)?;
        let key = self.engine.derive_key(network, source_index)?;

        let _guard = self.locks.acquire(&key.address).await;
        info!(network = %network, index = source_index, from = %key.address, to = treasury, "sweep started");

        let outcome = self.attempt(&key, &destination).await;
        match &outcome {
            SweepOutcome::Confirmed { txid, amount_sats, .. } => {
                info!(from = %key.address, txid = %txid, amount_sats, "sweep confirmed by relay")
            }
            SweepOutcome::Failed { reason, retryable } => {
                warn!(from = %key.address, reason = %reason, retryable, "sweep failed")
            }
            other => info!(from = %key.address, state = ?other.state(), "sweep finished"),
        }
        Ok(SweepReport::new(&outcome, network, source_index, &key.address, treasury))
    }

    fn destination_script(&self, treasury: &str) -> Result<ScriptBuf, DerivationError> {
        let invalid = |reason: String| DerivationError::invalid_address(Network::Btc, treasury, reason);
        Ok(Address::from_str(treasury)
            .map_err(|e| invalid(e.to_string()))?
            .require_network(self.engine.bitcoin_network())
            .map_err(|e| invalid(e.to_string()))?
            .script_pubkey())
    }

    async fn attempt(&self, key: &DerivedKey, destination: &ScriptBuf) -> SweepOutcome {
        let mut attempt = Attempt::new(&key.address);
        let source_script = match self.destination_script(&key.address) {
            Ok(script) => script,
            Err(e) => return attempt.finish(SweepOutcome::failed(e, false)),
        };

        attempt.advance(SweepState::FetchingUtxos);
        let utxos = match self.source.fetch_utxos(&key.address).await {
            Ok(utxos) => utxos,
            Err(e) => {
                let retryable = e.is_retryable();
                return attempt.finish(SweepOutcome::failed(e, retryable));
            }
        };

        if utxos.is_empty() {
            return attempt.finish(SweepOutcome::Empty);
        }

        let estimates = self.fee_estimates().await;
        let fee_sats = self
            .fee_policy
            .fee_for(utxos.len(), destination.len(), estimates.as_ref());
        let (inputs, total_sats, send_sats) = match plan_sweep(utxos, fee_sats) {
            SweepPlan::Empty => return attempt.finish(SweepOutcome::Empty),
            SweepPlan::Insufficient { total_sats, fee_sats } => {
                return attempt.finish(SweepOutcome::InsufficientBalance { total_sats, fee_sats })
            }
            SweepPlan::Ready {
                inputs,
                total_sats,
                send_sats,
                ..
            } => (inputs, total_sats, send_sats),
        };
        debug!(address = %key.address, inputs = inputs.len(), total_sats, fee_sats, send_sats, "sweep planned");

        attempt.advance(SweepState::BuildingTransaction);
        let mut prevouts = Vec::with_capacity(inputs.len());
        for utxo in &inputs {
            let raw = match self.source.fetch_raw_transaction(&utxo.txid).await {
                Ok(raw) => raw,
                Err(e) => {
                    let retryable = e.is_retryable();
                    return attempt.finish(SweepOutcome::failed(e, retryable));
                }
            };
            match bind_prevout(utxo, &raw, &source_script) {
                Ok(prevout) => prevouts.push(prevout),
                Err(e) => return attempt.finish(SweepOutcome::failed(e, false)),
            }
        }
        let mut tx = match build_unsigned(&inputs, destination, send_sats) {
            Ok(tx) => tx,
            Err(e) => return attempt.finish(SweepOutcome::failed(e, false)),
        };

        attempt.advance(SweepState::Signing);
        let signed = InputSigner::new(&self.secp, &key.private_key)
            .and_then(|signer| signer.sign_all(&self.secp, &mut tx, &prevouts));
        if let Err(e) = signed {
            return attempt.finish(SweepOutcome::failed(e, false));
        }
        let txid = tx.txid().to_string();

        attempt.advance(SweepState::Broadcasting);
        match self.source.broadcast(&transaction::serialize(&tx)).await {
            Ok(relay_txid) => {
                if relay_txid != txid {
                    warn!(expected = %txid, relay = %relay_txid, "relay reported a different txid");
                }
                attempt.finish(SweepOutcome::Confirmed {
                    txid,
                    amount_sats: send_sats,
                    fee_sats,
                })
            }
            Err(ChainError::Rejected(reason)) => attempt.finish(SweepOutcome::Failed {
                reason: format!("relay rejected transaction: {}", reason),
                retryable: false,
            }),
            Err(e) => {
                let retryable = e.is_retryable();
                attempt.finish(SweepOutcome::failed(e, retryable))
            }
        }
    }

    async fn fee_estimates(&self) -> Option<crate::blockchain::FeeEstimates> {
        if !self.fee_policy.needs_estimates() {
            return None;
        }
        match self.source.fee_estimates().await {
            Ok(estimates) => Some(estimates),
            Err(e) => {
                warn!(error = %e, "fee estimates unavailable, using fallback rate");
                None
            }
        }
    }
}
