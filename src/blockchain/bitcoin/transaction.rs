//! Sweep transaction construction and P2WPKH signing.
//!
//! A sweep spends every UTXO of one address into a single treasury output,
//! no change. Each input is bound to the previous transaction it spends before
//! a signature is produced over it.

use bitcoin::absolute::LockTime;
use bitcoin::consensus::{deserialize, encode::serialize_hex};
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, Script, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use thiserror::Error;
use tracing::debug;

use super::utxo::{Utxo, DUST_THRESHOLD};
use crate::core::domain::PrivateKey;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("previous transaction {txid} is malformed: {reason}")]
    PrevTx { txid: String, reason: String },

    #[error("input {txid}:{vout} does not match the indexer: {reason}")]
    PrevoutMismatch { txid: String, vout: u32, reason: String },

    #[error("sighash computation failed: {0}")]
    Sighash(String),

    #[error("invalid signing key: {0}")]
    Key(String),
}

/// Result of checking UTXOs against the fee before anything is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepPlan {
    Empty,
    /// `total - fee` is not positive or would be dust.
    Insufficient { total_sats: u64, fee_sats: u64 },
    Ready {
        inputs: Vec<Utxo>,
        total_sats: u64,
        fee_sats: u64,
        send_sats: u64,
    },
}

pub fn plan_sweep(utxos: Vec<Utxo>, fee_sats: u64) -> SweepPlan {
    if utxos.is_empty() {
        return SweepPlan::Empty;
    }
    let total_sats = utxos.iter().fold(0u64, |acc, u| acc.saturating_add(u.value_sats));
    match total_sats.checked_sub(fee_sats) {
        Some(send_sats) if send_sats >= DUST_THRESHOLD => SweepPlan::Ready {
            inputs: utxos,
            total_sats,
            fee_sats,
            send_sats,
        },
        _ => SweepPlan::Insufficient { total_sats, fee_sats },
    }
}

/// Check that `raw_hex` is the transaction `utxo` claims to spend and that the
/// output pays `expected_script` with the indexer's value. Returns that output.
pub fn bind_prevout(utxo: &Utxo, raw_hex: &str, expected_script: &Script) -> Result<TxOut, TransactionError> {
    let prev_err = |reason: String| TransactionError::PrevTx {
        txid: utxo.txid.clone(),
        reason,
    };
    let mismatch = |reason: String| TransactionError::PrevoutMismatch {
        txid: utxo.txid.clone(),
        vout: utxo.vout,
        reason,
    };

    let bytes = hex::decode(raw_hex.trim()).map_err(|e| prev_err(e.to_string()))?;
    let prev: Transaction = deserialize(&bytes).map_err(|e| prev_err(e.to_string()))?;

    let actual_txid = prev.txid().to_string();
    if actual_txid != utxo.txid {
        return Err(mismatch(format!("transaction hashes to {}", actual_txid)));
    }

    let output = prev
        .output
        .get(utxo.vout as usize)
        .ok_or_else(|| mismatch(format!("transaction has {} outputs", prev.output.len())))?;

    if output.value.to_sat() != utxo.value_sats {
        return Err(mismatch(format!(
            "value is {} sat, indexer reported {} sat",
            output.value.to_sat(),
            utxo.value_sats
        )));
    }
    if output.script_pubkey.as_script() != expected_script {
        return Err(mismatch("output is not paid to the source address".to_string()));
    }
    Ok(output.clone())
}

/// Unsigned transaction spending `inputs` into one output.
pub fn build_unsigned(inputs: &[Utxo], destination: &Script, send_sats: u64) -> Result<Transaction, TransactionError> {
    let input = inputs
        .iter()
        .map(|utxo| {
            let txid = utxo.txid().map_err(|e| TransactionError::PrevTx {
                txid: utxo.txid.clone(),
                reason: e.to_string(),
            })?;
            Ok(TxIn {
                previous_output: OutPoint { txid, vout: utxo.vout },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
        })
        .collect::<Result<Vec<_>, TransactionError>>()?;

    Ok(Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input,
        output: vec![TxOut {
            value: Amount::from_sat(send_sats),
            script_pubkey: destination.to_owned(),
        }],
    })
}

/// Signing key for one sweep. The secret is erased when the guard drops,
/// including on early returns.
pub struct InputSigner {
    secret: SecretKey,
    public: PublicKey,
}

impl InputSigner {
    pub fn new(secp: &Secp256k1<All>, key: &PrivateKey) -> Result<Self, TransactionError> {
        let secret = key
            .with_secret(|bytes| SecretKey::from_slice(bytes))
            .map_err(|e| TransactionError::Key(e.to_string()))?;
        let public = PublicKey::from_secret_key(secp, &secret);
        Ok(Self { secret, public })
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Attach a P2WPKH witness to every input. `prevouts[i]` is what input `i` spends.
    pub fn sign_all(
        &self,
        secp: &Secp256k1<All>,
        tx: &mut Transaction,
        prevouts: &[TxOut],
    ) -> Result<(), TransactionError> {
        if prevouts.len() != tx.input.len() {
            return Err(TransactionError::Sighash(format!(
                "{} inputs but {} prevouts",
                tx.input.len(),
                prevouts.len()
            )));
        }

        let sighashes = {
            let mut cache = SighashCache::new(&*tx);
            prevouts
                .iter()
                .enumerate()
                .map(|(i, prevout)| {
                    cache
                        .p2wpkh_signature_hash(i, &prevout.script_pubkey, prevout.value, EcdsaSighashType::All)
                        .map_err(|e| TransactionError::Sighash(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        let public = self.public.serialize();
        for (input, sighash) in tx.input.iter_mut().zip(sighashes) {
            let message = Message::from_digest(sighash.to_byte_array());
            let signature = secp.sign_ecdsa(&message, &self.secret);

            let mut sig_bytes = signature.serialize_der().to_vec();
            sig_bytes.push(EcdsaSighashType::All.to_u32() as u8);
            input.witness = Witness::from_slice(&[sig_bytes, public.to_vec()]);
        }

        debug!(txid = %tx.txid(), inputs = tx.input.len(), "sweep transaction signed");
        Ok(())
    }
}

impl Drop for InputSigner {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

pub fn serialize(tx: &Transaction) -> String {
    serialize_hex(tx)
}
