//! Seed manager: loads the master mnemonic once and owns the binary seed.
//!
//! The seed is PBKDF2-HMAC-SHA512 over the normalized mnemonic with 2048 rounds
//! (BIP39). It lives for the process lifetime, is never serialized or logged and
//! is wiped when dropped.

use bip39::{Language, Mnemonic};
use secrecy::{ExposeSecret, Secret};
use std::fmt;
use tracing::info;

use crate::core::errors::SeedError;

/// Environment variable holding the master mnemonic.
pub const MNEMONIC_ENV: &str = "CUSTODY_MNEMONIC";
/// Optional BIP39 passphrase.
pub const PASSPHRASE_ENV: &str = "CUSTODY_PASSPHRASE";

/// The 64-byte BIP39 seed.
pub struct MasterSeed(Secret<[u8; 64]>);

impl MasterSeed {
    /// Validate a mnemonic and stretch it into a seed.
    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self, SeedError> {
        let mnemonic = Mnemonic::parse_in(Language::English, phrase.trim())
            .map_err(|e| SeedError::Invalid(e.to_string()))?;

        let words = mnemonic.word_count();
        if words != 12 && words != 24 {
            return Err(SeedError::WordCount(words));
        }

        let seed = mnemonic.to_seed(passphrase);
        info!(words, "master seed loaded");
        Ok(Self(Secret::new(seed)))
    }

    /// Load from `CUSTODY_MNEMONIC` / `CUSTODY_PASSPHRASE`.
    pub fn from_env() -> Result<Self, SeedError> {
        let phrase = std::env::var(MNEMONIC_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(SeedError::Missing(MNEMONIC_ENV))?;
        let passphrase = std::env::var(PASSPHRASE_ENV).unwrap_or_default();
        Self::from_mnemonic(&phrase, &passphrase)
    }

    /// Raw seed bytes, e.g. for known-answer tests.
    pub fn from_bytes(seed: [u8; 64]) -> Self {
        Self(Secret::new(seed))
    }

    pub(crate) fn expose(&self) -> &[u8; 64] {
        self.0.expose_secret()
    }
}

impl fmt::Debug for MasterSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSeed([REDACTED])")
    }
}
