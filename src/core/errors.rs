//! Error types for the custody core.
//!
//! The taxonomy follows how callers react:
//! - [`SeedError`]: fatal at startup, the process must not serve derivations.
//! - [`DerivationError`]: validation, rejected immediately and never retried.
//! - [`ChainError`]: transient network/indexer trouble, safe to retry on the next poll,
//!   except [`ChainError::Rejected`] which is a terminal relay verdict.
//! - [`ConfigError`]: configuration could not be loaded or is inconsistent.

use thiserror::Error;

/// Master mnemonic problems. Any of these is fatal at startup.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("mnemonic is not configured (set {0})")]
    Missing(&'static str),

    #[error("invalid mnemonic: {0}")]
    Invalid(String),

    #[error("unsupported mnemonic length: {0} words (expected 12 or 24)")]
    WordCount(usize),
}

/// Key derivation and address validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DerivationError {
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("invalid derivation path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid {network} address '{address}': {reason}")]
    InvalidAddress {
        network: String,
        address: String,
        reason: String,
    },

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}

impl DerivationError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_address(
        network: impl ToString,
        address: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidAddress {
            network: network.to_string(),
            address: address.into(),
            reason: reason.into(),
        }
    }
}

/// Failures talking to indexers, RPC endpoints and relays.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("relay rejected transaction: {0}")]
    Rejected(String),

    #[error("not configured: {0}")]
    Unconfigured(String),

    #[error(transparent)]
    Derivation(#[from] DerivationError),
}

impl ChainError {
    /// Whether a later attempt may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChainError::Network(_) | ChainError::Timeout => true,
            ChainError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChainError::Timeout
        } else if err.is_decode() {
            ChainError::Parse(err.to_string())
        } else {
            ChainError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Parse(err.to_string())
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
