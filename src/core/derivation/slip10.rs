//! SLIP-0010 key derivation on ed25519.
//!
//! ed25519 has no public-key child derivation, so every step is hardened:
//! `I = HMAC-SHA512(chain_code, 0x00 || k_par || ser32(i | 2^31))`, the child key is
//! `IL` as-is. A normal step is rejected rather than silently hardened.

use ed25519_dalek::SigningKey;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

use super::path::ChildNumber;
use crate::core::errors::DerivationError;

type HmacSha512 = Hmac<Sha512>;

pub struct Slip10Ed25519 {
    chain_code: Zeroizing<[u8; 32]>,
    key: Zeroizing<[u8; 32]>,
}

impl Slip10Ed25519 {
    pub fn from_seed(seed: &[u8]) -> Result<Self, DerivationError> {
        if seed.len() < 16 || seed.len() > 64 {
            return Err(DerivationError::KeyDerivation(format!(
                "seed length must be 16..=64 bytes, got {}",
                seed.len()
            )));
        }
        Self::split(b"ed25519 seed", &[seed])
    }

    pub fn derive_child(&self, child: ChildNumber) -> Result<Self, DerivationError> {
        if !child.hardened {
            return Err(DerivationError::invalid_path(
                child.to_string(),
                "ed25519 only supports hardened derivation",
            ));
        }
        let index = child.to_u32().to_be_bytes();
        Self::split(&self.chain_code[..], &[&[0u8][..], &self.key[..], &index[..]])
    }

    pub fn derive_path(&self, children: &[ChildNumber]) -> Result<Self, DerivationError> {
        let mut current = Self {
            chain_code: self.chain_code.clone(),
            key: self.key.clone(),
        };
        for child in children {
            current = current.derive_child(*child)?;
        }
        Ok(current)
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        self.key.clone()
    }

    /// Raw 32-byte ed25519 public key.
    pub fn public_key(&self) -> [u8; 32] {
        // SigningKey zeroizes itself on drop.
        SigningKey::from_bytes(&self.key).verifying_key().to_bytes()
    }

    fn split(hmac_key: &[u8], parts: &[&[u8]]) -> Result<Self, DerivationError> {
        let mut mac = HmacSha512::new_from_slice(hmac_key).map_err(|e| {
            DerivationError::KeyDerivation(format!("HMAC initialization failed: {}", e))
        })?;
        for part in parts {
            mac.update(part);
        }
        let mut i = Zeroizing::new([0u8; 64]);
        i.copy_from_slice(&mac.finalize().into_bytes());

        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&i[..32]);
        let mut chain_code = Zeroizing::new([0u8; 32]);
        chain_code.copy_from_slice(&i[32..]);
        Ok(Self { chain_code, key })
    }

    #[cfg(test)]
    fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }
}
