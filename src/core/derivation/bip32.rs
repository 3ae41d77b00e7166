//! BIP32 key derivation on secp256k1.
//!
//! Master: `HMAC-SHA512("Bitcoin seed", seed)`; left half is the key, right half
//! the chain code. Child: `HMAC-SHA512(chain_code, data || index)` where data is
//! `0x00 || k_par` for hardened steps and `serP(K_par)` for normal ones, and the
//! child key is `IL + k_par (mod n)`.

use bitcoin::secp256k1::{All, PublicKey, Scalar, Secp256k1, SecretKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

use super::path::ChildNumber;
use crate::core::errors::DerivationError;

type HmacSha512 = Hmac<Sha512>;

/// Extended private key. The secret is erased on drop.
pub struct Bip32 {
    chain_code: Zeroizing<[u8; 32]>,
    key: SecretKey,
}

impl Bip32 {
    /// Create master key from BIP39 seed
    pub fn from_seed(seed: &[u8]) -> Result<Self, DerivationError> {
        if seed.len() < 16 || seed.len() > 64 {
            return Err(DerivationError::KeyDerivation(format!(
                "seed length must be 16..=64 bytes, got {}",
                seed.len()
            )));
        }

        let i = hmac_sha512(b"Bitcoin seed", &[seed])?;
        let key = SecretKey::from_slice(&i[..32])
            .map_err(|e| DerivationError::KeyDerivation(format!("invalid master key: {}", e)))?;
        let mut chain_code = Zeroizing::new([0u8; 32]);
        chain_code.copy_from_slice(&i[32..]);

        Ok(Self { chain_code, key })
    }

    pub fn derive_child(&self, secp: &Secp256k1<All>, child: ChildNumber) -> Result<Self, DerivationError> {
        let index = child.to_u32().to_be_bytes();

        let i = if child.hardened {
            let secret = Zeroizing::new(self.key.secret_bytes());
            hmac_sha512(&self.chain_code[..], &[&[0u8][..], &secret[..], &index[..]])?
        } else {
            let public = PublicKey::from_secret_key(secp, &self.key).serialize();
            hmac_sha512(&self.chain_code[..], &[&public[..], &index[..]])?
        };

        let mut il = Zeroizing::new([0u8; 32]);
        il.copy_from_slice(&i[..32]);
        // IL >= n or a zero child key makes this index invalid (probability ~2^-127).
        let tweak = Scalar::from_be_bytes(*il).map_err(|_| {
            DerivationError::KeyDerivation(format!("child {} produced IL >= n", child))
        })?;
        let key = self.key.add_tweak(&tweak).map_err(|e| {
            DerivationError::KeyDerivation(format!("child {} is invalid: {}", child, e))
        })?;

        let mut chain_code = Zeroizing::new([0u8; 32]);
        chain_code.copy_from_slice(&i[32..]);

        Ok(Self { chain_code, key })
    }

    /// Derive along a full path.
    pub fn derive_path(&self, secp: &Secp256k1<All>, children: &[ChildNumber]) -> Result<Self, DerivationError> {
        let mut current = Self {
            chain_code: self.chain_code.clone(),
            key: self.key,
        };
        for child in children {
            current = current.derive_child(secp, *child)?;
        }
        Ok(current)
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.key.secret_bytes())
    }

    pub fn public_key(&self, secp: &Secp256k1<All>) -> PublicKey {
        PublicKey::from_secret_key(secp, &self.key)
    }

    #[cfg(test)]
    fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }
}

impl Drop for Bip32 {
    fn drop(&mut self) {
        self.key.non_secure_erase();
    }
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<Zeroizing<[u8; 64]>, DerivationError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| DerivationError::KeyDerivation(format!("HMAC initialization failed: {}", e)))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector1_seed() -> Vec<u8> {
        hex::decode("000102030405060708090a0b0c0d0e0f").unwrap()
    }

    #[test]
    fn test_bip32_vector1_master() {
        let master = Bip32::from_seed(&vector1_seed()).unwrap();
        assert_eq!(
            hex::encode(&master.secret_bytes()[..]),
            "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35"
        );
        assert_eq!(
            hex::encode(master.chain_code()),
            "873dff81c02f525623fd1fe5167eac3a55a049de3d314bb42ee227ffed37d508"
        );
    }

    #[test]
    fn test_bip32_vector1_hardened_then_normal() {
        let secp = Secp256k1::new();
        let master = Bip32::from_seed(&vector1_seed()).unwrap();

        let m_0h = master.derive_path(&secp, &[ChildNumber::hardened(0)]).unwrap();
        assert_eq!(
            hex::encode(&m_0h.secret_bytes()[..]),
            "edb2e14f9ee77d26dd93b4ecede8d16ed408ce149b6cd80b0715a2d911a0afea"
        );

        let m_0h_1 = master
            .derive_path(&secp, &[ChildNumber::hardened(0), ChildNumber::normal(1)])
            .unwrap();
        assert_eq!(
            hex::encode(&m_0h_1.secret_bytes()[..]),
            "3c6cb8d0f6a264c91ea8b5030fadaa8e538b020f0a387421a12de9319dc93368"
        );
    }

    #[test]
    fn test_hardened_and_normal_children_differ() {
        let secp = Secp256k1::new();
        let master = Bip32::from_seed(&[1u8; 64]).unwrap();
        let hardened = master.derive_child(&secp, ChildNumber::hardened(0)).unwrap();
        let normal = master.derive_child(&secp, ChildNumber::normal(0)).unwrap();
        assert_ne!(hardened.secret_bytes()[..], normal.secret_bytes()[..]);
    }

    #[test]
    fn test_short_seed_rejected() {
        assert!(Bip32::from_seed(&[0u8; 8]).is_err());
    }
}
