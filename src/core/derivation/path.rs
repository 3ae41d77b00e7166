//! Derivation path parsing and rendering.
//!
//! Path format: `m/44'/coin_type'/account'/change/address_index`.
//! Hardened segments accept `'`, `h` or `H` as marker.

use std::fmt;

use crate::core::domain::{Curve, Network};
use crate::core::errors::DerivationError;

const HARDENED_BIT: u32 = 0x8000_0000;

/// One path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildNumber {
    pub index: u32,
    pub hardened: bool,
}

impl ChildNumber {
    pub fn hardened(index: u32) -> Self {
        Self { index, hardened: true }
    }

    pub fn normal(index: u32) -> Self {
        Self { index, hardened: false }
    }

    /// Index as serialized into the HMAC input.
    pub fn to_u32(self) -> u32 {
        if self.hardened {
            self.index | HARDENED_BIT
        } else {
            self.index
        }
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// A fully determined derivation request for one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath {
    pub network: Network,
    /// User index this path was rendered for, if it came from a template.
    pub index: Option<u32>,
    pub curve: Curve,
    /// The path string, e.g. `m/44'/0'/0'/0/7`.
    pub template: String,
    children: Vec<ChildNumber>,
}

impl DerivationPath {
    /// Render a template (`{index}` placeholder) for `index` and validate it.
    pub fn from_template(network: Network, template: &str, index: u32) -> Result<Self, DerivationError> {
        if index >= HARDENED_BIT {
            return Err(DerivationError::invalid_path(
                template,
                format!("index {} exceeds 2^31 - 1", index),
            ));
        }
        let rendered = template.replace("{index}", &index.to_string());
        let mut path = Self::parse(network, &rendered)?;
        path.index = Some(index);
        Ok(path)
    }

    /// Parse an explicit path and check it is legal on the network's curve.
    pub fn parse(network: Network, path: &str) -> Result<Self, DerivationError> {
        let children = parse_segments(path)?;
        let curve = network.curve();

        if curve == Curve::Ed25519 {
            if let Some(bad) = children.iter().find(|c| !c.hardened) {
                return Err(DerivationError::invalid_path(
                    path,
                    format!(
                        "segment {} is not hardened; ed25519 only supports hardened derivation",
                        bad
                    ),
                ));
            }
        }

        Ok(Self {
            network,
            index: None,
            curve,
            template: path.to_string(),
            children,
        })
    }

    pub fn children(&self) -> &[ChildNumber] {
        &self.children
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for child in &self.children {
            write!(f, "/{}", child)?;
        }
        Ok(())
    }
}

fn parse_segments(path: &str) -> Result<Vec<ChildNumber>, DerivationError> {
    let trimmed = path.trim().trim_end_matches('/');
    let mut parts = trimmed.split('/');

    match parts.next() {
        Some("m") | Some("M") => {}
        _ => return Err(DerivationError::invalid_path(path, "path must start with 'm'")),
    }

    parts
        .map(|segment| {
            let (digits, hardened) = match segment
                .strip_suffix('\'')
                .or_else(|| segment.strip_suffix('h'))
                .or_else(|| segment.strip_suffix('H'))
            {
                Some(d) => (d, true),
                None => (segment, false),
            };

            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(DerivationError::invalid_path(
                    path,
                    format!("malformed segment '{}'", segment),
                ));
            }

            let index: u32 = digits.parse().map_err(|_| {
                DerivationError::invalid_path(path, format!("segment '{}' out of range", segment))
            })?;
            if index >= HARDENED_BIT {
                return Err(DerivationError::invalid_path(
                    path,
                    format!("segment '{}' exceeds 2^31 - 1", segment),
                ));
            }

            Ok(ChildNumber { index, hardened })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bip44_path() {
        let path = DerivationPath::parse(Network::Eth, "m/44'/60'/0'/0/5").unwrap();
        let raw: Vec<u32> = path.children().iter().map(|c| c.to_u32()).collect();
        assert_eq!(raw, vec![0x8000002C, 0x8000003C, 0x80000000, 0, 5]);
        assert_eq!(path.to_string(), "m/44'/60'/0'/0/5");
    }

    #[test]
    fn test_alternate_hardened_markers() {
        let path = DerivationPath::parse(Network::Sol, "m/44h/501H/0'/0'").unwrap();
        assert!(path.children().iter().all(|c| c.hardened));
    }

    #[test]
    fn test_template_renders_index() {
        let path = DerivationPath::from_template(Network::Sol, "m/44'/501'/{index}'/0'", 9).unwrap();
        assert_eq!(path.to_string(), "m/44'/501'/9'/0'");
        assert_eq!(path.index, Some(9));
        assert_eq!(path.curve, Curve::Ed25519);
    }

    #[test]
    fn test_ed25519_rejects_normal_segment() {
        let err = DerivationPath::parse(Network::Sol, "m/44'/501'/0'/0").unwrap_err();
        assert!(matches!(err, DerivationError::InvalidPath { .. }));
    }

    #[test]
    fn test_malformed_paths() {
        for bad in ["44'/0'", "m/x", "m/44''", "m//1", "m/-1", "m/2147483648"] {
            assert!(
                DerivationPath::parse(Network::Btc, bad).is_err(),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_index_out_of_range() {
        assert!(DerivationPath::from_template(Network::Btc, "m/44'/0'/0'/0/{index}", 0x8000_0000).is_err());
    }
}
