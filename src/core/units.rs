//! Base-unit to display-unit conversion.

use primitive_types::U256;
use rust_decimal::Decimal;

use crate::core::errors::ChainError;

/// Rust Decimal's maximum scale.
const MAX_SCALE: u32 = 28;
/// Largest 96-bit Decimal mantissa.
const MAX_MANTISSA: u128 = (1 << 96) - 1;

/// `raw / 10^decimals` without floating point.
///
/// Amounts whose mantissa does not fit a Decimal lose their lowest digits
/// (truncated toward zero) until it does. Only a whole part above the Decimal
/// range is an error.
pub fn from_base_units(raw: impl Into<U256>, decimals: u32) -> Result<Decimal, ChainError> {
    let max = U256::from(MAX_MANTISSA);
    let ten = U256::from(10u64);
    let mut mantissa = raw.into();
    let mut scale = decimals;
    while scale > 0 && (scale > MAX_SCALE || mantissa > max) {
        mantissa = mantissa / ten;
        scale -= 1;
    }
    if mantissa > max {
        return Err(ChainError::Parse(format!(
            "amount {} with {} decimals exceeds representable range",
            mantissa, decimals
        )));
    }
    // Fits in 96 bits here, so two limbs are enough.
    let value = u128::from((mantissa >> 64usize).low_u64()) << 64 | u128::from(mantissa.low_u64());
    let mantissa = i128::try_from(value)
        .map_err(|_| ChainError::Parse(format!("amount {} out of range", mantissa)))?;
    Decimal::try_from_i128_with_scale(mantissa, scale)
        .map(|d| d.normalize())
        .map_err(|e| ChainError::Parse(format!("amount {} out of range: {}", mantissa, e)))
}

/// Parse a `0x`-prefixed hex quantity (JSON-RPC style, up to one 32-byte word).
pub fn parse_hex_quantity(value: &str) -> Result<U256, ChainError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Parse(format!("expected hex quantity, got '{}'", value)))?;
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        return Ok(U256::zero());
    }
    if trimmed.len() > 64 {
        return Err(ChainError::Parse(format!("quantity '{}' overflows 256 bits", value)));
    }
    U256::from_str_radix(trimmed, 16)
        .map_err(|e| ChainError::Parse(format!("bad hex quantity '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use test_case::test_case;

    #[test_case(100_000_000, 8, "1" ; "one bitcoin")]
    #[test_case(1_000_000_000_000_000_000, 18, "1" ; "one ether")]
    #[test_case(1_000_000_000, 9, "1" ; "one sol")]
    #[test_case(2_500_000, 6, "2.5" ; "tron sun")]
    #[test_case(1, 8, "0.00000001" ; "one satoshi")]
    #[test_case(0, 18, "0" ; "zero")]
    #[test_case(1_000_000_000_000_000_000_000_000_000_000, 18, "1000000000000" ; "trillion tokens at 18 decimals")]
    #[test_case(123_456_789_012_345_678_901_234_567_890_123, 18, "123456789012345.67890123456789" ; "low digits truncated")]
    fn test_base_unit_conversion(raw: u128, decimals: u32, expected: &str) {
        assert_eq!(
            from_base_units(raw, decimals).unwrap(),
            Decimal::from_str(expected).unwrap()
        );
    }

    #[test]
    fn test_word_above_128_bits() {
        // 10^40 base units at 18 decimals.
        let raw = parse_hex_quantity("0x1d6329f1c35ca4bfabb9f5610000000000").unwrap();
        assert_eq!(
            from_base_units(raw, 18).unwrap(),
            Decimal::from_str("10000000000000000000000").unwrap()
        );
    }

    #[test]
    fn test_whole_part_out_of_range() {
        assert!(from_base_units(U256::MAX, 18).is_err());
    }

    #[test]
    fn test_excessive_decimals_truncated() {
        assert_eq!(
            from_base_units(1_000_000_000_000u64, 40).unwrap(),
            Decimal::from_str("0.0000000000000000000000000001").unwrap()
        );
        assert_eq!(from_base_units(1u64, 40).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x0").unwrap(), U256::zero());
        assert_eq!(
            parse_hex_quantity("0xde0b6b3a7640000").unwrap(),
            U256::from(1_000_000_000_000_000_000u64)
        );
        let word = format!("0x{:0>64}", "f4240");
        assert_eq!(parse_hex_quantity(&word).unwrap(), U256::from(1_000_000u64));
        assert_eq!(parse_hex_quantity(&format!("0x{}", "f".repeat(64))).unwrap(), U256::MAX);
        assert!(parse_hex_quantity("12").is_err());
        assert!(parse_hex_quantity(&format!("0x1{}", "0".repeat(64))).is_err());
    }
}
