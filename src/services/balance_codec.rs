// Exact conversions between base-unit integers and human-readable decimals.

use num_bigint::BigUint;
use num_traits::Zero;
use std::cmp::Ordering;

use crate::error::{PortfolioError, Result};

/// Result of the lenient formatting path used by provider normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedAmount {
    pub raw: BigUint,
    pub balance: String,
}

impl FormattedAmount {
    pub fn zero() -> Self {
        Self {
            raw: BigUint::zero(),
            balance: "0".to_string(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }
}

// Internal helper that builds 10^decimals.
fn pow10(decimals: u32) -> BigUint {
    BigUint::from(10u32).pow(decimals)
}

/// Divides `raw` by 10^decimals without leaving integer arithmetic.
///
/// Returns `"<int>"` when the remainder is zero, `"<int>.<frac>"` otherwise,
/// with trailing fractional zeros removed.
pub fn to_decimal(raw: &BigUint, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let scale = pow10(u32::from(decimals));
    let whole = raw / &scale;
    let frac = raw % &scale;
    if frac.is_zero() {
        return whole.to_string();
    }
    let mut frac_text = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    while frac_text.ends_with('0') {
        frac_text.pop();
    }
    format!("{}.{}", whole, frac_text)
}

/// Inverse of [`to_decimal`]: `to_base_units(to_decimal(r, d), d) == r`.
#[cfg(test)]
pub fn to_base_units(value: &str, decimals: u8) -> Result<BigUint> {
    let trimmed = value.trim();
    let (whole, frac) = match trimmed.split_once('.') {
        Some((whole, frac)) if !frac.is_empty() => (whole, frac),
        Some(_) => return Err(PortfolioError::MalformedAmount(value.to_string())),
        None => (trimmed, ""),
    };
    if !is_decimal_digits(whole) || (!frac.is_empty() && !is_decimal_digits(frac)) {
        return Err(PortfolioError::MalformedAmount(value.to_string()));
    }
    if frac.len() > decimals as usize {
        return Err(PortfolioError::MalformedAmount(format!(
            "{} has more than {} fractional digits",
            value, decimals
        )));
    }
    let digits = format!("{}{:0<width$}", whole, frac, width = decimals as usize);
    parse_radix(&digits, 10).ok_or_else(|| PortfolioError::MalformedAmount(value.to_string()))
}

/// Parses a base-unit integer given either as decimal digits or `0x` hex.
pub fn parse_raw_amount(raw: &str) -> Result<BigUint> {
    let trimmed = raw.trim();
    let parsed = if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            None
        } else {
            parse_radix(hex, 16)
        }
    } else if is_decimal_digits(trimmed) {
        parse_radix(trimmed, 10)
    } else {
        None
    };
    parsed.ok_or_else(|| PortfolioError::MalformedAmount(raw.to_string()))
}

/// Lenient formatting: a malformed raw value is logged and treated as zero.
pub fn format_raw_amount(raw: &str, decimals: u8) -> FormattedAmount {
    match parse_raw_amount(raw) {
        Ok(value) => FormattedAmount {
            balance: to_decimal(&value, decimals),
            raw: value,
        },
        Err(err) => {
            tracing::warn!("Treating balance as zero: {}", err);
            FormattedAmount::zero()
        }
    }
}

/// Exact comparison of two amounts expressed with different decimals.
pub fn compare_amounts(a: &BigUint, a_decimals: u8, b: &BigUint, b_decimals: u8) -> Ordering {
    match a_decimals.cmp(&b_decimals) {
        Ordering::Equal => a.cmp(b),
        Ordering::Less => {
            let scaled = a * pow10(u32::from(b_decimals - a_decimals));
            scaled.cmp(b)
        }
        Ordering::Greater => {
            let scaled = b * pow10(u32::from(a_decimals - b_decimals));
            a.cmp(&scaled)
        }
    }
}

/// True for hex words that encode zero, e.g. the 32-byte all-zero balance.
pub fn is_zero_hex_word(value: &str) -> bool {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    !digits.is_empty() && digits.chars().all(|ch| ch == '0')
}

// Internal helper that checks for a non-empty run of ASCII digits.
fn is_decimal_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit())
}

// Internal helper that parses pre-validated digits.
fn parse_radix(digits: &str, radix: u32) -> Option<BigUint> {
    BigUint::parse_bytes(digits.as_bytes(), radix)
}
