//! Common types used across the application

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shared::errors::AppError;

/// Decimals of the native asset (and of its wrapped form)
pub const NATIVE_DECIMALS: u8 = 9;

/// Amount representation with precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub value: u64,
    pub decimals: u8,
}

impl Amount {
    pub fn new(value: u64, decimals: u8) -> Self {
        Self { value, decimals }
    }

    pub fn from_base_units(value: u64) -> Self {
        Self { value, decimals: NATIVE_DECIMALS }
    }

    /// Parse a decimal string such as `"2.576"` without going through floats.
    pub fn parse(input: &str, decimals: u8) -> Result<Self, AppError> {
        let input = input.trim();
        let invalid = || AppError::InvalidAmount(input.to_string());

        let (whole, fraction) = match input.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (input, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if fraction.len() > decimals as usize {
            return Err(invalid());
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let scale = 10u64.checked_pow(decimals as u32).ok_or_else(invalid)?;
        let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
        let padded = format!("{:0<width$}", fraction, width = decimals as usize);
        let fraction: u64 = if padded.is_empty() {
            0
        } else {
            padded.parse().map_err(|_| invalid())?
        };

        let value = whole
            .checked_mul(scale)
            .and_then(|v| v.checked_add(fraction))
            .ok_or_else(invalid)?;
        Ok(Self { value, decimals })
    }

    pub fn to_base_units(&self) -> u64 {
        self.value
    }
}

impl FromStr for Amount {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, NATIVE_DECIMALS)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = 10u64.pow(self.decimals as u32);
        let whole = self.value / scale;
        let fraction = self.value % scale;
        if fraction == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0width$}", fraction, width = self.decimals as usize);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

/// Format a signed base-unit delta for reports
pub fn format_delta(delta: i128, decimals: u8) -> String {
    let sign = if delta < 0 { "-" } else { "+" };
    let magnitude = Amount::new(delta.unsigned_abs() as u64, decimals);
    format!("{}{}", sign, magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_amounts() {
        assert_eq!(Amount::parse("2.576", 9).unwrap().value, 2_576_000_000);
        assert_eq!(Amount::parse("3", 9).unwrap().value, 3_000_000_000);
        assert_eq!(Amount::parse(".5", 9).unwrap().value, 500_000_000);
        assert_eq!(Amount::parse("0.000000001", 9).unwrap().value, 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Amount::parse("", 9).is_err());
        assert!(Amount::parse("1.0000000001", 9).is_err());
        assert!(Amount::parse("-1", 9).is_err());
        assert!(Amount::parse("1e9", 9).is_err());
    }

    #[test]
    fn test_display_trims_trailing_zeros() {
        assert_eq!(Amount::from_base_units(2_576_000_000).to_string(), "2.576");
        assert_eq!(Amount::from_base_units(3_000_000_000).to_string(), "3");
        assert_eq!(format_delta(-2_576_000_000, 9), "-2.576");
        assert_eq!(format_delta(1, 9), "+0.000000001");
    }
}
