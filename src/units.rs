//! Decimal-string amounts scaled to integer base units.
//!
//! User amounts stay strings until they hit a contract or a comparison, so the
//! precision the user typed is never rounded through a float.

use alloy_primitives::utils::{self, ParseUnits};
use alloy_primitives::U256;

/// Parses a plain decimal string (`"10"`, `"0.5"`, `".25"`) into base units.
/// Digits beyond `decimals` are truncated. Returns `None` for negatives,
/// malformed input, or values that overflow `U256`.
pub fn parse_units(raw: &str, decimals: u8) -> Option<U256> {
    let trimmed = raw.trim();
    let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    let whole = if whole.is_empty() { "0" } else { whole };
    let frac: String = frac.chars().take(decimals as usize).collect();
    let normalized = if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{frac}")
    };
    match utils::parse_units(&normalized, decimals) {
        Ok(ParseUnits::U256(value)) => Some(value),
        _ => None,
    }
}

/// Formats base units back to a decimal string without trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let formatted = utils::format_units(value, decimals).unwrap_or_else(|_| value.to_string());
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

/// Splits `amount` evenly across `parts`, rounded half-up to `precision`
/// fractional digits.
pub fn split_evenly(amount: &str, parts: usize, precision: u8) -> Option<String> {
    if parts == 0 || precision > 18 {
        return None;
    }
    let total = parse_units(amount, 18)?;
    let per_part = total / U256::from(parts);
    let step = U256::from(10u64).pow(U256::from(18 - precision));
    let rounded = (per_part + step / U256::from(2u64)) / step;
    Some(format_units(rounded, precision))
}

pub fn is_positive(amount: &str) -> bool {
    parse_units(amount, 18).is_some_and(|value| !value.is_zero())
}
