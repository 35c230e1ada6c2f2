//! Token denomination constants and decimal amount conversion.
//!
//! All amounts inside the ledger are `u128` counts of the smallest
//! denomination. One whole token is `10^DECIMALS` base units.

use crate::error::{LedgerError, LedgerResult};

/// Number of decimal places of the token.
pub const DECIMALS: u32 = 18;

/// Base units per whole token.
pub const UNIT: u128 = 10u128.pow(DECIMALS);

/// Basis-point denominator (10000 = 100%).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Default genesis supply: 1,000,000 tokens.
pub const DEFAULT_INITIAL_SUPPLY: u128 = 1_000_000 * UNIT;

/// Default supply cap: 10^12 tokens.
///
/// Keeps `shares_per_token` in the hundreds of millions even at the cap, so
/// the share ratio retains plenty of precision.
pub const DEFAULT_MAX_SUPPLY: u128 = 1_000_000_000_000 * UNIT;

/// Convert a whole-token count to base units.
pub fn tokens(whole: u64) -> u128 {
    whole as u128 * UNIT
}

/// Parse a decimal token string (`"48.5"`, `"1000"`, `"0.000000000000000001"`)
/// into base units without going through floating point.
pub fn parse_token_amount(s: &str) -> LedgerResult<u128> {
    let s = s.trim().replace('_', "");
    let invalid = || LedgerError::InvalidConfiguration(format!("invalid token amount '{s}'"));

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > DECIMALS as usize {
        return Err(LedgerError::InvalidConfiguration(format!(
            "token amount '{s}' has more than {DECIMALS} decimal places"
        )));
    }

    let whole_units: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| LedgerError::Overflow)?
    };
    let frac_units: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = DECIMALS as usize);
        padded.parse().map_err(|_| invalid())?
    };

    whole_units
        .checked_mul(UNIT)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or(LedgerError::Overflow)
}

/// Format base units as a decimal token string with trailing zeros trimmed.
pub fn format_token_amount(units: u128) -> String {
    let whole = units / UNIT;
    let frac = units % UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0>width$}", width = DECIMALS as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}
