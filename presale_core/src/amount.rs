// Decimal string <-> fixed-point conversion for user-entered amounts

use ethers::types::U256;
use ethers::utils::format_units;
use log::debug;

/// Scale used by the native coin and by tokens whose `decimals()` can't be read.
pub const DEFAULT_DECIMALS: u32 = 18;

/// Largest number of decimal digits that always fits in a U256.
const MAX_U256_DIGITS: usize = 77;

/// Parse a user-entered decimal string at the given scale.
///
/// Returns `None` for anything that is not a plain non-negative decimal
/// number ("abc", "-1", "1e18", "1.2.3", ...). An empty field is zero.
/// Fraction digits beyond `decimals` round half-up into the last kept digit.
pub fn parse_amount(input: &str, decimals: u32) -> Option<U256> {
    let trimmed = input.trim();
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };

    if !trimmed.chars().all(|c| c.is_ascii_digit() || c == '.') || !trimmed.chars().any(|c| c.is_ascii_digit()) {
        debug!("Rejecting non-decimal amount input {:?}", input);
        return None;
    }
    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((_, frac)) if frac.contains('.') => {
            debug!("Rejecting amount input with several decimal points {:?}", input);
            return None;
        }
        Some((int, frac)) => (int, frac),
        None => (trimmed, ""),
    };
    let scale = decimals as usize;
    if int_part.len() + scale > MAX_U256_DIGITS {
        debug!("Rejecting amount input {:?}: does not fit at scale {}", input, decimals);
        return None;
    }

    let kept = &frac_part[..frac_part.len().min(scale)];
    let round_up = frac_part.as_bytes().get(scale).is_some_and(|d| *d >= b'5');
    let digits = format!("{}{}{}", int_part, kept, "0".repeat(scale - kept.len()));
    let units = match U256::from_dec_str(&digits) {
        Ok(units) => units,
        Err(e) => {
            debug!("Failed to parse amount {:?}: {}", input, e);
            return None;
        }
    };
    if round_up {
        units.checked_add(U256::one())
    } else {
        Some(units)
    }
}

/// Same as [`parse_amount`] with malformed input normalised to zero, so
/// every "amount > 0" gate downstream simply no-ops.
pub fn parse_amount_or_zero(input: &str, decimals: u32) -> U256 {
    match parse_amount(input, decimals) {
        Some(amount) => amount,
        None => U256::zero(),
    }
}

/// Render a fixed-point amount as a plain decimal string without trailing
/// zeros ("1.5", "100", "0.000001").
pub fn format_amount(amount: U256, decimals: u32) -> String {
    let full = match format_units(amount, decimals) {
        Ok(s) => s,
        Err(_) => return amount.to_string(),
    };
    if !full.contains('.') {
        return full;
    }
    let trimmed = full.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
}

/// Render with thousands separators and exactly `dp` fraction digits,
/// truncating rather than rounding.
pub fn format_fixed(amount: U256, decimals: u32, dp: usize) -> String {
    let plain = format_amount(amount, decimals);
    let (int_part, frac_part) = match plain.split_once('.') {
        Some((i, f)) => (i, f),
        None => (plain.as_str(), ""),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if dp == 0 {
        return grouped;
    }
    let mut frac: String = frac_part.chars().take(dp).collect();
    while frac.len() < dp {
        frac.push('0');
    }
    format!("{}.{}", grouped, frac)
}
