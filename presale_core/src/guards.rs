// Client-side advisory guards. None of these bind the sale contract; they
// only decide whether the front-end offers the action.

use ethers::types::{U256, U512};
use serde::Serialize;

/// `floor(value * num / den)` without intermediate overflow, saturating at
/// `U256::MAX`. `den == 0` yields zero.
pub fn mul_div(value: U256, num: u64, den: u64) -> U256 {
    if den == 0 {
        return U256::zero();
    }
    let wide: U512 = value.full_mul(U256::from(num)) / U512::from(den);
    U256::try_from(wide).unwrap_or(U256::MAX)
}

/// Maximum spend allowed from a balance, and whether the request exceeds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendCap {
    pub cap: U256,
    pub over_cap: bool,
}

/// `cap = floor(balance * pct / 100)`; `over_cap` only for a positive request above the cap.
pub fn spend_cap(balance: U256, pct: u64, requested: U256) -> SpendCap {
    let cap = mul_div(balance, pct, 100);
    SpendCap {
        cap,
        over_cap: !requested.is_zero() && requested > cap,
    }
}

/// Unknown gas cost never blocks: only a known padded cost above the
/// native balance counts as insufficient.
pub fn has_enough_for_gas(native_balance: U256, padded_cost: Option<U256>) -> bool {
    match padded_cost {
        Some(cost) => native_balance >= cost,
        None => true,
    }
}

/// True when a positive quoted net output is above a known available supply.
pub fn exceeds_supply(net: U256, available: Option<U256>) -> bool {
    match available {
        Some(supply) => !net.is_zero() && net > supply,
        None => false,
    }
}

/// Largest input amount whose quote still fits in the available supply:
/// `available * one_unit / per_unit_quote`. Unknown without both inputs.
pub fn max_spend_by_supply(available: Option<U256>, per_unit_quote: Option<U256>, one_unit: U256) -> Option<U256> {
    let supply = available?;
    let rate = per_unit_quote.filter(|r| !r.is_zero())?;
    let wide = supply.full_mul(one_unit) / U512::from(rate);
    Some(U256::try_from(wide).unwrap_or(U256::MAX))
}

/// Reasons the action is offered disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GuardViolation {
    OverSpendCap { cap: U256 },
    InsufficientBalance { balance: U256 },
    InsufficientGas { required: U256 },
    ExceedsSupply { available: U256 },
}

impl std::fmt::Display for GuardViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardViolation::OverSpendCap { cap } => write!(f, "amount exceeds the spend cap ({} wei)", cap),
            GuardViolation::InsufficientBalance { balance } => write!(f, "insufficient balance ({} available)", balance),
            GuardViolation::InsufficientGas { required } => write!(f, "not enough native balance for gas ({} wei needed)", required),
            GuardViolation::ExceedsSupply { available } => write!(f, "quote exceeds remaining supply ({} available)", available),
        }
    }
}
