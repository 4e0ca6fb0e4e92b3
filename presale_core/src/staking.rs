// Staking yield estimates - APR to APY by compounding frequency.
// Illustrative figures only, nothing here touches the chain.

use crate::error::CoreError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Principal used for the one-year projection.
pub const PROJECTION_PRINCIPAL: f64 = 1_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compounding {
    /// Simple interest, APY equals APR
    None,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Compounding {
    pub const ALL: [Compounding; 6] = [
        Compounding::None,
        Compounding::Daily,
        Compounding::Weekly,
        Compounding::Monthly,
        Compounding::Quarterly,
        Compounding::Yearly,
    ];

    /// Compounding periods per year
    pub fn periods(self) -> u32 {
        match self {
            Compounding::None | Compounding::Yearly => 1,
            Compounding::Daily => 365,
            Compounding::Weekly => 52,
            Compounding::Monthly => 12,
            Compounding::Quarterly => 4,
        }
    }
}

impl fmt::Display for Compounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Compounding::None => "none",
            Compounding::Daily => "daily",
            Compounding::Weekly => "weekly",
            Compounding::Monthly => "monthly",
            Compounding::Quarterly => "quarterly",
            Compounding::Yearly => "yearly",
        };
        f.write_str(name)
    }
}

impl FromStr for Compounding {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Compounding::ALL
            .into_iter()
            .find(|c| c.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::InvalidInput(format!("Unknown compounding frequency: {}", s)))
    }
}

/// Yield figures for one APR and compounding choice. Rates are percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YieldEstimate {
    pub apr_pct: f64,
    pub compounding: Compounding,
    pub periods: u32,
    pub apy_pct: f64,
    /// Balance after one year starting from `PROJECTION_PRINCIPAL` tokens
    pub projected_balance: f64,
}

/// Read an APR as typed by a user. Characters other than digits and '.' are
/// dropped; anything that is still not a number counts as zero.
pub fn parse_apr(raw: &str) -> f64 {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    if cleaned.is_empty() {
        return 0.0;
    }
    cleaned.parse::<f64>().map(clamp_apr).unwrap_or(0.0)
}

fn clamp_apr(apr_pct: f64) -> f64 {
    if apr_pct.is_finite() {
        apr_pct.max(0.0)
    } else {
        0.0
    }
}

/// Effective annual rate: `(1 + r/n)^n - 1`, or the APR itself without compounding.
pub fn apy_pct(apr_pct: f64, compounding: Compounding) -> f64 {
    let apr_pct = clamp_apr(apr_pct);
    if compounding == Compounding::None {
        return apr_pct;
    }
    let n = f64::from(compounding.periods());
    let r = apr_pct / 100.0;
    ((1.0 + r / n).powf(n) - 1.0) * 100.0
}

pub fn estimate(apr_pct: f64, compounding: Compounding) -> YieldEstimate {
    let apr_pct = clamp_apr(apr_pct);
    let apy = apy_pct(apr_pct, compounding);
    YieldEstimate {
        apr_pct,
        compounding,
        periods: compounding.periods(),
        apy_pct: apy,
        projected_balance: PROJECTION_PRINCIPAL * (1.0 + apy / 100.0),
    }
}
