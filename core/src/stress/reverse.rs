//! Reverse stress test: which shock breaks the company?
//!
//! Over a short horizon H (6 periods by default) with headroom
//! `C0 + H·R − H·K`, each single-variable shock that alone brings cash
//! to zero is solved in closed form:
//!
//!   revenue drop   x = headroom / (H·R)
//!   cost increase  y = headroom / (H·K)
//!   delay days     d = 30 · headroom / R   (only if d ≤ 30·H)
//!
//! The combined shock applies a fixed fraction of each solved magnitude
//! together and reports the cash it leaves. The fraction is a tunable
//! heuristic; it does not guarantee the combined shock is minimal.

use super::model::{CashModel, Shock};
use super::sensitivity::StressVariable;
use crate::types::DAYS_PER_PERIOD;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Plausibility {
    Plausible,
    Severe,
    Extreme,
    /// No single shock of this kind can reach zero within the horizon.
    Unreachable,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BreakingShock {
    pub variable: StressVariable,
    /// Fraction for revenue/cost, days for delay. None when unreachable.
    pub magnitude: Option<f64>,
    pub plausibility: Plausibility,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CombinedShock {
    pub fraction: f64,
    pub shock: Shock,
    pub resulting_cash: f64,
    pub breaks: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReverseStressResult {
    pub horizon: usize,
    pub headroom: f64,
    pub already_breached: bool,
    pub single_shocks: Vec<BreakingShock>,
    pub combined: CombinedShock,
}

fn classify(variable: StressVariable, magnitude: Option<f64>) -> Plausibility {
    let Some(m) = magnitude else {
        return Plausibility::Unreachable;
    };
    let (plausible, severe) = match variable {
        StressVariable::Revenue | StressVariable::Cost => (0.30, 0.60),
        StressVariable::CollectionDelay => (60.0, 120.0),
    };
    if m <= plausible {
        Plausibility::Plausible
    } else if m <= severe {
        Plausibility::Severe
    } else {
        Plausibility::Extreme
    }
}

pub fn solve(baseline: &CashModel, horizon: usize, combined_fraction: f64) -> ReverseStressResult {
    let h = horizon as f64;
    let r = baseline.monthly_inflow;
    let k = baseline.monthly_outflow;
    let headroom = baseline.deterministic_final(horizon);
    let already_breached = headroom <= 0.0;

    let solve_one = |variable: StressVariable| -> Option<f64> {
        if already_breached {
            return Some(0.0);
        }
        match variable {
            StressVariable::Revenue if r > 0.0 => {
                let x = headroom / (h * r);
                // A drop above 100% is not a revenue shock any more.
                (x <= 1.0).then_some(x)
            }
            StressVariable::Cost if k > 0.0 => Some(headroom / (h * k)),
            StressVariable::CollectionDelay if r > 0.0 => {
                let d = DAYS_PER_PERIOD * headroom / r;
                (d <= DAYS_PER_PERIOD * h).then_some(d)
            }
            _ => None,
        }
    };

    let single_shocks: Vec<BreakingShock> =
        [StressVariable::Revenue, StressVariable::Cost, StressVariable::CollectionDelay]
            .into_iter()
            .map(|variable| {
                let magnitude = solve_one(variable);
                BreakingShock {
                    variable,
                    magnitude,
                    plausibility: classify(variable, magnitude),
                }
            })
            .collect();

    let fraction = combined_fraction.clamp(0.0, 1.0);
    let magnitude_of = |v: StressVariable| {
        single_shocks
            .iter()
            .find(|s| s.variable == v)
            .and_then(|s| s.magnitude)
            .unwrap_or(0.0)
    };
    let shock = Shock {
        revenue_change: -fraction * magnitude_of(StressVariable::Revenue),
        cost_change: fraction * magnitude_of(StressVariable::Cost),
        delay_days: fraction * magnitude_of(StressVariable::CollectionDelay),
    };
    let resulting_cash = baseline.shocked(&shock).deterministic_final(horizon);

    ReverseStressResult {
        horizon,
        headroom,
        already_breached,
        single_shocks,
        combined: CombinedShock {
            fraction,
            shock,
            resulting_cash,
            breaks: resulting_cash <= 0.0,
        },
    }
}
