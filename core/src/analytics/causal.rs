//! Causal decomposition of receivable aging drift between two cycles.
//!
//! Portfolio aging is the exposure-weighted mean of per-counterparty
//! days overdue: D = Σ wᵢ·dᵢ. Its change between cycles splits exactly
//! into
//!
//!   rate effect  Σ w₀ᵢ·(d₁ᵢ − d₀ᵢ)   counterparties paying later
//!   mix effect   Σ (w₁ᵢ − w₀ᵢ)·d₁ᵢ   exposure shifting toward slow payers
//!
//! A counterparty absent from one side has weight and days of zero there.

use crate::{portfolio::PortfolioSnapshot, types::CounterpartyId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Drivers whose absolute contribution is below this many days are not reported.
pub const DRIVER_MIN_DAYS: f64 = 0.5;
pub const MAX_REPORTED_DRIVERS: usize = 3;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct AgingPoint {
    /// Share of total outstanding, 0..1.
    pub weight: f64,
    /// Exposure-weighted days overdue for this counterparty.
    pub days: f64,
}

pub type AgingProfile = BTreeMap<CounterpartyId, AgingPoint>;

pub fn aging_profile(snapshot: &PortfolioSnapshot) -> AgingProfile {
    snapshot
        .exposures
        .iter()
        .map(|(id, e)| {
            (
                id.clone(),
                AgingPoint {
                    weight: e.share,
                    days: e.weighted_days_overdue,
                },
            )
        })
        .collect()
}

pub fn weighted_days(profile: &AgingProfile) -> f64 {
    profile.values().map(|p| p.weight * p.days).sum()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverContribution {
    pub counterparty_id: CounterpartyId,
    pub rate_effect: f64,
    pub mix_effect: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgingDecomposition {
    pub prior_days: f64,
    pub current_days: f64,
    pub total_change: f64,
    pub rate_effect: f64,
    pub mix_effect: f64,
    /// Sorted by absolute contribution, largest first.
    pub drivers: Vec<DriverContribution>,
    pub findings: Vec<String>,
}

pub fn decompose(prior: &AgingProfile, current: &AgingProfile) -> AgingDecomposition {
    let ids: BTreeSet<&CounterpartyId> = prior.keys().chain(current.keys()).collect();
    let mut drivers: Vec<DriverContribution> = ids
        .into_iter()
        .map(|id| {
            let p0 = prior.get(id).copied().unwrap_or_default();
            let p1 = current.get(id).copied().unwrap_or_default();
            let rate_effect = p0.weight * (p1.days - p0.days);
            let mix_effect = (p1.weight - p0.weight) * p1.days;
            DriverContribution {
                counterparty_id: id.clone(),
                rate_effect,
                mix_effect,
                total: rate_effect + mix_effect,
            }
        })
        .collect();
    drivers.sort_by(|a, b| {
        b.total
            .abs()
            .total_cmp(&a.total.abs())
            .then_with(|| a.counterparty_id.cmp(&b.counterparty_id))
    });

    let prior_days = weighted_days(prior);
    let current_days = weighted_days(current);
    let rate_effect = drivers.iter().map(|d| d.rate_effect).sum();
    let mix_effect = drivers.iter().map(|d| d.mix_effect).sum();
    let mut out = AgingDecomposition {
        prior_days,
        current_days,
        total_change: current_days - prior_days,
        rate_effect,
        mix_effect,
        drivers,
        findings: Vec::new(),
    };
    out.findings = findings(&out);
    out
}

fn findings(d: &AgingDecomposition) -> Vec<String> {
    let mut out = vec![format!(
        "Average days overdue moved from {:.1} to {:.1} ({:+.1} days): {:+.1} from counterparties paying later or sooner, {:+.1} from exposure shifting between counterparties.",
        d.prior_days, d.current_days, d.total_change, d.rate_effect, d.mix_effect
    )];
    for driver in d
        .drivers
        .iter()
        .filter(|c| c.total.abs() >= DRIVER_MIN_DAYS)
        .take(MAX_REPORTED_DRIVERS)
    {
        out.push(format!(
            "{} contributed {:+.1} days ({:+.1} payment delay, {:+.1} exposure weight).",
            driver.counterparty_id, driver.total, driver.rate_effect, driver.mix_effect
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(weight: f64, days: f64) -> AgingPoint {
        AgingPoint { weight, days }
    }

    #[test]
    fn effects_sum_to_total_change() {
        let prior: AgingProfile = [
            ("a".to_string(), point(0.5, 20.0)),
            ("b".to_string(), point(0.5, 40.0)),
        ]
        .into();
        let current: AgingProfile = [
            ("a".to_string(), point(0.3, 35.0)),
            ("c".to_string(), point(0.7, 10.0)),
        ]
        .into();
        let d = decompose(&prior, &current);
        assert!((d.rate_effect + d.mix_effect - d.total_change).abs() < 1e-9);
        assert!((d.current_days - (0.3 * 35.0 + 0.7 * 10.0)).abs() < 1e-9);
    }

    #[test]
    fn pure_delay_increase_is_all_rate_effect() {
        let prior: AgingProfile = [("a".to_string(), point(1.0, 10.0))].into();
        let current: AgingProfile = [("a".to_string(), point(1.0, 25.0))].into();
        let d = decompose(&prior, &current);
        assert!((d.rate_effect - 15.0).abs() < 1e-9);
        assert!(d.mix_effect.abs() < 1e-9);
    }
}
