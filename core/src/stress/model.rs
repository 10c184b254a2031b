//! Period cash model shared by the simulation, scenario, sensitivity
//! and reverse-stress routines.
//!
//! Each period: cash += collected inflow − outflow.
//! Shocks are persistent: the revenue and cost levels follow a
//! multiplicative random walk with mean-one log-normal steps.
//! Collection delay shifts inflows right by `delay_days / 30` periods,
//! with a partial first collection for fractional delays.

use crate::{rng::PathRng, types::DAYS_PER_PERIOD};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CashModel {
    pub current_cash: f64,
    pub monthly_inflow: f64,
    pub monthly_outflow: f64,
    pub revenue_volatility: f64,
    pub cost_volatility: f64,
    pub collection_delay_days: f64,
}

/// The deterministic shocks defining a scenario, relative to baseline.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Shock {
    /// Fractional change in inflows, e.g. -0.2 for a 20% drop.
    pub revenue_change: f64,
    /// Fractional change in outflows, e.g. 0.15 for +15%.
    pub cost_change: f64,
    /// Additional days before inflows are collected.
    pub delay_days: f64,
}

/// What one simulated trajectory produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathOutcome {
    pub final_cash: f64,
    pub min_cash: f64,
}

impl CashModel {
    pub fn shocked(&self, shock: &Shock) -> Self {
        Self {
            monthly_inflow: (self.monthly_inflow * (1.0 + shock.revenue_change)).max(0.0),
            monthly_outflow: (self.monthly_outflow * (1.0 + shock.cost_change)).max(0.0),
            collection_delay_days: (self.collection_delay_days + shock.delay_days).max(0.0),
            ..*self
        }
    }

    /// Fraction of period `t`'s (1-based) inflow collected within the period.
    pub fn collected_fraction(&self, t: usize) -> f64 {
        let delay = self.collection_delay_days.max(0.0) / DAYS_PER_PERIOD;
        (t as f64 - delay).clamp(0.0, 1.0)
    }

    /// Cash balance at the end of each period, without randomness.
    pub fn deterministic_path(&self, horizon: usize) -> Vec<f64> {
        let mut cash = self.current_cash;
        (1..=horizon)
            .map(|t| {
                cash += self.monthly_inflow * self.collected_fraction(t) - self.monthly_outflow;
                cash
            })
            .collect()
    }

    pub fn deterministic_final(&self, horizon: usize) -> f64 {
        self.deterministic_path(horizon)
            .last()
            .copied()
            .unwrap_or(self.current_cash)
    }

    /// First period (1-based) at which cash goes negative.
    pub fn deterministic_runway(&self, horizon: usize) -> Option<usize> {
        self.deterministic_path(horizon)
            .iter()
            .position(|c| *c < 0.0)
            .map(|i| i + 1)
    }

    pub fn simulate(&self, rng: &mut PathRng, horizon: usize) -> PathOutcome {
        let mut cash = self.current_cash;
        let mut min_cash = cash;
        let mut revenue = self.monthly_inflow;
        let mut cost = self.monthly_outflow;
        for t in 1..=horizon {
            revenue *= rng.lognormal_shock(self.revenue_volatility);
            cost *= rng.lognormal_shock(self.cost_volatility);
            cash += revenue * self.collected_fraction(t) - cost;
            min_cash = min_cash.min(cash);
        }
        PathOutcome { final_cash: cash, min_cash }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> CashModel {
        CashModel {
            current_cash: 100.0,
            monthly_inflow: 50.0,
            monthly_outflow: 40.0,
            revenue_volatility: 0.0,
            cost_volatility: 0.0,
            collection_delay_days: 0.0,
        }
    }

    #[test]
    fn deterministic_path_accumulates_net_flow() {
        let path = model().deterministic_path(3);
        assert_eq!(path, vec![110.0, 120.0, 130.0]);
    }

    #[test]
    fn delay_of_one_and_a_half_periods_loses_that_much_inflow() {
        let m = model().shocked(&Shock { delay_days: 45.0, ..Default::default() });
        assert_eq!(m.collected_fraction(1), 0.0);
        assert!((m.collected_fraction(2) - 0.5).abs() < 1e-12);
        assert_eq!(m.collected_fraction(3), 1.0);
        let expected = 100.0 + 50.0 * (6.0 - 1.5) - 40.0 * 6.0;
        assert!((m.deterministic_final(6) - expected).abs() < 1e-9);
    }

    #[test]
    fn zero_volatility_simulation_equals_deterministic() {
        let m = model();
        let mut rng = PathRng::new(1, 0);
        let out = m.simulate(&mut rng, 12);
        assert!((out.final_cash - m.deterministic_final(12)).abs() < 1e-9);
    }
}
