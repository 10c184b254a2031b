//! Monte Carlo simulation of the cash position.
//!
//! Trajectories are independent and run on the rayon pool. Each one
//! owns a PathRng derived from (seed, trajectory index), so results do
//! not depend on thread count or scheduling. Reductions run
//! sequentially over the index-ordered outcomes, which keeps summary
//! statistics bit-identical between runs.

use super::model::{CashModel, PathOutcome};
use crate::{rng::PathRng, stats};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SimulationSpec {
    pub simulations: usize,
    pub horizon: usize,
    pub seed: u64,
    pub confidence: f64,
    pub safety_threshold: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CashDistribution {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    /// Lower tail percentile at (1 − confidence), the 5th by default.
    pub p_low: f64,
    /// Upper tail percentile at confidence, the 95th by default.
    pub p_high: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonteCarloSummary {
    pub simulations: usize,
    pub horizon: usize,
    pub seed: u64,
    pub confidence: f64,
    pub distribution: CashDistribution,
    /// Share of trajectories whose cash went below zero at any period.
    pub prob_negative: f64,
    /// Share of trajectories that dipped below the safety threshold.
    pub prob_breach: f64,
    pub safety_threshold: f64,
    pub value_at_risk: f64,
    pub conditional_var: f64,
    pub expected_min_cash: f64,
}

pub fn simulate_paths(model: &CashModel, spec: &SimulationSpec) -> Vec<PathOutcome> {
    (0..spec.simulations as u64)
        .into_par_iter()
        .map(|i| {
            let mut rng = PathRng::new(spec.seed, i);
            model.simulate(&mut rng, spec.horizon)
        })
        .collect()
}

pub fn run(model: &CashModel, spec: &SimulationSpec) -> MonteCarloSummary {
    let outcomes = simulate_paths(model, spec);
    summarize(model.current_cash, &outcomes, spec)
}

pub fn summarize(current_cash: f64, outcomes: &[PathOutcome], spec: &SimulationSpec) -> MonteCarloSummary {
    let n = outcomes.len();
    let finals: Vec<f64> = outcomes.iter().map(|o| o.final_cash).collect();
    let mut sorted = finals.clone();
    sorted.sort_by(f64::total_cmp);

    let tail_q = 1.0 - spec.confidence;
    let p_low = stats::percentile_sorted(&sorted, tail_q);
    let distribution = CashDistribution {
        mean: stats::mean(&finals),
        median: stats::percentile_sorted(&sorted, 0.5),
        std_dev: stats::std_dev(&finals),
        p_low,
        p_high: stats::percentile_sorted(&sorted, spec.confidence),
        min: sorted.first().copied().unwrap_or(current_cash),
        max: sorted.last().copied().unwrap_or(current_cash),
    };

    let negative = outcomes.iter().filter(|o| o.min_cash < 0.0).count();
    let breach = outcomes.iter().filter(|o| o.min_cash < spec.safety_threshold).count();
    let mins: Vec<f64> = outcomes.iter().map(|o| o.min_cash).collect();

    let value_at_risk = (current_cash - p_low).max(0.0);
    let tail: Vec<f64> = sorted
        .iter()
        .take_while(|x| **x <= p_low)
        .map(|x| current_cash - x)
        .collect();
    let conditional_var = if tail.is_empty() {
        value_at_risk
    } else {
        stats::mean(&tail).max(value_at_risk)
    };

    MonteCarloSummary {
        simulations: n,
        horizon: spec.horizon,
        seed: spec.seed,
        confidence: spec.confidence,
        distribution,
        prob_negative: stats::safe_ratio(negative as f64, n as f64),
        prob_breach: stats::safe_ratio(breach as f64, n as f64),
        safety_threshold: spec.safety_threshold,
        value_at_risk,
        conditional_var,
        expected_min_cash: stats::mean(&mins),
    }
}
