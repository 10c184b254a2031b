//! Deterministic shock scenarios.
//!
//! Each scenario shifts the baseline cash model by a fixed shock, then
//! reports the deterministic outcome plus a survival probability from a
//! smaller Monte Carlo run on the shocked model. Each scenario seeds its
//! own stream from its name, so adding a scenario never changes the
//! numbers of the others.

use super::{
    model::{CashModel, Shock},
    monte_carlo::{self, SimulationSpec},
};
use crate::rng::derive_seed;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShockScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub revenue_change: f64,
    #[serde(default)]
    pub cost_change: f64,
    #[serde(default)]
    pub delay_days: f64,
}

impl ShockScenario {
    pub fn new(name: &str, description: &str, revenue_change: f64, cost_change: f64, delay_days: f64) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            revenue_change,
            cost_change,
            delay_days,
        }
    }

    pub fn shock(&self) -> Shock {
        Shock {
            revenue_change: self.revenue_change,
            cost_change: self.cost_change,
            delay_days: self.delay_days,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioOutcome {
    pub scenario: ShockScenario,
    pub final_cash: f64,
    pub min_cash: f64,
    /// Final cash relative to the unshocked baseline.
    pub cash_impact: f64,
    /// First period with negative cash, if any within the horizon.
    pub runway_periods: Option<usize>,
    pub survival_probability: f64,
    pub is_worst_case: bool,
}

/// The fixed battery every stress run evaluates.
pub fn standard_battery() -> Vec<ShockScenario> {
    vec![
        ShockScenario::new("baseline", "Current trajectory, no shock", 0.0, 0.0, 0.0),
        ShockScenario::new("revenue_drop_20", "Revenue down 20%", -0.20, 0.0, 0.0),
        ShockScenario::new("revenue_drop_40", "Revenue down 40%", -0.40, 0.0, 0.0),
        ShockScenario::new("cost_increase_15", "Costs up 15%", 0.0, 0.15, 0.0),
        ShockScenario::new("collection_delay_30", "Collections slip 30 days", 0.0, 0.0, 30.0),
        ShockScenario::new("collection_delay_60", "Collections slip 60 days", 0.0, 0.0, 60.0),
        ShockScenario::new(
            "combined_stress",
            "Revenue -20%, costs +10%, collections +30 days",
            -0.20,
            0.10,
            30.0,
        ),
        ShockScenario::new(
            "severe_crisis",
            "Revenue -40%, costs +15%, collections +60 days",
            -0.40,
            0.15,
            60.0,
        ),
    ]
}

pub fn evaluate(
    baseline: &CashModel,
    scenarios: &[ShockScenario],
    spec: &SimulationSpec,
) -> Vec<ScenarioOutcome> {
    let base_final = baseline.deterministic_final(spec.horizon);
    let mut outcomes: Vec<ScenarioOutcome> = scenarios
        .iter()
        .map(|scenario| {
            let model = baseline.shocked(&scenario.shock());
            let path = model.deterministic_path(spec.horizon);
            let final_cash = path.last().copied().unwrap_or(model.current_cash);
            let min_cash = path.iter().copied().fold(model.current_cash, f64::min);
            let sub_spec = SimulationSpec {
                seed: derive_seed(spec.seed, &scenario.name),
                ..*spec
            };
            let summary = monte_carlo::run(&model, &sub_spec);
            log::debug!(
                "stress scenario={} final={final_cash:.0} survival={:.3}",
                scenario.name,
                1.0 - summary.prob_negative
            );
            ScenarioOutcome {
                scenario: scenario.clone(),
                final_cash,
                min_cash,
                cash_impact: final_cash - base_final,
                runway_periods: model.deterministic_runway(spec.horizon),
                survival_probability: 1.0 - summary.prob_negative,
                is_worst_case: false,
            }
        })
        .collect();

    if let Some(worst) = worst_index(&outcomes) {
        outcomes[worst].is_worst_case = true;
    }
    outcomes
}

/// Lowest survival probability; ties go to the lowest final cash.
fn worst_index(outcomes: &[ScenarioOutcome]) -> Option<usize> {
    outcomes
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.survival_probability
                .total_cmp(&b.survival_probability)
                .then_with(|| a.final_cash.total_cmp(&b.final_cash))
        })
        .map(|(i, _)| i)
}
