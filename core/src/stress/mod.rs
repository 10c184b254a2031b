//! Stress testing engine.
//!
//! One invocation produces a StressResult combining:
//!   - a Monte Carlo distribution of horizon cash (monte_carlo)
//!   - the fixed scenario battery plus caller scenarios (scenarios)
//!   - one-at-a-time sensitivity curves (sensitivity)
//!   - the reverse stress solution (reverse)
//!
//! Results are pure functions of the request and the seed.

pub mod model;
pub mod monte_carlo;
pub mod reverse;
pub mod scenarios;
pub mod sensitivity;

pub use model::{CashModel, Shock};
pub use monte_carlo::{CashDistribution, MonteCarloSummary, SimulationSpec};
pub use reverse::{Plausibility, ReverseStressResult};
pub use scenarios::{ScenarioOutcome, ShockScenario};
pub use sensitivity::{SensitivityCurve, StressVariable};

use crate::{
    config::StressConfig,
    error::{EngineError, EngineResult},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Volatilities {
    /// Log-volatility of monthly revenue.
    pub revenue: f64,
    /// Log-volatility of monthly cost. Falls back to the configured default.
    #[serde(default)]
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StressRequest {
    pub current_cash: f64,
    pub monthly_inflow: f64,
    pub monthly_outflow: f64,
    #[serde(default)]
    pub volatilities: Volatilities,
    #[serde(default)]
    pub custom_scenarios: Vec<ShockScenario>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub simulations: Option<usize>,
    #[serde(default)]
    pub horizon_periods: Option<usize>,
}

impl StressRequest {
    pub fn new(current_cash: f64, monthly_inflow: f64, monthly_outflow: f64, revenue_volatility: f64) -> Self {
        Self {
            current_cash,
            monthly_inflow,
            monthly_outflow,
            volatilities: Volatilities { revenue: revenue_volatility, cost: None },
            custom_scenarios: Vec::new(),
            seed: None,
            simulations: None,
            horizon_periods: None,
        }
    }

    /// Reject inputs no default can stand in for. Volatility and flow
    /// degeneracies are handled later with safe defaults.
    pub fn validate(&self) -> EngineResult<()> {
        for (name, value) in [
            ("current_cash", self.current_cash),
            ("monthly_inflow", self.monthly_inflow),
            ("monthly_outflow", self.monthly_outflow),
        ] {
            if !value.is_finite() {
                return Err(EngineError::SimulationNumericalFailure {
                    reason: format!("{name} is not a finite number"),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StressResult {
    pub monte_carlo: MonteCarloSummary,
    pub scenarios: Vec<ScenarioOutcome>,
    pub worst_case: Option<String>,
    pub sensitivity: Vec<SensitivityCurve>,
    pub reverse: ReverseStressResult,
    /// Adjustments made to degenerate inputs.
    pub input_notes: Vec<String>,
    pub findings: Vec<String>,
}

fn sanitize_volatility(label: &str, value: f64, notes: &mut Vec<String>) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        notes.push(format!("{label} volatility {value} is not positive; that shock is disabled"));
        0.0
    }
}

/// Build the cash model a request describes, applying safe defaults.
pub fn model_for(request: &StressRequest, config: &StressConfig, notes: &mut Vec<String>) -> CashModel {
    let inflow = if request.monthly_inflow < 0.0 {
        notes.push("negative monthly inflow treated as zero".to_string());
        0.0
    } else {
        request.monthly_inflow
    };
    let outflow = if request.monthly_outflow < 0.0 {
        notes.push("negative monthly outflow treated as zero".to_string());
        0.0
    } else {
        request.monthly_outflow
    };
    let cost_vol = request.volatilities.cost.unwrap_or(config.default_cost_volatility);
    CashModel {
        current_cash: request.current_cash,
        monthly_inflow: inflow,
        monthly_outflow: outflow,
        revenue_volatility: sanitize_volatility("revenue", request.volatilities.revenue, notes),
        cost_volatility: sanitize_volatility("cost", cost_vol, notes),
        collection_delay_days: 0.0,
    }
}

/// The configured count is a floor: requests may ask for more paths, never fewer.
fn simulation_count(requested: Option<usize>, config: &StressConfig, notes: &mut Vec<String>) -> usize {
    let floor = config.simulations.max(1);
    match requested {
        Some(n) if n < floor => {
            log::warn!("stress: {n} simulations requested, raised to the floor of {floor}");
            notes.push(format!("{n} simulations requested; raised to the minimum of {floor}"));
            floor
        }
        Some(n) => n,
        None => floor,
    }
}

pub fn run_stress_test(request: &StressRequest, config: &StressConfig) -> EngineResult<StressResult> {
    request.validate()?;
    let mut input_notes = Vec::new();
    let model = model_for(request, config, &mut input_notes);
    let horizon = request.horizon_periods.unwrap_or(config.horizon_periods).max(1);
    let seed = request.seed.unwrap_or(config.seed);
    let safety_threshold = config.safety_periods * model.monthly_outflow;
    let simulations = simulation_count(request.simulations, config, &mut input_notes);

    let spec = SimulationSpec {
        simulations,
        horizon,
        seed,
        confidence: config.confidence,
        safety_threshold,
    };
    log::info!(
        "stress seed={seed} simulations={} horizon={horizon} cash={:.0}",
        spec.simulations,
        model.current_cash
    );
    let monte_carlo = monte_carlo::run(&model, &spec);

    let mut battery = scenarios::standard_battery();
    battery.extend(request.custom_scenarios.iter().cloned());
    let scenario_spec = SimulationSpec {
        simulations: config.scenario_simulations.max(1),
        ..spec
    };
    let scenarios = scenarios::evaluate(&model, &battery, &scenario_spec);
    let worst_case = scenarios
        .iter()
        .find(|s| s.is_worst_case)
        .map(|s| s.scenario.name.clone());

    let sensitivity = sensitivity::analyze(&model, horizon);
    let reverse = reverse::solve(&model, config.reverse_horizon_periods.max(1), config.combined_shock_fraction);

    let mut result = StressResult {
        monte_carlo,
        scenarios,
        worst_case,
        sensitivity,
        reverse,
        input_notes,
        findings: Vec::new(),
    };
    result.findings = findings(&result);
    log::info!(
        "stress done prob_negative={:.4} var={:.0} cvar={:.0} worst={}",
        result.monte_carlo.prob_negative,
        result.monte_carlo.value_at_risk,
        result.monte_carlo.conditional_var,
        result.worst_case.as_deref().unwrap_or("none")
    );
    Ok(result)
}

fn findings(result: &StressResult) -> Vec<String> {
    let mc = &result.monte_carlo;
    let mut out = vec![format!(
        "Across {} simulated paths over {} periods, cash goes negative in {:.1}% of cases and falls below the safety threshold in {:.1}%.",
        mc.simulations,
        mc.horizon,
        mc.prob_negative * 100.0,
        mc.prob_breach * 100.0
    )];
    out.push(format!(
        "At {:.0}% confidence the value at risk is {:.0} and the expected loss beyond it is {:.0}.",
        mc.confidence * 100.0,
        mc.value_at_risk,
        mc.conditional_var
    ));
    if let Some(worst) = result.scenarios.iter().find(|s| s.is_worst_case) {
        out.push(format!(
            "Worst scenario is {} ({}) with a survival probability of {:.1}% and final cash of {:.0}.",
            worst.scenario.name,
            worst.scenario.description,
            worst.survival_probability * 100.0,
            worst.final_cash
        ));
    }
    for curve in &result.sensitivity {
        if let Some(bp) = curve.breaking_point {
            out.push(format!(
                "{:?}: cash reaches zero at a change of {bp:.1} {}.",
                curve.variable, curve.unit
            ));
        }
    }
    let rev = &result.reverse;
    if rev.already_breached {
        out.push(format!(
            "Cash is already exhausted within {} periods without any shock.",
            rev.horizon
        ));
    } else {
        for s in &rev.single_shocks {
            if let Some(m) = s.magnitude {
                let shown = match s.variable {
                    StressVariable::CollectionDelay => format!("{m:.0} days"),
                    _ => format!("{:.1}%", m * 100.0),
                };
                out.push(format!(
                    "A {:?} shock of {shown} alone empties cash within {} periods ({:?}).",
                    s.variable, rev.horizon, s.plausibility
                ));
            }
        }
    }
    out
}
