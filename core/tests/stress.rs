//! Stress engine: Monte Carlo, scenario battery, sensitivity and reverse stress.

use cashdesk_core::{
    config::{EngineConfig, StressConfig},
    error::EngineError,
    stress::{self, Plausibility, ShockScenario, StressRequest, StressVariable},
};
use proptest::prelude::*;

fn scenario_two() -> StressRequest {
    let mut req = StressRequest::new(250_000.0, 120_000.0, 100_000.0, 0.18);
    req.seed = Some(42);
    req.simulations = Some(10_000);
    req.horizon_periods = Some(12);
    req
}

#[test]
fn scenario_two_probability_is_reproducible_and_interior() {
    let config = EngineConfig::default_test();
    let a = stress::run_stress_test(&scenario_two(), &config.stress).expect("run a");
    let b = stress::run_stress_test(&scenario_two(), &config.stress).expect("run b");

    let p = a.monte_carlo.prob_negative;
    assert_eq!(p, b.monte_carlo.prob_negative, "probability must be reproducible");
    assert!(p > 0.0 && p < 1.0, "prob_negative should be interior, got {p}");
    assert_eq!(a.monte_carlo.simulations, 10_000);
    assert_eq!(a.monte_carlo.horizon, 12);
}

#[test]
fn simulation_count_never_drops_below_config() {
    let mut config = EngineConfig::default_test().stress;
    config.simulations = 1_000;
    config.scenario_simulations = 50;

    let mut req = StressRequest::new(100_000.0, 50_000.0, 45_000.0, 0.1);
    req.simulations = Some(10);
    let low = stress::run_stress_test(&req, &config).expect("low request");
    assert_eq!(low.monte_carlo.simulations, 1_000);
    assert!(low.input_notes.iter().any(|n| n.contains("10 simulations requested")));

    req.simulations = Some(1_500);
    let high = stress::run_stress_test(&req, &config).expect("high request");
    assert_eq!(high.monte_carlo.simulations, 1_500);
    assert!(high.input_notes.is_empty());
}

#[test]
fn distribution_is_ordered_and_risk_measures_consistent() {
    let config = EngineConfig::default_test();
    let r = stress::run_stress_test(&scenario_two(), &config.stress).expect("run");
    let d = r.monte_carlo.distribution;
    assert!(d.min <= d.p_low && d.p_low <= d.median && d.median <= d.p_high && d.p_high <= d.max);
    assert!(r.monte_carlo.value_at_risk >= 0.0);
    assert!(r.monte_carlo.conditional_var >= r.monte_carlo.value_at_risk);
    assert!(r.monte_carlo.prob_breach >= r.monte_carlo.prob_negative);
}

#[test]
fn battery_flags_exactly_one_worst_case() {
    let config = EngineConfig::default_test();
    let mut req = scenario_two();
    req.custom_scenarios
        .push(ShockScenario::new("meltdown", "Revenue -80%", -0.80, 0.0, 0.0));
    let r = stress::run_stress_test(&req, &config.stress).expect("run");

    assert_eq!(r.scenarios.len(), 9, "8 standard scenarios plus one custom");
    assert_eq!(r.scenarios.iter().filter(|s| s.is_worst_case).count(), 1);
    let worst = r.scenarios.iter().find(|s| s.is_worst_case).unwrap();
    for s in &r.scenarios {
        assert!(worst.survival_probability <= s.survival_probability);
        assert!((0.0..=1.0).contains(&s.survival_probability));
    }
    assert_eq!(r.worst_case.as_deref(), Some(worst.scenario.name.as_str()));

    let baseline = r.scenarios.iter().find(|s| s.scenario.name == "baseline").unwrap();
    assert_eq!(baseline.cash_impact, 0.0);
}

#[test]
fn sensitivity_covers_every_variable() {
    let config = EngineConfig::default_test();
    let r = stress::run_stress_test(&scenario_two(), &config.stress).expect("run");
    let variables: Vec<StressVariable> = r.sensitivity.iter().map(|c| c.variable).collect();
    assert_eq!(
        variables,
        vec![StressVariable::Revenue, StressVariable::Cost, StressVariable::CollectionDelay]
    );
    let revenue = &r.sensitivity[0];
    assert!(revenue.elasticity > 0.0, "more revenue means more cash");
    let cost = &r.sensitivity[1];
    assert!(cost.elasticity < 0.0, "more cost means less cash");
}

#[test]
fn reverse_stress_revenue_drop_in_closed_form() {
    let config = EngineConfig::default_test();
    let r = stress::run_stress_test(&scenario_two(), &config.stress).expect("run");
    let rev = &r.reverse;
    // Six periods: headroom 250k + 6 * 20k = 370k; revenue drop 370k / 720k.
    assert_eq!(rev.horizon, 6);
    assert!((rev.headroom - 370_000.0).abs() < 1e-6);
    let drop = rev
        .single_shocks
        .iter()
        .find(|s| s.variable == StressVariable::Revenue)
        .and_then(|s| s.magnitude)
        .expect("revenue shock solvable");
    assert!((drop - 370_000.0 / 720_000.0).abs() < 1e-9);
    assert!(!rev.already_breached);
}

#[test]
fn non_finite_inputs_rejected() {
    let config = StressConfig::default();
    let req = StressRequest::new(f64::NAN, 100.0, 50.0, 0.1);
    let err = stress::run_stress_test(&req, &config).unwrap_err();
    assert!(matches!(err, EngineError::SimulationNumericalFailure { .. }));
}

#[test]
fn degenerate_volatility_uses_safe_default() {
    let mut config = EngineConfig::default_test().stress;
    config.simulations = 200;
    config.scenario_simulations = 50;
    let mut req = StressRequest::new(100_000.0, 50_000.0, 40_000.0, -1.0);
    req.volatilities.cost = Some(0.0);
    let r = stress::run_stress_test(&req, &config).expect("run");
    assert!(!r.input_notes.is_empty());
    // With both shocks disabled every path is the deterministic one.
    assert!(r.monte_carlo.distribution.std_dev < 1e-3);
    assert_eq!(r.monte_carlo.prob_negative, 0.0);
    for s in &r.reverse.single_shocks {
        assert_eq!(s.magnitude.is_none(), s.plausibility == Plausibility::Unreachable);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn risk_measures_hold_for_any_inputs(
        cash in -50_000.0f64..500_000.0,
        inflow in 0.0f64..200_000.0,
        outflow in 0.0f64..200_000.0,
        vol in 0.0f64..0.6,
        seed in any::<u64>(),
    ) {
        let mut config = StressConfig::default();
        config.simulations = 300;
        config.scenario_simulations = 50;
        let mut req = StressRequest::new(cash, inflow, outflow, vol);
        req.seed = Some(seed);
        let r = stress::run_stress_test(&req, &config).unwrap();
        let mc = &r.monte_carlo;
        prop_assert!(mc.value_at_risk >= 0.0);
        prop_assert!(mc.conditional_var >= mc.value_at_risk);
        prop_assert!((0.0..=1.0).contains(&mc.prob_negative));
        prop_assert!(mc.distribution.min <= mc.distribution.max);
    }
}
