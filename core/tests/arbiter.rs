//! Decision arbiter: hire vs outsource, buy vs lease, early payment.

use cashdesk_core::{
    arbiter::{self, Recommendation},
    config::ArbiterConfig,
};

const SALARY: f64 = 4_500.0;
const HORIZON: usize = 36;

fn outsource_cost(markup: f64) -> f64 {
    let req = arbiter::hire_vs_outsource(SALARY, markup, HORIZON);
    arbiter::arbitrate(&req, &ArbiterConfig::default()).option_b.total_cost
}

#[test]
fn outsource_cost_increases_with_markup() {
    let mut previous = f64::NEG_INFINITY;
    for step in 0..=40 {
        let cost = outsource_cost(step as f64 * 0.05);
        assert!(cost > previous, "cost must rise with markup: {cost} after {previous}");
        previous = cost;
    }
}

#[test]
fn recommendation_flips_from_hire_to_outsource() {
    let config = ArbiterConfig::default();
    let mut seen_outsource = false;
    for step in (0..=100).rev() {
        let markup = step as f64 * 0.01;
        let result = arbiter::arbitrate(&arbiter::hire_vs_outsource(SALARY, markup, HORIZON), &config);
        let hire = result.option_a.total_cost;
        let out = result.option_b.total_cost;
        let saving = (hire - out) / hire;
        match result.recommended_option.as_str() {
            "outsource" => {
                seen_outsource = true;
                assert!(saving > 0.10, "outsource recommended at markup {markup} with saving {saving:.4}");
            }
            "hire" => {
                assert!(!seen_outsource, "recommendation flipped back to hire at markup {markup}");
                assert!(saving <= 0.10, "hire kept at markup {markup} despite saving {saving:.4}");
            }
            other => panic!("unexpected option {other}"),
        }
    }
    assert!(seen_outsource);

    let expensive = arbiter::arbitrate(&arbiter::hire_vs_outsource(SALARY, 1.0, HORIZON), &config);
    assert_eq!(expensive.recommended_option, "hire");
    let cheap = arbiter::arbitrate(&arbiter::hire_vs_outsource(SALARY, 0.0, HORIZON), &config);
    assert_eq!(cheap.recommended_option, "outsource");
    assert_eq!(cheap.recommendation, Recommendation::StrongB);
}

#[test]
fn seven_percent_saving_keeps_hire() {
    // Hire costs 249,300 over 36 months; outsource 178,200 * (1 + markup).
    let result = arbiter::arbitrate(&arbiter::hire_vs_outsource(SALARY, 0.30, HORIZON), &ArbiterConfig::default());
    assert!((result.saving_b - 0.0708).abs() < 1e-3, "{}", result.saving_b);
    assert_eq!(result.recommendation, Recommendation::SlightB);
    assert_eq!(result.recommended_option, "hire");
    assert!(result.findings.iter().any(|f| f.contains("needed to switch")));
}

#[test]
fn twelve_percent_saving_switches_to_outsource() {
    let result = arbiter::arbitrate(&arbiter::hire_vs_outsource(SALARY, 0.23, HORIZON), &ArbiterConfig::default());
    assert!((result.saving_b - 0.1208).abs() < 1e-3, "{}", result.saving_b);
    assert_eq!(result.recommendation, Recommendation::SlightB);
    assert_eq!(result.recommended_option, "outsource");
}

#[test]
fn neutral_gap_keeps_first_option() {
    // Markup 0.40: outsource costs 249,480, within 0.1% of hire.
    let result = arbiter::arbitrate(&arbiter::hire_vs_outsource(SALARY, 0.40, HORIZON), &ArbiterConfig::default());
    assert_eq!(result.recommendation, Recommendation::Neutral);
    assert_eq!(result.recommended_option, "hire");
}

#[test]
fn hidden_costs_are_disclosed() {
    let result = arbiter::arbitrate(&arbiter::hire_vs_outsource(SALARY, 0.3, HORIZON), &ArbiterConfig::default());
    assert!(result.option_a.hidden_cost_total > 0.0, "turnover risk should be priced");
    assert!(result.option_b.hidden_cost_total > 0.0, "coordination overhead should be priced");
    assert!(result.findings.iter().any(|f| f.contains("hidden costs")));
    assert_eq!(result.option_a.cash_flows.len(), HORIZON + 1);
}

#[test]
fn buy_vs_lease_breaks_even_when_lease_is_expensive() {
    let req = arbiter::buy_vs_lease(30_000.0, 100.0, 0.3, 1_500.0, 48);
    let result = arbiter::arbitrate(&req, &ArbiterConfig::default());
    assert_eq!(result.recommended_option, "buy");
    let month = result.break_even_month.expect("buy should break even");
    assert!(month > 0 && month <= 48);
}

#[test]
fn generous_early_payment_discount_wins() {
    let req = arbiter::early_payment_discount(100_000.0, 0.10, 60);
    let result = arbiter::arbitrate(&req, &ArbiterConfig::default());
    assert_eq!(result.recommended_option, "pay_early");
    assert!(result.option_a.total_cost < result.option_b.total_cost);
}
