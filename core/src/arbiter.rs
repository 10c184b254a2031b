//! Decision arbiter: compare two financing or operational options.
//!
//! Each option becomes a month-by-month net cash-flow projection
//! (month 0 carries the upfront cost). Hidden costs are disclosed
//! separately and enter the projection at their expected value.
//!
//! Recommendation strength comes from the undiscounted cost gap relative
//! to the cheaper option: beyond the strong threshold (15%) the cheaper
//! option is strongly preferred, beyond the slight threshold (5%)
//! slightly, otherwise the call is neutral.
//!
//! The recommended option is separate from the strength label. Option A
//! is the default choice and stays recommended until option B undercuts
//! its total cost by more than the switch threshold (10% of A's cost).

use crate::{config::ArbiterConfig, stats};
use serde::{Deserialize, Serialize};

/// Employer social charges on top of gross salary.
pub const EMPLOYER_CHARGE_RATE: f64 = 0.45;
/// Recruitment cost as a multiple of monthly gross salary.
pub const RECRUITMENT_SALARY_MONTHS: f64 = 2.0;
pub const ANNUAL_TURNOVER_PROBABILITY: f64 = 0.20;
/// Coordination overhead of an external provider, share of its fee.
pub const COORDINATION_OVERHEAD: f64 = 0.10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    HireVsOutsource,
    BuyVsLease,
    EarlyPaymentDiscount,
    Generic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CostFrequency {
    Monthly,
    Once { month: usize },
    EveryMonths { months: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HiddenCost {
    pub label: String,
    pub amount: f64,
    pub frequency: CostFrequency,
    /// Probability the cost materialises each time it can occur.
    #[serde(default = "certain")]
    pub probability: f64,
}

fn certain() -> f64 {
    1.0
}

impl HiddenCost {
    pub fn monthly(label: &str, amount: f64) -> Self {
        Self { label: label.to_string(), amount, frequency: CostFrequency::Monthly, probability: 1.0 }
    }

    fn expected_at(&self, month: usize) -> f64 {
        let hits = match self.frequency {
            CostFrequency::Once { month: m } => m == month,
            // Recurring costs start after the upfront month.
            _ if month == 0 => false,
            CostFrequency::Monthly => true,
            CostFrequency::EveryMonths { months } => months > 0 && month % months == 0,
        };
        if hits {
            self.amount * self.probability.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// A signed flow at a given month. Negative is an outflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledFlow {
    pub label: String,
    pub month: usize,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionParams {
    pub name: String,
    #[serde(default)]
    pub upfront_cost: f64,
    #[serde(default)]
    pub monthly_cost: f64,
    #[serde(default)]
    pub monthly_benefit: f64,
    #[serde(default)]
    pub hidden_costs: Vec<HiddenCost>,
    #[serde(default)]
    pub scheduled_flows: Vec<ScheduledFlow>,
    /// 0-100, how easily the choice can be reversed.
    #[serde(default = "midpoint")]
    pub flexibility: f64,
    /// 0-100, fit with the company's direction.
    #[serde(default = "midpoint")]
    pub strategic_fit: f64,
    /// 0-100 execution risk before hidden costs are considered.
    #[serde(default)]
    pub base_risk: f64,
}

fn midpoint() -> f64 {
    50.0
}

impl OptionParams {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            upfront_cost: 0.0,
            monthly_cost: 0.0,
            monthly_benefit: 0.0,
            hidden_costs: Vec::new(),
            scheduled_flows: Vec::new(),
            flexibility: 50.0,
            strategic_fit: 50.0,
            base_risk: 0.0,
        }
    }

    /// Net flow per month, index 0..=horizon.
    pub fn projection(&self, horizon: usize) -> Vec<MonthFlow> {
        (0..=horizon)
            .map(|m| {
                let mut outflow = if m == 0 { self.upfront_cost } else { self.monthly_cost };
                let mut inflow = if m == 0 { 0.0 } else { self.monthly_benefit };
                let hidden: f64 = self.hidden_costs.iter().map(|h| h.expected_at(m)).sum();
                outflow += hidden;
                for f in self.scheduled_flows.iter().filter(|f| f.month == m) {
                    if f.amount < 0.0 {
                        outflow -= f.amount;
                    } else {
                        inflow += f.amount;
                    }
                }
                MonthFlow { month: m, inflow, outflow, hidden, net: inflow - outflow }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MonthFlow {
    pub month: usize,
    pub inflow: f64,
    pub outflow: f64,
    pub hidden: f64,
    pub net: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArbitrationRequest {
    pub decision_type: DecisionType,
    pub horizon_months: usize,
    pub option_a: OptionParams,
    pub option_b: OptionParams,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionEvaluation {
    pub name: String,
    pub npv: f64,
    /// Undiscounted outflows net of inflows over the horizon.
    pub total_cost: f64,
    pub hidden_cost_total: f64,
    pub max_cash_outflow: f64,
    pub risk_score: f64,
    pub weighted_score: f64,
    pub cash_flows: Vec<MonthFlow>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongA,
    SlightA,
    Neutral,
    SlightB,
    StrongB,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArbitrationResult {
    pub decision_type: DecisionType,
    pub horizon_months: usize,
    pub option_a: OptionEvaluation,
    pub option_b: OptionEvaluation,
    /// (cost_a − cost_b) / cheaper cost. Positive favours B.
    pub cost_gap: f64,
    pub recommendation: Recommendation,
    /// Share of A's total cost that B saves. Negative when B costs more.
    pub saving_b: f64,
    pub recommended_option: String,
    /// Month from which the higher-upfront option is cumulatively ahead.
    pub break_even_month: Option<usize>,
    pub findings: Vec<String>,
}

pub fn monthly_rate(annual: f64) -> f64 {
    (1.0 + annual.max(-0.99)).powf(1.0 / 12.0) - 1.0
}

pub fn npv(flows: &[MonthFlow], monthly_rate: f64) -> f64 {
    flows
        .iter()
        .map(|f| f.net / (1.0 + monthly_rate).powi(f.month as i32))
        .sum()
}

fn evaluate_option(params: &OptionParams, horizon: usize, rate: f64) -> OptionEvaluation {
    let cash_flows = params.projection(horizon);
    let total_cost: f64 = cash_flows.iter().map(|f| f.outflow - f.inflow).sum();
    let gross_outflow: f64 = cash_flows.iter().map(|f| f.outflow).sum();
    let hidden_cost_total: f64 = cash_flows.iter().map(|f| f.hidden).sum();
    let max_cash_outflow = cash_flows.iter().map(|f| f.outflow).fold(0.0, f64::max);
    let hidden_share = stats::safe_ratio(hidden_cost_total, gross_outflow);
    let risk_score = (params.base_risk + 100.0 * hidden_share).clamp(0.0, 100.0);
    OptionEvaluation {
        name: params.name.clone(),
        npv: npv(&cash_flows, rate),
        total_cost,
        hidden_cost_total,
        max_cash_outflow,
        risk_score,
        weighted_score: 0.0,
        cash_flows,
    }
}

/// Relative NPV standing in 0..100; 50 when equal.
fn npv_score(own: f64, other: f64) -> f64 {
    let scale = own.abs().max(other.abs()).max(1.0);
    (50.0 + 50.0 * (own - other) / scale).clamp(0.0, 100.0)
}

/// Lower peak outflow scores higher; the smaller peak gets 100.
fn cash_score(own: f64, other: f64) -> f64 {
    if own <= 0.0 {
        100.0
    } else {
        (100.0 * own.min(other).max(0.0) / own).clamp(0.0, 100.0)
    }
}

fn weighted(
    own: &OptionEvaluation,
    other: &OptionEvaluation,
    params: &OptionParams,
    config: &ArbiterConfig,
) -> f64 {
    npv_score(own.npv, other.npv) * config.weight_npv
        + cash_score(own.max_cash_outflow, other.max_cash_outflow) * config.weight_cash
        + (100.0 - own.risk_score) * config.weight_risk
        + params.flexibility.clamp(0.0, 100.0) * config.weight_flexibility
        + params.strategic_fit.clamp(0.0, 100.0) * config.weight_strategic
}

pub fn cost_gap(cost_a: f64, cost_b: f64) -> f64 {
    let cheaper = cost_a.min(cost_b).abs().max(1.0);
    (cost_a - cost_b) / cheaper
}

/// Share of `cost_a` saved by choosing B instead.
pub fn saving_share(cost_a: f64, cost_b: f64) -> f64 {
    (cost_a - cost_b) / cost_a.abs().max(1.0)
}

/// B replaces the default A only on a saving above `switch_threshold`.
pub fn switches_to_b(saving_b: f64, config: &ArbiterConfig) -> bool {
    saving_b > config.switch_threshold
}

pub fn recommendation_for(gap: f64, config: &ArbiterConfig) -> Recommendation {
    if gap > config.strong_threshold {
        Recommendation::StrongB
    } else if gap > config.slight_threshold {
        Recommendation::SlightB
    } else if gap < -config.strong_threshold {
        Recommendation::StrongA
    } else if gap < -config.slight_threshold {
        Recommendation::SlightA
    } else {
        Recommendation::Neutral
    }
}

/// First month at which the higher-upfront option's cumulative net flow
/// catches up with the other's. None when upfronts are equal or it never does.
pub fn break_even_month(a: &OptionEvaluation, b: &OptionEvaluation, upfront_a: f64, upfront_b: f64) -> Option<usize> {
    let (heavy, light) = if upfront_a > upfront_b {
        (a, b)
    } else if upfront_b > upfront_a {
        (b, a)
    } else {
        return None;
    };
    let mut advantage = 0.0;
    for (h, l) in heavy.cash_flows.iter().zip(light.cash_flows.iter()) {
        advantage += h.net - l.net;
        if h.month > 0 && advantage >= 0.0 {
            return Some(h.month);
        }
    }
    None
}

pub fn arbitrate(request: &ArbitrationRequest, config: &ArbiterConfig) -> ArbitrationResult {
    let horizon = request.horizon_months.max(1);
    let rate = monthly_rate(config.annual_discount_rate);
    let mut a = evaluate_option(&request.option_a, horizon, rate);
    let mut b = evaluate_option(&request.option_b, horizon, rate);
    a.weighted_score = weighted(&a, &b, &request.option_a, config);
    b.weighted_score = weighted(&b, &a, &request.option_b, config);

    let gap = cost_gap(a.total_cost, b.total_cost);
    let recommendation = recommendation_for(gap, config);
    let saving_b = saving_share(a.total_cost, b.total_cost);
    let recommended_option = if switches_to_b(saving_b, config) {
        b.name.clone()
    } else {
        a.name.clone()
    };
    let break_even = break_even_month(&a, &b, request.option_a.upfront_cost, request.option_b.upfront_cost);

    let mut result = ArbitrationResult {
        decision_type: request.decision_type,
        horizon_months: horizon,
        option_a: a,
        option_b: b,
        cost_gap: gap,
        recommendation,
        saving_b,
        recommended_option,
        break_even_month: break_even,
        findings: Vec::new(),
    };
    result.findings = findings(&result, config);
    log::info!(
        "arbitrate type={:?} gap={:.3} recommendation={:?}",
        result.decision_type,
        result.cost_gap,
        result.recommendation
    );
    result
}

fn findings(result: &ArbitrationResult, config: &ArbiterConfig) -> Vec<String> {
    let (a, b) = (&result.option_a, &result.option_b);
    let mut out = vec![format!(
        "Over {} months, {} costs {:.0} in total against {:.0} for {}.",
        result.horizon_months, a.name, a.total_cost, b.total_cost, b.name
    )];
    for opt in [a, b] {
        if opt.hidden_cost_total > 0.0 {
            out.push(format!(
                "{} carries {:.0} of expected hidden costs.",
                opt.name, opt.hidden_cost_total
            ));
        }
    }
    out.push(format!(
        "Net present value: {} {:.0}, {} {:.0}.",
        a.name, a.npv, b.name, b.npv
    ));
    out.push(format!(
        "Recommendation ({:?}): {}, cost gap {:.1}% of the cheaper option.",
        result.recommendation,
        result.recommended_option,
        result.cost_gap.abs() * 100.0
    ));
    if result.saving_b > 0.0 && !switches_to_b(result.saving_b, config) {
        out.push(format!(
            "{} saves {:.1}% of {}'s cost, below the {:.0}% needed to switch.",
            b.name,
            result.saving_b * 100.0,
            a.name,
            config.switch_threshold * 100.0
        ));
    }
    if let Some(m) = result.break_even_month {
        out.push(format!("The higher-upfront option breaks even after {m} months."));
    }
    out
}

/// Hire an employee (A) or outsource the same workload (B).
pub fn hire_vs_outsource(monthly_salary: f64, outsource_markup: f64, horizon_months: usize) -> ArbitrationRequest {
    let recruitment = monthly_salary * RECRUITMENT_SALARY_MONTHS;
    let hire = OptionParams {
        upfront_cost: recruitment,
        monthly_cost: monthly_salary * (1.0 + EMPLOYER_CHARGE_RATE),
        hidden_costs: vec![HiddenCost {
            label: "turnover and re-recruitment".to_string(),
            amount: recruitment,
            frequency: CostFrequency::EveryMonths { months: 12 },
            probability: ANNUAL_TURNOVER_PROBABILITY,
        }],
        flexibility: 30.0,
        strategic_fit: 70.0,
        base_risk: 20.0,
        ..OptionParams::named("hire")
    };
    let fee = monthly_salary * (1.0 + outsource_markup.max(0.0));
    let outsource = OptionParams {
        monthly_cost: fee,
        hidden_costs: vec![HiddenCost::monthly("coordination overhead", fee * COORDINATION_OVERHEAD)],
        flexibility: 80.0,
        strategic_fit: 40.0,
        base_risk: 25.0,
        ..OptionParams::named("outsource")
    };
    ArbitrationRequest {
        decision_type: DecisionType::HireVsOutsource,
        horizon_months,
        option_a: hire,
        option_b: outsource,
    }
}

/// Buy an asset (A) or lease it (B). The bought asset is resold at
/// `residual_share` of its price at the end of the horizon.
pub fn buy_vs_lease(
    purchase_price: f64,
    monthly_maintenance: f64,
    residual_share: f64,
    monthly_lease: f64,
    horizon_months: usize,
) -> ArbitrationRequest {
    let buy = OptionParams {
        upfront_cost: purchase_price,
        monthly_cost: monthly_maintenance,
        hidden_costs: vec![HiddenCost {
            label: "major repair".to_string(),
            amount: purchase_price * 0.05,
            frequency: CostFrequency::EveryMonths { months: 12 },
            probability: 0.3,
        }],
        scheduled_flows: vec![ScheduledFlow {
            label: "resale".to_string(),
            month: horizon_months,
            amount: purchase_price * residual_share.clamp(0.0, 1.0),
        }],
        flexibility: 30.0,
        strategic_fit: 60.0,
        base_risk: 15.0,
        ..OptionParams::named("buy")
    };
    let lease = OptionParams {
        monthly_cost: monthly_lease,
        hidden_costs: vec![HiddenCost {
            label: "end-of-lease fees".to_string(),
            amount: monthly_lease,
            frequency: CostFrequency::Once { month: horizon_months },
            probability: 1.0,
        }],
        flexibility: 75.0,
        strategic_fit: 50.0,
        base_risk: 10.0,
        ..OptionParams::named("lease")
    };
    ArbitrationRequest {
        decision_type: DecisionType::BuyVsLease,
        horizon_months,
        option_a: buy,
        option_b: lease,
    }
}

/// Pay a supplier early for a discount (A) or at term (B).
pub fn early_payment_discount(invoice_amount: f64, discount_rate: f64, days_early: u32) -> ArbitrationRequest {
    let term_month = ((days_early as f64) / 30.0).ceil().max(1.0) as usize;
    let early = OptionParams {
        upfront_cost: invoice_amount * (1.0 - discount_rate.clamp(0.0, 1.0)),
        flexibility: 20.0,
        strategic_fit: 60.0,
        base_risk: 10.0,
        ..OptionParams::named("pay_early")
    };
    let at_term = OptionParams {
        scheduled_flows: vec![ScheduledFlow {
            label: "invoice at term".to_string(),
            month: term_month,
            amount: -invoice_amount,
        }],
        flexibility: 80.0,
        strategic_fit: 50.0,
        base_risk: 5.0,
        ..OptionParams::named("pay_at_term")
    };
    ArbitrationRequest {
        decision_type: DecisionType::EarlyPaymentDiscount,
        horizon_months: term_month,
        option_a: early,
        option_b: at_term,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_rate_compounds_to_annual() {
        let m = monthly_rate(0.08);
        assert!(((1.0 + m).powi(12) - 1.08).abs() < 1e-12);
    }

    #[test]
    fn gap_thresholds() {
        let c = ArbiterConfig::default();
        assert_eq!(recommendation_for(0.20, &c), Recommendation::StrongB);
        assert_eq!(recommendation_for(0.10, &c), Recommendation::SlightB);
        assert_eq!(recommendation_for(0.0, &c), Recommendation::Neutral);
        assert_eq!(recommendation_for(-0.10, &c), Recommendation::SlightA);
        assert_eq!(recommendation_for(-0.16, &c), Recommendation::StrongA);
    }

    #[test]
    fn once_cost_at_month_zero_counts_upfront() {
        let h = HiddenCost {
            label: "setup".into(),
            amount: 100.0,
            frequency: CostFrequency::Once { month: 0 },
            probability: 1.0,
        };
        assert_eq!(h.expected_at(0), 100.0);
        assert_eq!(h.expected_at(1), 0.0);
    }

    #[test]
    fn probability_clamped_in_every_month() {
        let over = |month| HiddenCost {
            label: "penalty".into(),
            amount: 100.0,
            frequency: CostFrequency::Once { month },
            probability: 1.5,
        };
        assert_eq!(over(0).expected_at(0), 100.0);
        assert_eq!(over(3).expected_at(3), 100.0);

        let negative = HiddenCost { probability: -0.5, ..over(0) };
        assert_eq!(negative.expected_at(0), 0.0);
    }

    #[test]
    fn switch_needs_more_than_threshold() {
        let c = ArbiterConfig::default();
        assert!(!switches_to_b(saving_share(100.0, 93.0), &c));
        assert!(!switches_to_b(saving_share(100.0, 90.0), &c));
        assert!(switches_to_b(saving_share(100.0, 88.0), &c));
        assert!(!switches_to_b(saving_share(100.0, 120.0), &c));
    }
}
