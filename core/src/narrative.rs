//! Plain-language findings for the downstream text layer.
//!
//! Every sentence here is rendered from figures already computed by the
//! engine. Nothing in this module produces a number of its own.

use crate::{
    action::Action,
    analytics::causal::AgingDecomposition,
    arbiter::{ArbitrationResult, Recommendation},
    cycle::PortfolioMetrics,
    early_warning::EarlyWarning,
    governance::GovernanceMetrics,
    receivable::{DataQuality, DataQualityIssue},
    requalification::{Risk, RiskStatus},
    stress::StressResult,
};

const MAX_LISTED_RISKS: usize = 5;
const MAX_LISTED_WARNINGS: usize = 5;

pub fn analysis_findings(
    metrics: &PortfolioMetrics,
    risks: &[Risk],
    actions: &[Action],
    warnings: &[&EarlyWarning],
    drift: Option<&AgingDecomposition>,
    issues: &[DataQualityIssue],
) -> Vec<String> {
    let mut out = vec![format!(
        "{:.0} outstanding across {} counterparties, {:.0} overdue ({:.1}%), average {:.1} days overdue.",
        metrics.total_outstanding,
        metrics.counterparties,
        metrics.overdue_amount,
        metrics.overdue_ratio * 100.0,
        metrics.weighted_days_overdue
    )];
    if let Some(top) = &metrics.top_counterparty {
        out.push(format!(
            "Largest exposure: {top} with {:.1}% of outstanding.",
            metrics.top_concentration * 100.0
        ));
    }
    let c = metrics.risk_counts;
    out.push(format!(
        "{} receivables requalified: {} critical, {} uncertain, {} certain.",
        risks.len(),
        c.critical,
        c.uncertain,
        c.certain
    ));
    for risk in risks
        .iter()
        .filter(|r| r.status == RiskStatus::Critical)
        .take(MAX_LISTED_RISKS)
    {
        out.push(format!(
            "CRITICAL {} ({}): {:.0} exposed, loss probability {:.0}%. {}",
            risk.invoice_id,
            risk.counterparty_name,
            risk.exposed_amount,
            risk.loss_probability * 100.0,
            risk.justification
        ));
    }
    for w in warnings.iter().take(MAX_LISTED_WARNINGS) {
        out.push(format!("Early warning ({:?}): {}", w.severity, w.message));
    }
    if let Some(d) = drift {
        out.extend(d.findings.iter().cloned());
    }
    for action in actions {
        out.push(format!(
            "{:?} proposed: {} (impact {:.0}, due {}), awaiting validation.",
            action.tier, action.title, action.impact_amount, action.deadline
        ));
    }
    let excluded = issues.iter().filter(|i| i.flag == DataQuality::Red).count();
    if excluded > 0 {
        out.push(format!(
            "{excluded} record(s) excluded for data quality; figures above ignore them."
        ));
    }
    if let Some(runway) = metrics.runway_days {
        out.push(format!("Cash runway at current burn: {runway:.0} days."));
    }
    out
}

pub fn analysis_summary(
    cycle_id: &str,
    trigger_reason: &str,
    metrics: &PortfolioMetrics,
    actions: &[Action],
) -> String {
    let c = metrics.risk_counts;
    let mut text = format!(
        "Cycle {cycle_id} ran because of {trigger_reason}. Of {:.0} outstanding, {:.0} is overdue. \
         {} critical and {} uncertain receivables were identified.",
        metrics.total_outstanding, metrics.overdue_amount, c.critical, c.uncertain
    );
    if actions.is_empty() {
        text.push_str(" No corrective action is proposed.");
    } else {
        let titles: Vec<&str> = actions.iter().map(|a| a.title.as_str()).collect();
        text.push_str(&format!(
            " {} action(s) await human validation: {}.",
            actions.len(),
            titles.join("; ")
        ));
    }
    text
}

pub fn stress_summary(result: &StressResult) -> String {
    let mc = &result.monte_carlo;
    let mut text = format!(
        "Over {} periods, cash turns negative in {:.1}% of {} simulations. Median ending cash is {:.0}; \
         the {:.0}% value at risk is {:.0}.",
        mc.horizon,
        mc.prob_negative * 100.0,
        mc.simulations,
        mc.distribution.median,
        mc.confidence * 100.0,
        mc.value_at_risk
    );
    if let Some(worst) = result.scenarios.iter().find(|s| s.is_worst_case) {
        text.push_str(&format!(
            " The most damaging scenario is {} with {:.1}% survival.",
            worst.scenario.name,
            worst.survival_probability * 100.0
        ));
    }
    text
}

pub fn arbitration_summary(result: &ArbitrationResult) -> String {
    if result.recommendation == Recommendation::Neutral {
        return format!(
            "Neither {} nor {} is clearly cheaper over {} months; {} is kept.",
            result.option_a.name, result.option_b.name, result.horizon_months, result.recommended_option
        );
    }
    format!(
        "{} is recommended ({:?}) over {} months; the cost gap is {:.1}% of the cheaper option.",
        result.recommended_option,
        result.recommendation,
        result.horizon_months,
        result.cost_gap.abs() * 100.0
    )
}

pub fn governance_summary(metrics: &GovernanceMetrics) -> String {
    format!(
        "{} decisions recorded, {:.0}% approved. {} outcomes recorded, {:.0}% confirmed the risk, \
         {:.0}% were false positives. {} approved action(s) still await an outcome.",
        metrics.total_decisions,
        metrics.approval_rate,
        metrics.total_outcomes,
        metrics.accuracy_rate,
        metrics.false_positive_rate,
        metrics.pending_outcome_count
    )
}
