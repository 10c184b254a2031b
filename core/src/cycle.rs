//! One analysis cycle, start to finish, as a pure computation.
//!
//! Inputs are the raw rows, an as-of date, the optional cash position
//! and the previous cycle's baseline. The output is the cycle's
//! AnalysisResult; nothing here touches the ledger or the machine state.
//!
//! Pipeline:
//!   normalise → portfolio snapshot → pattern/score/warnings per
//!   counterparty → requalify → propose → prioritize (max 3) →
//!   aging drift vs prior → findings and narrative

use crate::{
    action::{self, Action},
    analytics::causal::{self, AgingDecomposition},
    client_scoring::RiskScore,
    config::EngineConfig,
    error::{EngineError, EngineResult},
    governance::{AnalysisSummary, PriorBaseline, RiskCounts},
    narrative,
    portfolio::{self, CashPosition, PortfolioSnapshot},
    prioritizer::{self, PriorityContext},
    receivable::{self, DataQualityIssue, RawReceivable},
    requalification::{self, Risk},
    stats,
    types::CycleId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioMetrics {
    pub total_outstanding: f64,
    pub overdue_amount: f64,
    pub overdue_ratio: f64,
    pub weighted_days_overdue: f64,
    pub counterparties: usize,
    pub top_counterparty: Option<String>,
    pub top_concentration: f64,
    pub runway_days: Option<f64>,
    pub risk_counts: RiskCounts,
    pub warning_count: usize,
    pub excluded_records: usize,
}

/// Everything a cycle produced. Returned to the caller by value; the
/// machine keeps its own copy of the actions for validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub cycle_id: CycleId,
    pub as_of: NaiveDate,
    pub trigger_reason: String,
    pub data_hash: String,
    pub risks: Vec<Risk>,
    pub actions: Vec<Action>,
    pub scores: Vec<RiskScore>,
    pub metrics: PortfolioMetrics,
    pub aging_drift: Option<AgingDecomposition>,
    pub issues: Vec<DataQualityIssue>,
    pub findings: Vec<String>,
    pub narrative_summary_text: String,
}

impl AnalysisResult {
    pub fn summary(&self, snapshot: &PortfolioSnapshot, critical_invoices: Vec<String>) -> AnalysisSummary {
        AnalysisSummary {
            as_of: Some(self.as_of),
            total_outstanding: snapshot.total_outstanding,
            overdue_amount: snapshot.overdue_amount,
            weighted_days_overdue: snapshot.weighted_days_overdue,
            critical_invoices,
            aging: causal::aging_profile(snapshot),
            risk_counts: self.metrics.risk_counts,
            excluded_records: self.metrics.excluded_records,
            findings: self.findings.clone(),
            narrative: self.narrative_summary_text.clone(),
        }
    }
}

pub struct CycleInputs<'a> {
    pub cycle_id: &'a str,
    pub as_of: NaiveDate,
    pub trigger_reason: &'a str,
    pub raws: &'a [RawReceivable],
    pub data_hash: &'a str,
    pub cash: Option<&'a CashPosition>,
    pub prior: Option<&'a PriorBaseline>,
    pub config: &'a EngineConfig,
}

/// Output of a cycle plus what the ledger needs to record it.
pub struct CycleOutput {
    pub result: AnalysisResult,
    pub summary: AnalysisSummary,
}

pub fn run(inputs: &CycleInputs<'_>) -> EngineResult<CycleOutput> {
    let config = inputs.config;
    let cycle_id = inputs.cycle_id;

    let batch = receivable::normalize(inputs.raws, inputs.as_of);
    if batch.records.is_empty() {
        return Err(EngineError::AnalysisFailure {
            cycle_id: cycle_id.to_string(),
            reason: format!(
                "no valid receivable records ({} excluded)",
                batch.excluded_count()
            ),
        });
    }
    log::debug!(
        "cycle={cycle_id} normalised {} records, {} issues",
        batch.records.len(),
        batch.issues.len()
    );

    let snapshot = PortfolioSnapshot::from_records(&batch.records);
    let assessments = requalification::assess_counterparties(
        &batch.records,
        &snapshot,
        inputs.as_of,
        &config.warnings,
    );
    let risks = requalification::requalify(
        &batch.records,
        &snapshot,
        &assessments,
        &config.requalification,
    );
    log::debug!("cycle={cycle_id} requalified {} risks", risks.len());

    let candidates = action::propose_candidates(
        &risks,
        &assessments,
        inputs.cash,
        config.prioritizer.runway_critical_days,
        inputs.as_of,
    );
    let runway_days = inputs.cash.and_then(CashPosition::runway_days);
    let ctx = PriorityContext {
        as_of: inputs.as_of,
        runway_days,
    };
    let actions = prioritizer::prioritize(&candidates, &cycle_id.to_string(), &ctx, &config.prioritizer);
    log::debug!(
        "cycle={cycle_id} {} candidates, {} actions kept",
        candidates.len(),
        actions.len()
    );

    let aging_drift = inputs
        .prior
        .map(|p| causal::decompose(&p.aging, &causal::aging_profile(&snapshot)));

    let top = snapshot.top_concentration();
    let metrics = PortfolioMetrics {
        total_outstanding: snapshot.total_outstanding,
        overdue_amount: snapshot.overdue_amount,
        overdue_ratio: stats::safe_ratio(snapshot.overdue_amount, snapshot.total_outstanding),
        weighted_days_overdue: snapshot.weighted_days_overdue,
        counterparties: snapshot.exposures.len(),
        top_counterparty: top.map(|e| e.counterparty_name.clone()),
        top_concentration: top.map(|e| e.share).unwrap_or(0.0),
        runway_days,
        risk_counts: RiskCounts::from_risks(&risks),
        warning_count: assessments.values().map(|a| a.warnings.len()).sum(),
        excluded_records: batch.excluded_count(),
    };

    let scores: Vec<RiskScore> = assessments.values().map(|a| a.score.clone()).collect();
    let warnings: Vec<_> = assessments.values().flat_map(|a| a.warnings.iter()).collect();
    let findings = narrative::analysis_findings(&metrics, &risks, &actions, &warnings, aging_drift.as_ref(), &batch.issues);
    let narrative_summary_text = narrative::analysis_summary(cycle_id, inputs.trigger_reason, &metrics, &actions);

    let result = AnalysisResult {
        cycle_id: cycle_id.to_string(),
        as_of: inputs.as_of,
        trigger_reason: inputs.trigger_reason.to_string(),
        data_hash: inputs.data_hash.to_string(),
        risks,
        actions,
        scores,
        metrics,
        aging_drift,
        issues: batch.issues,
        findings,
        narrative_summary_text,
    };
    let critical = portfolio::critical_invoices(&batch.records, config.trigger.critical_age_days)
        .into_iter()
        .collect();
    let summary = result.summary(&snapshot, critical);
    Ok(CycleOutput { result, summary })
}
