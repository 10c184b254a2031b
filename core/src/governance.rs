//! Governance ledger.
//!
//! Append-only record of every analysis, every human decision on an
//! action, and every real-world outcome recorded afterwards. Calibration
//! metrics are projections recomputed from these records on each call;
//! nothing derived is stored.

use crate::{
    action::Action,
    analytics::causal::AgingProfile,
    error::{EngineError, EngineResult},
    requalification::{Risk, RiskStatus},
    stats,
    store::{AnalysisRow, LedgerStore},
    types::{ActionId, CycleId, InvoiceId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approved,
    Rejected,
    /// Recorded but leaves the action pending.
    Deferred,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Approved => "approved",
            DecisionKind::Rejected => "rejected",
            DecisionKind::Deferred => "deferred",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(DecisionKind::Approved),
            "rejected" => Some(DecisionKind::Rejected),
            "deferred" => Some(DecisionKind::Deferred),
            _ => None,
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, DecisionKind::Deferred)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The flagged risk materialised as predicted.
    Confirmed,
    /// The risk did not materialise.
    FalsePositive,
    Inconclusive,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Confirmed => "confirmed",
            OutcomeKind::FalsePositive => "false_positive",
            OutcomeKind::Inconclusive => "inconclusive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(OutcomeKind::Confirmed),
            "false_positive" => Some(OutcomeKind::FalsePositive),
            "inconclusive" => Some(OutcomeKind::Inconclusive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskCounts {
    pub critical: usize,
    pub uncertain: usize,
    pub certain: usize,
}

impl RiskCounts {
    pub fn from_risks(risks: &[Risk]) -> Self {
        let mut counts = Self::default();
        for r in risks {
            match r.status {
                RiskStatus::Critical => counts.critical += 1,
                RiskStatus::Uncertain => counts.uncertain += 1,
                RiskStatus::Certain => counts.certain += 1,
            }
        }
        counts
    }
}

/// Portfolio state at the end of a cycle. The next cycle's trigger and
/// drift decomposition read it back as their baseline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSummary {
    pub as_of: Option<NaiveDate>,
    pub total_outstanding: f64,
    pub overdue_amount: f64,
    pub weighted_days_overdue: f64,
    pub critical_invoices: Vec<InvoiceId>,
    pub aging: AgingProfile,
    pub risk_counts: RiskCounts,
    pub excluded_records: usize,
    pub findings: Vec<String>,
    pub narrative: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisEntry {
    pub id: i64,
    pub cycle_id: CycleId,
    pub trigger_reason: String,
    pub data_hash: String,
    pub risks: Vec<Risk>,
    pub actions: Vec<Action>,
    pub summary: AnalysisSummary,
    pub recorded_at: String,
}

impl TryFrom<AnalysisRow> for AnalysisEntry {
    type Error = EngineError;

    fn try_from(row: AnalysisRow) -> EngineResult<Self> {
        Ok(Self {
            id: row.id,
            cycle_id: row.cycle_id,
            trigger_reason: row.trigger_reason,
            data_hash: row.data_hash,
            risks: serde_json::from_str(&row.risks_json)?,
            actions: serde_json::from_str(&row.actions_json)?,
            summary: serde_json::from_str(&row.summary_json)?,
            recorded_at: row.recorded_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionEntry {
    pub id: i64,
    pub action_id: ActionId,
    pub cycle_id: CycleId,
    pub decision: DecisionKind,
    pub actor: String,
    pub comment: Option<String>,
    pub recorded_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeEntry {
    pub id: i64,
    pub action_id: ActionId,
    pub outcome: OutcomeKind,
    pub recovered_amount: Option<f64>,
    pub notes: Option<String>,
    pub recorded_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: i64,
    pub event_type: String,
    pub cycle_id: Option<CycleId>,
    pub action_id: Option<ActionId>,
    pub payload: String,
    pub recorded_at: String,
}

/// Calibration metrics, percentages in [0, 100]. All zero on an empty ledger.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct GovernanceMetrics {
    pub total_decisions: i64,
    pub approved: i64,
    pub rejected: i64,
    pub deferred: i64,
    pub approval_rate: f64,
    pub total_outcomes: i64,
    pub accuracy_rate: f64,
    pub false_positive_rate: f64,
    pub pending_outcome_count: i64,
    pub analyses_recorded: i64,
}

/// What the previous cycle left behind for the next trigger evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorBaseline {
    pub cycle_id: CycleId,
    pub data_hash: String,
    pub weighted_days_overdue: f64,
    pub critical_invoices: BTreeSet<InvoiceId>,
    pub aging: AgingProfile,
}

impl From<&AnalysisEntry> for PriorBaseline {
    fn from(entry: &AnalysisEntry) -> Self {
        Self {
            cycle_id: entry.cycle_id.clone(),
            data_hash: entry.data_hash.clone(),
            weighted_days_overdue: entry.summary.weighted_days_overdue,
            critical_invoices: entry.summary.critical_invoices.iter().cloned().collect(),
            aging: entry.summary.aging.clone(),
        }
    }
}

fn percent(num: i64, den: i64) -> f64 {
    (stats::safe_ratio(num as f64, den as f64) * 100.0).clamp(0.0, 100.0)
}

/// The only component that persists state across cycles.
pub struct GovernanceLedger {
    store: LedgerStore,
}

impl GovernanceLedger {
    pub fn new(store: LedgerStore) -> EngineResult<Self> {
        store.migrate()?;
        Ok(Self { store })
    }

    pub fn open(path: &str) -> EngineResult<Self> {
        Self::new(LedgerStore::open(path)?)
    }

    pub fn in_memory() -> EngineResult<Self> {
        Self::new(LedgerStore::in_memory()?)
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn record_analysis(
        &self,
        cycle_id: &str,
        trigger_reason: &str,
        data_hash: &str,
        risks: &[Risk],
        actions: &[Action],
        summary: &AnalysisSummary,
    ) -> EngineResult<i64> {
        let id = self.store.insert_analysis(
            cycle_id,
            trigger_reason,
            data_hash,
            &serde_json::to_string(risks)?,
            &serde_json::to_string(actions)?,
            &serde_json::to_string(summary)?,
        )?;
        log::info!(
            "cycle={cycle_id} ledger: analysis #{id} recorded ({} risks, {} actions)",
            risks.len(),
            actions.len()
        );
        Ok(id)
    }

    /// Append a human decision. The action must belong to the recorded
    /// analysis of `cycle_id`. It takes at most one approve or reject;
    /// deferrals may precede it any number of times.
    pub fn record_decision(
        &self,
        action_id: &str,
        cycle_id: &str,
        decision: DecisionKind,
        actor: &str,
        comment: Option<&str>,
    ) -> EngineResult<i64> {
        let proposed = self
            .analysis(cycle_id)?
            .is_some_and(|entry| entry.actions.iter().any(|a| a.action_id == action_id));
        if !proposed {
            return Err(EngineError::GovernanceInvariantViolation {
                action_id: action_id.to_string(),
                reason: format!("not an action of recorded cycle {cycle_id}"),
            });
        }
        if let Some(existing) = self.store.final_decision_for(action_id)? {
            return Err(EngineError::GovernanceInvariantViolation {
                action_id: action_id.to_string(),
                reason: format!("already {}", existing.as_str()),
            });
        }
        let id = self
            .store
            .insert_decision(action_id, cycle_id, decision, actor, comment)?;
        log::info!(
            "cycle={cycle_id} ledger: action {action_id} {} by {actor}",
            decision.as_str()
        );
        Ok(id)
    }

    /// Append a real-world outcome. The action must carry a final decision.
    /// Several outcomes per action are allowed; none replaces another.
    pub fn record_outcome(
        &self,
        action_id: &str,
        outcome: OutcomeKind,
        recovered_amount: Option<f64>,
        notes: Option<&str>,
    ) -> EngineResult<i64> {
        if self.store.final_decision_for(action_id)?.is_none() {
            return Err(EngineError::GovernanceInvariantViolation {
                action_id: action_id.to_string(),
                reason: "no approve or reject decision recorded".to_string(),
            });
        }
        let id = self
            .store
            .insert_outcome(action_id, outcome, recovered_amount, notes)?;
        self.audit(
            "outcome_recorded",
            None,
            Some(action_id),
            &serde_json::json!({ "outcome": outcome, "recovered_amount": recovered_amount }),
        )?;
        log::info!("ledger: outcome {} recorded for {action_id}", outcome.as_str());
        Ok(id)
    }

    pub fn audit<T: Serialize>(
        &self,
        event_type: &str,
        cycle_id: Option<&str>,
        action_id: Option<&str>,
        payload: &T,
    ) -> EngineResult<i64> {
        self.store
            .append_audit(event_type, cycle_id, action_id, &serde_json::to_string(payload)?)
    }

    pub fn latest_analysis(&self) -> EngineResult<Option<AnalysisEntry>> {
        self.store
            .latest_analysis()?
            .map(AnalysisEntry::try_from)
            .transpose()
    }

    pub fn analysis(&self, cycle_id: &str) -> EngineResult<Option<AnalysisEntry>> {
        self.store
            .analysis_by_cycle(cycle_id)?
            .map(AnalysisEntry::try_from)
            .transpose()
    }

    pub fn prior_baseline(&self) -> EngineResult<Option<PriorBaseline>> {
        Ok(self.latest_analysis()?.as_ref().map(PriorBaseline::from))
    }

    pub fn decisions_for(&self, action_id: &str) -> EngineResult<Vec<DecisionEntry>> {
        self.store.decisions_for(action_id)
    }

    pub fn outcomes_for(&self, action_id: &str) -> EngineResult<Vec<OutcomeEntry>> {
        self.store.outcomes_for(action_id)
    }

    pub fn audit_trail(&self, limit: usize) -> EngineResult<Vec<AuditEntry>> {
        self.store.audit_trail(limit)
    }

    pub fn metrics(&self) -> EngineResult<GovernanceMetrics> {
        let d = self.store.decision_counts()?;
        let o = self.store.outcome_counts()?;
        Ok(GovernanceMetrics {
            total_decisions: d.total,
            approved: d.approved,
            rejected: d.rejected,
            deferred: d.deferred,
            approval_rate: percent(d.approved, d.total),
            total_outcomes: o.total,
            accuracy_rate: percent(o.confirmed, o.total),
            false_positive_rate: percent(o.false_positive, o.total),
            pending_outcome_count: self.store.pending_outcome_count()?,
            analyses_recorded: self.store.analysis_count()?,
        })
    }
}
