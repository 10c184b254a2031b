//! Corrective actions: catalogue, candidate generation and validation state.
//!
//! RULE: No action is ever executed by the engine. An action is a
//! proposal; its validation status is set exactly once by a human
//! decision and never changes afterwards.

use crate::{
    client_scoring::Rating,
    error::{EngineError, EngineResult},
    portfolio::CashPosition,
    requalification::{CounterpartyAssessment, Risk, RiskStatus},
    types::{ActionId, Amount, CounterpartyId, CycleId},
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pseudo-counterparty for portfolio-wide actions.
pub const PORTFOLIO: &str = "portfolio";

/// Portfolio share above which a credit-limit review is proposed.
pub const CREDIT_REVIEW_SHARE: f64 = 0.25;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PilotageAction {
    DrawCreditLine,
    DeferSupplierPayments,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ForecastAction {
    ReforecastInflows,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceAction {
    ReviewCreditLimit,
    EscalateToManagement,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RiskAction {
    CollectionCall,
    FormalNotice,
    PaymentPlan,
    SuspendDeliveries,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccountingAction {
    BookProvision,
    FactorReceivable,
}

/// Every kind of intervention the engine can propose, tagged by category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(tag = "category", content = "action", rename_all = "snake_case")]
pub enum ActionKind {
    Pilotage(PilotageAction),
    Forecast(ForecastAction),
    Governance(GovernanceAction),
    Risk(RiskAction),
    Accounting(AccountingAction),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// Static characteristics of an action kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionProfile {
    pub label: &'static str,
    /// Base success rate in points, 0..100, before rating adjustment.
    pub base_success_rate: f64,
    pub effort_hours: f64,
    pub complexity: Complexity,
    pub deadline_days: i64,
}

/// The single dispatch point over the action catalogue.
pub fn profile(kind: ActionKind) -> ActionProfile {
    use Complexity::*;
    let (label, base_success_rate, effort_hours, complexity, deadline_days) = match kind {
        ActionKind::Pilotage(PilotageAction::DrawCreditLine) => ("Draw on credit line", 75.0, 10.0, Medium, 5),
        ActionKind::Pilotage(PilotageAction::DeferSupplierPayments) => ("Negotiate supplier payment deferral", 60.0, 6.0, Medium, 7),
        ActionKind::Forecast(ForecastAction::ReforecastInflows) => ("Reforecast expected inflows", 90.0, 8.0, Low, 21),
        ActionKind::Governance(GovernanceAction::ReviewCreditLimit) => ("Review counterparty credit limit", 80.0, 6.0, Medium, 14),
        ActionKind::Governance(GovernanceAction::EscalateToManagement) => ("Escalate to management", 85.0, 2.0, Low, 7),
        ActionKind::Risk(RiskAction::CollectionCall) => ("Collection call", 55.0, 2.0, Low, 5),
        ActionKind::Risk(RiskAction::FormalNotice) => ("Send formal payment notice", 60.0, 4.0, Medium, 3),
        ActionKind::Risk(RiskAction::PaymentPlan) => ("Negotiate payment plan", 65.0, 8.0, Medium, 14),
        ActionKind::Risk(RiskAction::SuspendDeliveries) => ("Suspend deliveries pending payment", 50.0, 3.0, High, 2),
        ActionKind::Accounting(AccountingAction::BookProvision) => ("Book doubtful-debt provision", 95.0, 6.0, Low, 10),
        ActionKind::Accounting(AccountingAction::FactorReceivable) => ("Factor the receivable", 70.0, 16.0, High, 10),
    };
    ActionProfile { label, base_success_rate, effort_hours, complexity, deadline_days }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum PriorityTier {
    P1,
    P2,
    P3,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    Approved,
    Rejected,
}

/// A candidate intervention before scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionCandidate {
    pub kind: ActionKind,
    pub counterparty_id: CounterpartyId,
    pub counterparty_name: String,
    pub risk_ids: Vec<String>,
    pub impact_amount: Amount,
    pub rating: Option<Rating>,
    /// Counterparty reliability 0..100, used as responsiveness.
    pub responsiveness: f64,
    pub deadline: NaiveDate,
}

/// A proposed, scored action awaiting human validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    pub action_id: ActionId,
    pub cycle_id: CycleId,
    pub kind: ActionKind,
    pub title: String,
    pub tier: PriorityTier,
    pub counterparty_id: CounterpartyId,
    pub counterparty_name: String,
    pub risk_ids: Vec<String>,
    pub impact_amount: Amount,
    pub deadline: NaiveDate,
    pub priority_score: f64,
    pub impact_score: f64,
    pub ease_score: f64,
    pub urgency_score: f64,
    pub success_probability: f64,
    pub validation: ValidationStatus,
}

impl Action {
    /// Set the validation status. Allowed exactly once, from Pending.
    pub fn resolve(&mut self, status: ValidationStatus) -> EngineResult<()> {
        if status == ValidationStatus::Pending {
            return Err(EngineError::GovernanceInvariantViolation {
                action_id: self.action_id.clone(),
                reason: "cannot resolve an action back to pending".into(),
            });
        }
        if self.validation != ValidationStatus::Pending {
            return Err(EngineError::GovernanceInvariantViolation {
                action_id: self.action_id.clone(),
                reason: format!("already resolved as {:?}", self.validation),
            });
        }
        self.validation = status;
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.validation == ValidationStatus::Pending
    }
}

/// Generate candidate interventions from the cycle's risks.
/// One candidate per (counterparty, kind); risks are grouped per counterparty.
pub fn propose_candidates(
    risks: &[Risk],
    assessments: &BTreeMap<CounterpartyId, CounterpartyAssessment>,
    cash: Option<&CashPosition>,
    runway_critical_days: f64,
    as_of: NaiveDate,
) -> Vec<ActionCandidate> {
    let mut by_counterparty: BTreeMap<&str, Vec<&Risk>> = BTreeMap::new();
    for risk in risks {
        by_counterparty.entry(risk.counterparty_id.as_str()).or_default().push(risk);
    }

    let mut kinds: BTreeMap<(String, ActionKind), ActionCandidate> = BTreeMap::new();
    let mut push = |kind: ActionKind, group: &[&Risk], rating: Option<Rating>, responsiveness: f64, name: &str, cp: &str| {
        let impact: Amount = group.iter().map(|r| r.exposed_amount).sum();
        kinds.entry((cp.to_string(), kind)).or_insert_with(|| ActionCandidate {
            kind,
            counterparty_id: cp.to_string(),
            counterparty_name: name.to_string(),
            risk_ids: group.iter().map(|r| r.risk_id.clone()).collect(),
            impact_amount: impact,
            rating,
            responsiveness,
            deadline: as_of + Duration::days(profile(kind).deadline_days),
        });
    };

    for (cp, group) in &by_counterparty {
        let worst = group.iter().map(|r| r.status).max().unwrap_or(RiskStatus::Certain);
        let max_days = group.iter().map(|r| r.days_overdue).max().unwrap_or(0);
        let max_loss = group.iter().map(|r| r.loss_probability).fold(0.0, f64::max);
        let share = group.iter().map(|r| r.portfolio_share).fold(0.0, f64::max);
        let rating = group.first().map(|r| r.counterparty_rating);
        let name = group.first().map(|r| r.counterparty_name.as_str()).unwrap_or(*cp);
        let responsiveness = assessments
            .get(*cp)
            .map(|a| a.pattern.reliability_score)
            .unwrap_or(50.0);
        let concentrated = share > CREDIT_REVIEW_SHARE;

        match worst {
            RiskStatus::Critical => {
                if max_days > 0 {
                    push(ActionKind::Risk(RiskAction::FormalNotice), group, rating, responsiveness, name, cp);
                } else {
                    push(ActionKind::Risk(RiskAction::CollectionCall), group, rating, responsiveness, name, cp);
                }
                if max_loss >= 0.9 {
                    push(ActionKind::Accounting(AccountingAction::BookProvision), group, rating, responsiveness, name, cp);
                }
                if rating == Some(Rating::D) {
                    push(ActionKind::Risk(RiskAction::SuspendDeliveries), group, rating, responsiveness, name, cp);
                }
            }
            RiskStatus::Uncertain => {
                push(ActionKind::Risk(RiskAction::CollectionCall), group, rating, responsiveness, name, cp);
                if max_days > 30 {
                    push(ActionKind::Risk(RiskAction::PaymentPlan), group, rating, responsiveness, name, cp);
                }
            }
            RiskStatus::Certain => {
                push(ActionKind::Forecast(ForecastAction::ReforecastInflows), group, rating, responsiveness, name, cp);
            }
        }
        if concentrated {
            push(ActionKind::Governance(GovernanceAction::ReviewCreditLimit), group, rating, responsiveness, name, cp);
        }
    }

    let runway_critical = cash
        .and_then(|c| c.runway_days())
        .is_some_and(|days| days < runway_critical_days);
    if runway_critical {
        let critical: Vec<&Risk> = risks.iter().filter(|r| r.status == RiskStatus::Critical).collect();
        let group: Vec<&Risk> = if critical.is_empty() { risks.iter().collect() } else { critical };
        if !group.is_empty() {
            push(ActionKind::Pilotage(PilotageAction::DrawCreditLine), &group, None, 70.0, "Portfolio", PORTFOLIO);
            push(ActionKind::Pilotage(PilotageAction::DeferSupplierPayments), &group, None, 60.0, "Portfolio", PORTFOLIO);
            if group.len() > 1 {
                push(ActionKind::Governance(GovernanceAction::EscalateToManagement), &group, None, 70.0, "Portfolio", PORTFOLIO);
            }
        }
        // Receivables still expected to pay can be turned into cash now.
        let factorable = risks
            .iter()
            .filter(|r| r.status != RiskStatus::Critical)
            .max_by(|a, b| a.exposed_amount.total_cmp(&b.exposed_amount));
        if let Some(risk) = factorable {
            let responsiveness = assessments
                .get(&risk.counterparty_id)
                .map(|a| a.pattern.reliability_score)
                .unwrap_or(50.0);
            push(
                ActionKind::Accounting(AccountingAction::FactorReceivable),
                &[risk],
                Some(risk.counterparty_rating),
                responsiveness,
                &risk.counterparty_name,
                &risk.counterparty_id,
            );
        }
    }

    kinds.into_values().collect()
}
