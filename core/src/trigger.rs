//! Trigger predicate: should the engine run an analysis cycle now?
//!
//! Conditions, evaluated in this order:
//!   1. newly critical overdue exposure above the materiality minimum
//!   2. one counterparty holding more than the concentration threshold
//!   3. average days overdue drifting up versus the prior cycle
//!   4. data present and no cycle has ever run
//!
//! The first condition that holds becomes the reason. When none holds the
//! decision still carries a reason explaining why nothing is done.

use crate::{
    config::TriggerConfig,
    governance::PriorBaseline,
    portfolio::PortfolioSnapshot,
    receivable::ReceivableRecord,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerCondition {
    CriticalOverdue,
    Concentration,
    AgingDrift,
    FirstCycle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerDecision {
    pub fired: bool,
    pub condition: Option<TriggerCondition>,
    pub reason: String,
    /// Every condition that held, in evaluation order.
    pub conditions: Vec<TriggerCondition>,
    pub data_hash: String,
}

impl TriggerDecision {
    pub fn skipped(reason: impl Into<String>, data_hash: impl Into<String>) -> Self {
        Self {
            fired: false,
            condition: None,
            reason: reason.into(),
            conditions: Vec::new(),
            data_hash: data_hash.into(),
        }
    }
}

pub struct TriggerInputs<'a> {
    pub records: &'a [ReceivableRecord],
    pub snapshot: &'a PortfolioSnapshot,
    pub data_hash: &'a str,
    pub prior: Option<&'a PriorBaseline>,
}

pub fn evaluate(inputs: &TriggerInputs<'_>, config: &TriggerConfig) -> TriggerDecision {
    let mut fired: Vec<(TriggerCondition, String)> = Vec::new();
    let mut quiet: Vec<String> = Vec::new();

    // 1. Newly critical overdue exposure.
    let newly_critical: Vec<&ReceivableRecord> = inputs
        .records
        .iter()
        .filter(|r| r.is_outstanding() && r.days_overdue > config.critical_age_days)
        .filter(|r| {
            inputs
                .prior
                .map_or(true, |p| !p.critical_invoices.contains(&r.invoice_id))
        })
        .collect();
    let critical_amount: f64 = newly_critical.iter().map(|r| r.outstanding()).sum();
    if critical_amount > config.min_material_amount {
        fired.push((
            TriggerCondition::CriticalOverdue,
            format!(
                "critical overdue: {critical_amount:.0} newly beyond {} days across {} invoice(s)",
                config.critical_age_days,
                newly_critical.len()
            ),
        ));
    } else {
        quiet.push(format!(
            "newly critical overdue {critical_amount:.0} within materiality {:.0}",
            config.min_material_amount
        ));
    }

    // 2. Concentration.
    match inputs.snapshot.top_concentration() {
        Some(top) if top.share > config.concentration_threshold => fired.push((
            TriggerCondition::Concentration,
            format!(
                "critical concentration: {} holds {:.1}% of outstanding (threshold {:.0}%)",
                top.counterparty_name,
                top.share * 100.0,
                config.concentration_threshold * 100.0
            ),
        )),
        Some(top) => quiet.push(format!(
            "top concentration {:.1}% within {:.0}%",
            top.share * 100.0,
            config.concentration_threshold * 100.0
        )),
        None => quiet.push("no outstanding exposure".to_string()),
    }

    // 3. Aging drift.
    if let Some(prior) = inputs.prior {
        let drift = inputs.snapshot.weighted_days_overdue - prior.weighted_days_overdue;
        if drift > config.dso_drift_days {
            fired.push((
                TriggerCondition::AgingDrift,
                format!(
                    "aging drift: average days overdue up {drift:.1} days since cycle {} (threshold {:.0})",
                    prior.cycle_id, config.dso_drift_days
                ),
            ));
        } else {
            quiet.push(format!(
                "aging drift {drift:+.1} days within {:.0}",
                config.dso_drift_days
            ));
        }
    }

    // 4. First cycle on this data.
    match inputs.prior {
        None => fired.push((
            TriggerCondition::FirstCycle,
            format!("first cycle: data loaded (hash {})", short_hash(inputs.data_hash)),
        )),
        Some(prior) if prior.data_hash == inputs.data_hash => {
            quiet.push(format!("data unchanged since cycle {}", prior.cycle_id))
        }
        Some(prior) => quiet.push(format!(
            "data changed since cycle {} but no threshold crossed",
            prior.cycle_id
        )),
    }

    match fired.first() {
        Some((condition, reason)) => TriggerDecision {
            fired: true,
            condition: Some(*condition),
            reason: reason.clone(),
            conditions: fired.iter().map(|(c, _)| *c).collect(),
            data_hash: inputs.data_hash.to_string(),
        },
        None => TriggerDecision::skipped(
            format!("no trigger: {}", quiet.join("; ")),
            inputs.data_hash,
        ),
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
