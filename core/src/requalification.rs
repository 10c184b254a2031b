//! Risk requalification: receivables into the CERTAIN / UNCERTAIN / CRITICAL
//! taxonomy.
//!
//! Status rules (first match wins):
//!   CRITICAL   days overdue > critical threshold, OR counterparty share
//!              > critical concentration, OR a high-severity warning fired,
//!              OR the counterparty is rated D.
//!   UNCERTAIN  days overdue in the secondary band, OR share in the
//!              secondary band, OR rating C with any warning present.
//!   CERTAIN    otherwise.
//!
//! Receivables below the materiality minimum are skipped unless they are
//! critically aged: age alone sets the CRITICAL floor regardless of amount.

use crate::{
    client_scoring::{self, Rating, RiskScore},
    config::{RequalificationConfig, WarningConfig},
    early_warning::{self, EarlyWarning, WarningContext},
    payment_pattern::{self, PaymentPattern},
    portfolio::PortfolioSnapshot,
    receivable::{DataQuality, ReceivableRecord},
    types::{Amount, CounterpartyId, InvoiceId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskStatus {
    Certain,
    Uncertain,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RiskType {
    Overdue,
    Concentration,
    ScenarioDeviation,
}

/// One requalified receivable. Immutable once created; the next cycle
/// supersedes it with a fresh set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Risk {
    pub risk_id: String,
    pub invoice_id: InvoiceId,
    pub counterparty_id: CounterpartyId,
    pub counterparty_name: String,
    pub risk_type: RiskType,
    pub exposed_amount: Amount,
    pub days_overdue: i64,
    pub loss_probability: f64,
    pub status: RiskStatus,
    pub priority_score: f64,
    pub justification: String,
    pub data_quality: DataQuality,
    pub counterparty_rating: Rating,
    pub counterparty_score: f64,
    pub portfolio_share: f64,
}

/// Pattern, score and warnings for one counterparty in one cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CounterpartyAssessment {
    pub pattern: PaymentPattern,
    pub score: RiskScore,
    pub warnings: Vec<EarlyWarning>,
}

impl CounterpartyAssessment {
    pub fn has_high_warning(&self) -> bool {
        self.warnings.iter().any(|w| w.severity.is_high())
    }
}

pub fn assess_counterparties(
    records: &[ReceivableRecord],
    snapshot: &PortfolioSnapshot,
    as_of: NaiveDate,
    warning_config: &WarningConfig,
) -> BTreeMap<CounterpartyId, CounterpartyAssessment> {
    payment_pattern::analyze_all(records)
        .into_iter()
        .map(|(id, pattern)| {
            let share = snapshot.share_of(&id);
            let score = client_scoring::score(&pattern, share);
            let ctx = WarningContext {
                counterparty_id: &id,
                records,
                pattern: &pattern,
                portfolio_share: share,
                as_of,
                config: warning_config,
            };
            let warnings = early_warning::detect_all(&ctx);
            (id, CounterpartyAssessment { pattern, score, warnings })
        })
        .collect()
}

/// Requalify every material outstanding receivable. Sorted by priority
/// score descending, invoice id ascending on ties.
pub fn requalify(
    records: &[ReceivableRecord],
    snapshot: &PortfolioSnapshot,
    assessments: &BTreeMap<CounterpartyId, CounterpartyAssessment>,
    config: &RequalificationConfig,
) -> Vec<Risk> {
    let mut risks: Vec<Risk> = records
        .iter()
        .filter(|r| r.is_outstanding())
        .filter_map(|r| {
            let assessment = assessments.get(&r.counterparty_id)?;
            requalify_one(r, snapshot, assessment, config)
        })
        .collect();
    risks.sort_by(|a, b| {
        b.priority_score
            .total_cmp(&a.priority_score)
            .then_with(|| a.invoice_id.cmp(&b.invoice_id))
    });
    risks
}

pub fn requalify_one(
    record: &ReceivableRecord,
    snapshot: &PortfolioSnapshot,
    assessment: &CounterpartyAssessment,
    config: &RequalificationConfig,
) -> Option<Risk> {
    let days = record.days_overdue;
    let exposed = record.outstanding();
    let share = snapshot.share_of(&record.counterparty_id);
    let rating = assessment.score.rating;
    let critically_aged = days > config.critical_overdue_days;

    if exposed < config.materiality_min && !critically_aged {
        return None;
    }
    let in_scope = record.is_overdue()
        || share > config.uncertain_concentration
        || !assessment.warnings.is_empty()
        || rating >= Rating::C;
    if !in_scope {
        return None;
    }

    let (status, reasons) = classify(days, share, assessment, config);
    let loss_probability = loss_probability(status, days, config);

    let age_score = (days as f64 / (2.0 * config.critical_overdue_days as f64) * 100.0).clamp(0.0, 100.0);
    let amount_score = if snapshot.total_outstanding > 0.0 {
        (exposed / snapshot.total_outstanding / 0.25 * 100.0).min(100.0)
    } else {
        0.0
    };
    let priority_score = (age_score * config.weight_age
        + amount_score * config.weight_amount
        + loss_probability * 100.0 * config.weight_probability
        + assessment.score.composite * config.weight_client)
        .clamp(0.0, 100.0);

    let risk_type = if record.is_overdue() {
        RiskType::Overdue
    } else if share > config.uncertain_concentration {
        RiskType::Concentration
    } else {
        RiskType::ScenarioDeviation
    };
    let data_quality = if record.quality != DataQuality::Green
        || assessment.pattern.sample_size < config.min_history_for_green
    {
        DataQuality::Orange
    } else {
        DataQuality::Green
    };

    Some(Risk {
        risk_id: format!("risk-{}", record.invoice_id),
        invoice_id: record.invoice_id.clone(),
        counterparty_id: record.counterparty_id.clone(),
        counterparty_name: record.counterparty_name.clone(),
        risk_type,
        exposed_amount: exposed,
        days_overdue: days,
        loss_probability,
        status,
        priority_score,
        justification: reasons.join("; "),
        data_quality,
        counterparty_rating: rating,
        counterparty_score: assessment.score.composite,
        portfolio_share: share,
    })
}

fn classify(
    days: i64,
    share: f64,
    assessment: &CounterpartyAssessment,
    config: &RequalificationConfig,
) -> (RiskStatus, Vec<String>) {
    let rating = assessment.score.rating;
    let mut critical = Vec::new();
    if days > config.critical_overdue_days {
        critical.push(format!(
            "{days} days overdue (critical beyond {})",
            config.critical_overdue_days
        ));
    }
    if share > config.critical_concentration {
        critical.push(format!(
            "counterparty holds {:.1}% of outstanding (critical concentration above {:.0}%)",
            share * 100.0,
            config.critical_concentration * 100.0
        ));
    }
    for w in assessment.warnings.iter().filter(|w| w.severity.is_high()) {
        critical.push(format!("{:?} warning ({:?}): {}", w.kind, w.severity, w.message));
    }
    if rating == Rating::D {
        critical.push(format!("counterparty rated D (score {:.0})", assessment.score.composite));
    }
    if !critical.is_empty() {
        return (RiskStatus::Critical, critical);
    }

    let mut uncertain = Vec::new();
    if days > config.uncertain_overdue_days {
        uncertain.push(format!(
            "{days} days overdue (watch band {}-{})",
            config.uncertain_overdue_days, config.critical_overdue_days
        ));
    }
    if share > config.uncertain_concentration {
        uncertain.push(format!(
            "counterparty holds {:.1}% of outstanding (watch band {:.0}-{:.0}%)",
            share * 100.0,
            config.uncertain_concentration * 100.0,
            config.critical_concentration * 100.0
        ));
    }
    if rating == Rating::C && !assessment.warnings.is_empty() {
        uncertain.push(format!(
            "counterparty rated C with {} early warning(s)",
            assessment.warnings.len()
        ));
    }
    if !uncertain.is_empty() {
        return (RiskStatus::Uncertain, uncertain);
    }

    (
        RiskStatus::Certain,
        vec![format!(
            "within tolerance: {days} days overdue, rating {rating:?}, {:.1}% of outstanding",
            share * 100.0
        )],
    )
}

/// Heuristic loss probability: CRITICAL 0.85-0.95, UNCERTAIN 0.50-0.70,
/// CERTAIN 0.15-0.25, rising with age inside each band.
pub fn loss_probability(status: RiskStatus, days: i64, config: &RequalificationConfig) -> f64 {
    let days = days.max(0) as f64;
    let critical = config.critical_overdue_days.max(1) as f64;
    let uncertain = config.uncertain_overdue_days.max(1) as f64;
    match status {
        RiskStatus::Critical => 0.85 + 0.10 * ((days - critical).max(0.0) / critical).min(1.0),
        RiskStatus::Uncertain => 0.50 + 0.20 * (days / critical).min(1.0),
        RiskStatus::Certain => 0.15 + 0.10 * (days / uncertain).min(1.0),
    }
}
