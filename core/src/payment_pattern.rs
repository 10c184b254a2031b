//! Payment pattern analyzer: per-counterparty settlement statistics.
//!
//! Built from every settled row (paid or partially paid with a
//! settlement date). Patterns are recomputed each cycle and replaced,
//! never updated in place.

use crate::{
    receivable::{ReceivableRecord, SettlementStatus},
    stats,
    types::{CounterpartyId, DAYS_PER_PERIOD},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Delay above which a settlement counts as very late.
pub const VERY_LATE_DAYS: i64 = 30;
/// Slope (days of delay per month) separating stable from trending.
pub const TREND_SLOPE_THRESHOLD: f64 = 2.0;
/// Samples needed before a trend is classified at all.
pub const MIN_TREND_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Worsening,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentPattern {
    pub counterparty_id: CounterpartyId,
    pub sample_size: usize,
    pub mean_delay: f64,
    pub median_delay: f64,
    pub std_delay: f64,
    pub on_time_rate: f64,
    pub late_rate: f64,
    pub very_late_rate: f64,
    pub trend: Trend,
    /// Days of additional delay per month of due dates.
    pub trend_slope: f64,
    pub has_partial_payments: bool,
    pub partial_count: usize,
    pub reliability_score: f64,
    pub risk_tier: RiskTier,
}

impl PaymentPattern {
    /// Neutral profile for a counterparty with no settlement history.
    pub fn no_history(counterparty_id: &str) -> Self {
        Self {
            counterparty_id: counterparty_id.to_string(),
            sample_size: 0,
            mean_delay: 0.0,
            median_delay: 0.0,
            std_delay: 0.0,
            on_time_rate: 0.0,
            late_rate: 0.0,
            very_late_rate: 0.0,
            trend: Trend::Stable,
            trend_slope: 0.0,
            has_partial_payments: false,
            partial_count: 0,
            reliability_score: 50.0,
            risk_tier: RiskTier::Medium,
        }
    }
}

/// Settlement observations for one counterparty, sorted by due date.
pub fn settlement_history<'a>(
    records: &'a [ReceivableRecord],
    counterparty_id: &str,
) -> Vec<&'a ReceivableRecord> {
    let mut rows: Vec<&ReceivableRecord> = records
        .iter()
        .filter(|r| r.counterparty_id == counterparty_id && r.settlement_date.is_some())
        .collect();
    rows.sort_by_key(|r| (r.due_date, r.invoice_id.clone()));
    rows
}

pub fn analyze_counterparty(records: &[ReceivableRecord], counterparty_id: &str) -> PaymentPattern {
    let history = settlement_history(records, counterparty_id);
    let partial_count = records
        .iter()
        .filter(|r| r.counterparty_id == counterparty_id && r.status == SettlementStatus::Partial)
        .count();

    let delays: Vec<f64> = history
        .iter()
        .filter_map(|r| r.settlement_delay())
        .map(|d| d as f64)
        .collect();
    if delays.is_empty() {
        let mut pattern = PaymentPattern::no_history(counterparty_id);
        pattern.partial_count = partial_count;
        pattern.has_partial_payments = partial_count > 0;
        return pattern;
    }

    let n = delays.len() as f64;
    let on_time = delays.iter().filter(|d| **d <= 0.0).count() as f64 / n;
    let very_late = delays.iter().filter(|d| **d > VERY_LATE_DAYS as f64).count() as f64 / n;
    let late = (1.0 - on_time - very_late).max(0.0);
    let std_delay = stats::std_dev(&delays);

    let (trend, slope) = if delays.len() >= MIN_TREND_SAMPLES {
        let first_due = history[0].due_date;
        let xs: Vec<f64> = history
            .iter()
            .map(|r| (r.due_date - first_due).num_days() as f64 / DAYS_PER_PERIOD)
            .collect();
        let slope = stats::ols_slope(&xs, &delays);
        let trend = if slope > TREND_SLOPE_THRESHOLD {
            Trend::Worsening
        } else if slope < -TREND_SLOPE_THRESHOLD {
            Trend::Improving
        } else {
            Trend::Stable
        };
        (trend, slope)
    } else {
        (Trend::Stable, 0.0)
    };

    let reliability = reliability_score(on_time, very_late, std_delay, partial_count);
    PaymentPattern {
        counterparty_id: counterparty_id.to_string(),
        sample_size: delays.len(),
        mean_delay: stats::mean(&delays),
        median_delay: stats::median(&delays),
        std_delay,
        on_time_rate: on_time,
        late_rate: late,
        very_late_rate: very_late,
        trend,
        trend_slope: slope,
        has_partial_payments: partial_count > 0,
        partial_count,
        reliability_score: reliability,
        risk_tier: tier_for(reliability),
    }
}

/// Patterns for every counterparty that appears in the load.
pub fn analyze_all(records: &[ReceivableRecord]) -> BTreeMap<CounterpartyId, PaymentPattern> {
    let mut ids: Vec<&str> = records.iter().map(|r| r.counterparty_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.into_iter()
        .map(|id| (id.to_string(), analyze_counterparty(records, id)))
        .collect()
}

fn reliability_score(on_time: f64, very_late: f64, std_delay: f64, partials: usize) -> f64 {
    let stability = (1.0 - std_delay / VERY_LATE_DAYS as f64).max(0.0);
    let partial_penalty = (partials as f64 * 5.0).min(15.0);
    (on_time * 60.0 + (1.0 - very_late) * 25.0 + stability * 15.0 - partial_penalty).clamp(0.0, 100.0)
}

fn tier_for(reliability: f64) -> RiskTier {
    if reliability >= 80.0 {
        RiskTier::Low
    } else if reliability >= 60.0 {
        RiskTier::Medium
    } else if reliability >= 40.0 {
        RiskTier::High
    } else {
        RiskTier::Critical
    }
}
