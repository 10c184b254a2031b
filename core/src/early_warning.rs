//! Early warning detector: weak signals ahead of overt default.
//!
//! Five independent detectors per counterparty. Each returns
//! `Option<EarlyWarning>`; `detect_all` composes them. A detector that
//! lacks the data it needs returns None instead of failing.
//!
//!   1. Progressive delay: fitted delay growth ≥ 15 days over 6 months
//!   2. Partial payments: ≥ 2 partial settlements in recent history
//!   3. Frequency increase: late rate rising vs the 12-month baseline
//!   4. Concentration: portfolio share above 30%
//!   5. Seasonal risk: poor history in an upcoming named window

use crate::{
    config::{SeasonalWindow, WarningConfig},
    payment_pattern::{settlement_history, PaymentPattern},
    receivable::{ReceivableRecord, SettlementStatus},
    stats,
    types::CounterpartyId,
};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn is_high(&self) -> bool {
        *self >= Severity::High
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    ProgressiveDelay,
    PartialPayments,
    FrequencyIncrease,
    Concentration,
    SeasonalRisk,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EarlyWarning {
    pub counterparty_id: CounterpartyId,
    pub kind: WarningKind,
    pub severity: Severity,
    pub message: String,
    pub estimated_occurrence: NaiveDate,
    pub days_advance: i64,
    /// The measured quantity behind the signal (days, count, rate or share).
    pub evidence: f64,
}

/// Everything a detector may look at for one counterparty.
pub struct WarningContext<'a> {
    pub counterparty_id: &'a str,
    pub records: &'a [ReceivableRecord],
    pub pattern: &'a PaymentPattern,
    pub portfolio_share: f64,
    pub as_of: NaiveDate,
    pub config: &'a WarningConfig,
}

impl WarningContext<'_> {
    fn warning(&self, kind: WarningKind, severity: Severity, days_advance: i64, evidence: f64, message: String) -> EarlyWarning {
        let days_advance = days_advance.max(0);
        EarlyWarning {
            counterparty_id: self.counterparty_id.to_string(),
            kind,
            severity,
            message,
            estimated_occurrence: self.as_of + Duration::days(days_advance),
            days_advance,
            evidence,
        }
    }
}

pub fn detect_all(ctx: &WarningContext<'_>) -> Vec<EarlyWarning> {
    [
        detect_progressive_delay(ctx),
        detect_partial_payments(ctx),
        detect_frequency_increase(ctx),
        detect_concentration(ctx),
        detect_seasonal_risk(ctx),
    ]
    .into_iter()
    .flatten()
    .collect()
}

pub fn detect_progressive_delay(ctx: &WarningContext<'_>) -> Option<EarlyWarning> {
    let since = ctx.as_of - Duration::days(ctx.config.lookback_days);
    let recent: Vec<&ReceivableRecord> = settlement_history(ctx.records, ctx.counterparty_id)
        .into_iter()
        .filter(|r| r.due_date >= since)
        .collect();
    if recent.len() < 3 {
        return None;
    }
    let first_due = recent[0].due_date;
    let xs: Vec<f64> = recent.iter().map(|r| (r.due_date - first_due).num_days() as f64).collect();
    let ys: Vec<f64> = recent
        .iter()
        .filter_map(|r| r.settlement_delay())
        .map(|d| d as f64)
        .collect();
    let slope = stats::ols_slope(&xs, &ys);
    let span = xs.last().copied().unwrap_or(0.0);
    let growth = slope * span;
    if growth < ctx.config.progressive_delay_min_days {
        return None;
    }

    let intercept = stats::mean(&ys) - slope * stats::mean(&xs);
    let current_delay = intercept + slope * span;
    let days_to_default = if current_delay >= ctx.config.default_delay_days {
        0
    } else {
        ((ctx.config.default_delay_days - current_delay) / slope).ceil().min(365.0) as i64
    };
    let severity = if growth >= 45.0 {
        Severity::Critical
    } else if growth >= 30.0 {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(ctx.warning(
        WarningKind::ProgressiveDelay,
        severity,
        days_to_default,
        growth,
        format!(
            "Settlement delay grew by {growth:.0} days over {:.0} days; projected to reach {:.0} days late",
            span, ctx.config.default_delay_days
        ),
    ))
}

pub fn detect_partial_payments(ctx: &WarningContext<'_>) -> Option<EarlyWarning> {
    let since = ctx.as_of - Duration::days(ctx.config.lookback_days);
    let count = ctx
        .records
        .iter()
        .filter(|r| {
            r.counterparty_id == ctx.counterparty_id
                && r.status == SettlementStatus::Partial
                && r.due_date >= since
        })
        .count();
    if count < ctx.config.partial_payment_min_count {
        return None;
    }
    let severity = if count >= ctx.config.partial_payment_min_count + 1 {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(ctx.warning(
        WarningKind::PartialPayments,
        severity,
        30,
        count as f64,
        format!("{count} partial payments in the last {} days", ctx.config.lookback_days),
    ))
}

pub fn detect_frequency_increase(ctx: &WarningContext<'_>) -> Option<EarlyWarning> {
    let recent_start = ctx.as_of - Duration::days(ctx.config.frequency_recent_days);
    let baseline_start = ctx.as_of - Duration::days(ctx.config.frequency_baseline_days);

    let mut recent = (0usize, 0usize);
    let mut baseline = (0usize, 0usize);
    for r in ctx.records.iter().filter(|r| r.counterparty_id == ctx.counterparty_id) {
        if r.due_date > ctx.as_of || r.due_date <= baseline_start {
            continue;
        }
        let late = match r.settlement_delay() {
            Some(delay) => delay > 0,
            None if r.is_overdue() => true,
            None => continue,
        };
        let bucket = if r.due_date > recent_start { &mut recent } else { &mut baseline };
        bucket.0 += late as usize;
        bucket.1 += 1;
    }
    if recent.1 < 2 || baseline.1 < 2 {
        return None;
    }
    let recent_rate = recent.0 as f64 / recent.1 as f64;
    let baseline_rate = baseline.0 as f64 / baseline.1 as f64;
    let increase = recent_rate - baseline_rate;
    if increase < ctx.config.frequency_increase_min {
        return None;
    }
    let severity = if increase >= 0.5 {
        Severity::High
    } else if increase >= 0.35 {
        Severity::Medium
    } else {
        Severity::Low
    };
    Some(ctx.warning(
        WarningKind::FrequencyIncrease,
        severity,
        60,
        increase,
        format!(
            "Late-payment rate rose to {:.0}% from a {:.0}% baseline",
            recent_rate * 100.0,
            baseline_rate * 100.0
        ),
    ))
}

pub fn detect_concentration(ctx: &WarningContext<'_>) -> Option<EarlyWarning> {
    let share = ctx.portfolio_share;
    if share <= ctx.config.concentration_threshold {
        return None;
    }
    let severity = if share > 0.5 {
        Severity::Critical
    } else if share > 0.4 {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(ctx.warning(
        WarningKind::Concentration,
        severity,
        0,
        share,
        format!("Holds {:.1}% of outstanding receivables", share * 100.0),
    ))
}

pub fn detect_seasonal_risk(ctx: &WarningContext<'_>) -> Option<EarlyWarning> {
    if ctx.pattern.sample_size < 3 {
        return None;
    }
    let history = settlement_history(ctx.records, ctx.counterparty_id);
    let overall = ctx.pattern.mean_delay;

    ctx.config
        .seasonal_windows
        .iter()
        .filter_map(|window| {
            let days_until = days_until_window(window, ctx.as_of);
            if days_until > ctx.config.seasonal_horizon_days {
                return None;
            }
            let in_window: Vec<f64> = history
                .iter()
                .filter(|r| window.contains_month(r.due_date.month()))
                .filter_map(|r| r.settlement_delay())
                .map(|d| d as f64)
                .collect();
            if in_window.len() < 2 {
                return None;
            }
            let excess = stats::mean(&in_window) - overall;
            (excess >= ctx.config.seasonal_excess_days).then_some((window, days_until, excess))
        })
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(window, days_until, excess)| {
            let severity = if excess >= 30.0 { Severity::High } else { Severity::Medium };
            ctx.warning(
                WarningKind::SeasonalRisk,
                severity,
                days_until,
                excess,
                format!(
                    "Historically pays {excess:.0} days later than usual during '{}'",
                    window.name
                ),
            )
        })
}

/// Days from `as_of` to the next start of `window`; 0 when inside it.
fn days_until_window(window: &SeasonalWindow, as_of: NaiveDate) -> i64 {
    if window.contains_month(as_of.month()) {
        return 0;
    }
    let year = if window.start_month > as_of.month() { as_of.year() } else { as_of.year() + 1 };
    NaiveDate::from_ymd_opt(year, window.start_month.clamp(1, 12), 1)
        .map(|start| (start - as_of).num_days())
        .unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_distance_wraps_year() {
        let w = SeasonalWindow { name: "summer".into(), start_month: 7, end_month: 8 };
        let as_of = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        assert_eq!(days_until_window(&w, as_of), 30);
        let inside = NaiveDate::from_ymd_opt(2026, 7, 15).unwrap();
        assert_eq!(days_until_window(&w, inside), 0);
        let after = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        assert!(days_until_window(&w, after) > 300);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical.is_high());
        assert!(Severity::High.is_high());
        assert!(!Severity::Medium.is_high());
    }
}
