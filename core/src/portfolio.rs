//! Portfolio-level aggregates over one cycle's receivables.
//!
//! Exposure, concentration and amount-weighted days overdue per
//! counterparty. BTreeMap keeps iteration order stable so every
//! derived list is deterministic.

use crate::{
    receivable::ReceivableRecord,
    types::{Amount, CounterpartyId, DAYS_PER_PERIOD},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CounterpartyExposure {
    pub counterparty_id: CounterpartyId,
    pub counterparty_name: String,
    pub outstanding: Amount,
    pub overdue_amount: Amount,
    /// Outstanding-weighted average days overdue (0 for current invoices).
    pub weighted_days_overdue: f64,
    /// Share of total portfolio outstanding, 0..1.
    pub share: f64,
    pub open_invoices: usize,
}

/// Cash position used for runway-sensitive scoring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CashPosition {
    pub current_cash: Amount,
    pub monthly_inflow: Amount,
    pub monthly_outflow: Amount,
}

impl CashPosition {
    /// Days of runway at the current net burn. None when not burning.
    pub fn runway_days(&self) -> Option<f64> {
        let burn = self.monthly_outflow - self.monthly_inflow;
        if burn <= 0.0 {
            return None;
        }
        Some((self.current_cash.max(0.0) / burn) * DAYS_PER_PERIOD)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PortfolioSnapshot {
    pub total_outstanding: Amount,
    pub overdue_amount: Amount,
    pub weighted_days_overdue: f64,
    pub exposures: BTreeMap<CounterpartyId, CounterpartyExposure>,
}

impl PortfolioSnapshot {
    pub fn from_records(records: &[ReceivableRecord]) -> Self {
        let mut snapshot = Self::default();
        let mut weighted_days: BTreeMap<CounterpartyId, f64> = BTreeMap::new();

        for rec in records.iter().filter(|r| r.is_outstanding()) {
            let outstanding = rec.outstanding();
            let entry = snapshot
                .exposures
                .entry(rec.counterparty_id.clone())
                .or_insert_with(|| CounterpartyExposure {
                    counterparty_id: rec.counterparty_id.clone(),
                    counterparty_name: rec.counterparty_name.clone(),
                    outstanding: 0.0,
                    overdue_amount: 0.0,
                    weighted_days_overdue: 0.0,
                    share: 0.0,
                    open_invoices: 0,
                });
            entry.outstanding += outstanding;
            entry.open_invoices += 1;
            if rec.is_overdue() {
                entry.overdue_amount += outstanding;
                snapshot.overdue_amount += outstanding;
            }
            *weighted_days.entry(rec.counterparty_id.clone()).or_insert(0.0) +=
                outstanding * rec.days_overdue as f64;
            snapshot.total_outstanding += outstanding;
        }

        let total = snapshot.total_outstanding;
        let mut portfolio_weighted = 0.0;
        for (id, exposure) in snapshot.exposures.iter_mut() {
            let days = weighted_days.get(id).copied().unwrap_or(0.0);
            portfolio_weighted += days;
            exposure.weighted_days_overdue = if exposure.outstanding > 0.0 {
                days / exposure.outstanding
            } else {
                0.0
            };
            exposure.share = if total > 0.0 { exposure.outstanding / total } else { 0.0 };
        }
        snapshot.weighted_days_overdue = if total > 0.0 { portfolio_weighted / total } else { 0.0 };
        snapshot
    }

    pub fn share_of(&self, counterparty_id: &str) -> f64 {
        self.exposures
            .get(counterparty_id)
            .map(|e| e.share)
            .unwrap_or(0.0)
    }

    /// Counterparty with the largest share. Ties resolve to the lowest id.
    pub fn top_concentration(&self) -> Option<&CounterpartyExposure> {
        self.exposures.values().fold(None, |best, e| match best {
            Some(b) if b.share >= e.share => Some(b),
            _ => Some(e),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.exposures.is_empty()
    }
}

/// Outstanding invoices strictly older than `critical_age` days overdue.
pub fn critical_invoices(records: &[ReceivableRecord], critical_age: i64) -> BTreeSet<String> {
    records
        .iter()
        .filter(|r| r.is_outstanding() && r.days_overdue > critical_age)
        .map(|r| r.invoice_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receivable::{DataQuality, SettlementStatus};
    use chrono::NaiveDate;

    fn rec(cp: &str, id: &str, amount: f64, days: i64) -> ReceivableRecord {
        ReceivableRecord {
            counterparty_id: cp.into(),
            counterparty_name: cp.into(),
            invoice_id: id.into(),
            amount,
            amount_paid: 0.0,
            due_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            settlement_date: None,
            status: if days > 0 { SettlementStatus::Overdue } else { SettlementStatus::Open },
            days_overdue: days,
            quality: DataQuality::Green,
        }
    }

    #[test]
    fn shares_sum_to_one_and_weighted_days_match() {
        let snap = PortfolioSnapshot::from_records(&[
            rec("a", "1", 300.0, 10),
            rec("a", "2", 100.0, 0),
            rec("b", "3", 600.0, 40),
        ]);
        let total_share: f64 = snap.exposures.values().map(|e| e.share).sum();
        assert!((total_share - 1.0).abs() < 1e-12);
        assert!((snap.weighted_days_overdue - (300.0 * 10.0 + 600.0 * 40.0) / 1000.0).abs() < 1e-9);
        assert_eq!(snap.top_concentration().unwrap().counterparty_id, "b");
        assert!((snap.exposures["a"].weighted_days_overdue - 7.5).abs() < 1e-9);
    }

    #[test]
    fn runway_is_none_without_burn() {
        let pos = CashPosition { current_cash: 100.0, monthly_inflow: 50.0, monthly_outflow: 40.0 };
        assert!(pos.runway_days().is_none());
        let burning = CashPosition { current_cash: 100.0, monthly_inflow: 0.0, monthly_outflow: 100.0 };
        assert!((burning.runway_days().unwrap() - 30.0).abs() < 1e-9);
    }
}
