//! Receivable records: normalisation of ingested rows.
//!
//! The ingestion collaborator delivers loosely-typed rows (`RawReceivable`).
//! Each analysis cycle normalises them against an as-of date:
//!   - rows missing counterparty, amount or due date are excluded
//!     and reported as red data-quality issues, never fatal;
//!   - days overdue is recomputed from the as-of date, never trusted;
//!   - rows with defaulted fields are kept but flagged orange.

use crate::{
    error::{EngineError, EngineResult},
    types::{Amount, CounterpartyId, InvoiceId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    /// Not yet due.
    Open,
    /// Past due, nothing received.
    Overdue,
    /// Part of the amount received, remainder outstanding.
    Partial,
    Paid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Green,
    Orange,
    Red,
}

/// A row as delivered by ingestion. Every field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawReceivable {
    #[serde(default)]
    pub counterparty_id: Option<String>,
    #[serde(default)]
    pub counterparty_name: Option<String>,
    #[serde(default)]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub amount_paid: Option<f64>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<SettlementStatus>,
    #[serde(default)]
    pub settlement_date: Option<NaiveDate>,
}

/// A validated receivable for one analysis cycle. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceivableRecord {
    pub counterparty_id: CounterpartyId,
    pub counterparty_name: String,
    pub invoice_id: InvoiceId,
    pub amount: Amount,
    pub amount_paid: Amount,
    pub due_date: NaiveDate,
    pub settlement_date: Option<NaiveDate>,
    pub status: SettlementStatus,
    pub days_overdue: i64,
    pub quality: DataQuality,
}

impl ReceivableRecord {
    pub fn outstanding(&self) -> Amount {
        match self.status {
            SettlementStatus::Paid => 0.0,
            _ => (self.amount - self.amount_paid).max(0.0),
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding() > 0.0
    }

    pub fn is_overdue(&self) -> bool {
        self.is_outstanding() && self.days_overdue > 0
    }

    /// Settlement delay in days (negative when paid early).
    /// Only defined for rows with a settlement date.
    pub fn settlement_delay(&self) -> Option<i64> {
        self.settlement_date
            .map(|paid| (paid - self.due_date).num_days())
    }
}

/// A row excluded from scoring, or kept with a degraded flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataQualityIssue {
    pub invoice_id: String,
    pub counterparty_id: Option<String>,
    pub flag: DataQuality,
    pub reason: String,
}

/// Result of normalising one load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedBatch {
    pub records: Vec<ReceivableRecord>,
    pub issues: Vec<DataQualityIssue>,
}

impl NormalizedBatch {
    pub fn excluded_count(&self) -> usize {
        self.issues.iter().filter(|i| i.flag == DataQuality::Red).count()
    }
}

/// Normalise a raw load against `as_of`.
pub fn normalize(raws: &[RawReceivable], as_of: NaiveDate) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for (index, raw) in raws.iter().enumerate() {
        match normalize_one(raw, index, as_of) {
            Ok((record, warnings)) => {
                for reason in warnings {
                    batch.issues.push(DataQualityIssue {
                        invoice_id: record.invoice_id.clone(),
                        counterparty_id: Some(record.counterparty_id.clone()),
                        flag: DataQuality::Orange,
                        reason,
                    });
                }
                batch.records.push(record);
            }
            Err(e) => {
                let (invoice_id, reason) = match e {
                    EngineError::MalformedRecord { invoice_id, reason } => (invoice_id, reason),
                    other => (format!("row-{index}"), other.to_string()),
                };
                log::warn!("ingest: excluded {invoice_id}: {reason}");
                batch.issues.push(DataQualityIssue {
                    invoice_id,
                    counterparty_id: raw.counterparty_id.clone(),
                    flag: DataQuality::Red,
                    reason,
                });
            }
        }
    }
    batch
}

fn normalize_one(
    raw: &RawReceivable,
    index: usize,
    as_of: NaiveDate,
) -> EngineResult<(ReceivableRecord, Vec<String>)> {
    let invoice_id = raw
        .invoice_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("row-{index}"));
    let reject = |reason: &str| EngineError::MalformedRecord {
        invoice_id: invoice_id.clone(),
        reason: reason.to_string(),
    };

    let counterparty_id = raw
        .counterparty_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| reject("missing counterparty"))?;
    let amount = raw.amount.ok_or_else(|| reject("missing amount"))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(reject("amount must be a positive number"));
    }
    let due_date = raw.due_date.ok_or_else(|| reject("missing due date"))?;

    let mut warnings = Vec::new();
    if raw.invoice_id.is_none() {
        warnings.push("missing invoice id, row index used".to_string());
    }
    let counterparty_name = match &raw.counterparty_name {
        Some(name) if !name.trim().is_empty() => name.clone(),
        _ => {
            warnings.push("missing counterparty name".to_string());
            counterparty_id.clone()
        }
    };

    let mut amount_paid = raw.amount_paid.unwrap_or(0.0);
    if !amount_paid.is_finite() || amount_paid < 0.0 {
        warnings.push("invalid paid amount, treated as zero".to_string());
        amount_paid = 0.0;
    }
    if amount_paid > amount {
        warnings.push("paid amount exceeds invoice amount, capped".to_string());
        amount_paid = amount;
    }

    let status = match raw.status {
        Some(SettlementStatus::Paid) => SettlementStatus::Paid,
        _ if amount_paid >= amount => SettlementStatus::Paid,
        _ if amount_paid > 0.0 => SettlementStatus::Partial,
        Some(SettlementStatus::Partial) => {
            warnings.push("partial status without paid amount".to_string());
            open_status(due_date, as_of)
        }
        None if raw.settlement_date.is_some() => SettlementStatus::Paid,
        None => {
            warnings.push("missing status, inferred from due date".to_string());
            open_status(due_date, as_of)
        }
        Some(_) => open_status(due_date, as_of),
    };
    if status == SettlementStatus::Paid && raw.settlement_date.is_none() {
        warnings.push("paid without settlement date".to_string());
    }

    let days_overdue = match status {
        SettlementStatus::Paid => 0,
        _ => (as_of - due_date).num_days().max(0),
    };
    let quality = if warnings.is_empty() {
        DataQuality::Green
    } else {
        DataQuality::Orange
    };

    Ok((
        ReceivableRecord {
            counterparty_id,
            counterparty_name,
            invoice_id,
            amount,
            amount_paid: if status == SettlementStatus::Paid { amount } else { amount_paid },
            due_date,
            settlement_date: raw.settlement_date,
            status,
            days_overdue,
            quality,
        },
        warnings,
    ))
}

fn open_status(due_date: NaiveDate, as_of: NaiveDate) -> SettlementStatus {
    if due_date < as_of {
        SettlementStatus::Overdue
    } else {
        SettlementStatus::Open
    }
}

/// SHA-256 over the canonical JSON of the raw load, independent of row order.
pub fn content_hash(raws: &[RawReceivable]) -> String {
    let mut rows: Vec<String> = raws
        .iter()
        .map(|r| serde_json::to_string(r).unwrap_or_default())
        .collect();
    rows.sort();
    let mut hasher = Sha256::new();
    for row in &rows {
        hasher.update(row.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(id: &str, amount: Option<f64>, due: Option<NaiveDate>) -> RawReceivable {
        RawReceivable {
            counterparty_id: Some("c1".into()),
            counterparty_name: Some("Client One".into()),
            invoice_id: Some(id.into()),
            amount,
            due_date: due,
            status: Some(SettlementStatus::Open),
            ..Default::default()
        }
    }

    #[test]
    fn days_overdue_recomputed_from_as_of() {
        let as_of = date(2026, 3, 31);
        let batch = normalize(&[raw("i1", Some(1000.0), Some(date(2026, 3, 1)))], as_of);
        let rec = &batch.records[0];
        assert_eq!(rec.days_overdue, 30);
        assert_eq!(rec.status, SettlementStatus::Overdue);
        assert_eq!(rec.quality, DataQuality::Green);
    }

    #[test]
    fn missing_amount_or_date_is_excluded_not_fatal() {
        let as_of = date(2026, 3, 31);
        let batch = normalize(
            &[
                raw("ok", Some(10.0), Some(as_of)),
                raw("no-amount", None, Some(as_of)),
                raw("no-date", Some(10.0), None),
            ],
            as_of,
        );
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.excluded_count(), 2);
        assert!(batch.issues.iter().all(|i| i.flag == DataQuality::Red));
    }

    #[test]
    fn partial_payment_reduces_outstanding() {
        let as_of = date(2026, 3, 31);
        let mut r = raw("p", Some(1000.0), Some(date(2026, 2, 1)));
        r.amount_paid = Some(400.0);
        let batch = normalize(&[r], as_of);
        let rec = &batch.records[0];
        assert_eq!(rec.status, SettlementStatus::Partial);
        assert!((rec.outstanding() - 600.0).abs() < 1e-9);
        assert!(rec.is_overdue());
    }

    #[test]
    fn hash_ignores_row_order() {
        let a = raw("a", Some(1.0), Some(date(2026, 1, 1)));
        let b = raw("b", Some(2.0), Some(date(2026, 1, 2)));
        assert_eq!(
            content_hash(&[a.clone(), b.clone()]),
            content_hash(&[b, a.clone()])
        );
        assert_ne!(content_hash(&[a.clone()]), content_hash(&[a.clone(), a]));
    }
}
