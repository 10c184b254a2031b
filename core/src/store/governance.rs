//! Analyses, decisions and outcomes queries.

use super::{now_rfc3339, LedgerStore};
use crate::{
    error::EngineResult,
    governance::{DecisionEntry, DecisionKind, OutcomeEntry, OutcomeKind},
};
use rusqlite::{
    params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
    OptionalExtension, ToSql,
};

/// An analysis row with its JSON payloads still encoded.
#[derive(Debug, Clone)]
pub struct AnalysisRow {
    pub id: i64,
    pub cycle_id: String,
    pub trigger_reason: String,
    pub data_hash: String,
    pub risks_json: String,
    pub actions_json: String,
    pub summary_json: String,
    pub recorded_at: String,
}

/// Counts by decision kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionCounts {
    pub total: i64,
    pub approved: i64,
    pub rejected: i64,
    pub deferred: i64,
}

/// Counts by outcome kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub total: i64,
    pub confirmed: i64,
    pub false_positive: i64,
    pub inconclusive: i64,
}

impl ToSql for DecisionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DecisionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| DecisionKind::parse(s).ok_or(FromSqlError::InvalidType))
    }
}

impl ToSql for OutcomeKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for OutcomeKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| OutcomeKind::parse(s).ok_or(FromSqlError::InvalidType))
    }
}

const ANALYSIS_COLUMNS: &str = "id, cycle_id, trigger_reason, data_hash, risks_json, actions_json, summary_json, recorded_at";

fn analysis_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<AnalysisRow> {
    Ok(AnalysisRow {
        id: r.get(0)?,
        cycle_id: r.get(1)?,
        trigger_reason: r.get(2)?,
        data_hash: r.get(3)?,
        risks_json: r.get(4)?,
        actions_json: r.get(5)?,
        summary_json: r.get(6)?,
        recorded_at: r.get(7)?,
    })
}

impl LedgerStore {
    // ── Analyses ───────────────────────────────────────────────

    pub fn insert_analysis(
        &self,
        cycle_id: &str,
        trigger_reason: &str,
        data_hash: &str,
        risks_json: &str,
        actions_json: &str,
        summary_json: &str,
    ) -> EngineResult<i64> {
        self.conn.execute(
            "INSERT INTO analyses (cycle_id, trigger_reason, data_hash, risks_json,
                                   actions_json, summary_json, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                cycle_id,
                trigger_reason,
                data_hash,
                risks_json,
                actions_json,
                summary_json,
                now_rfc3339()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn latest_analysis(&self) -> EngineResult<Option<AnalysisRow>> {
        let sql = format!("SELECT {ANALYSIS_COLUMNS} FROM analyses ORDER BY id DESC LIMIT 1");
        Ok(self.conn.query_row(&sql, [], analysis_from_row).optional()?)
    }

    pub fn analysis_by_cycle(&self, cycle_id: &str) -> EngineResult<Option<AnalysisRow>> {
        let sql = format!("SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE cycle_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![cycle_id], analysis_from_row)
            .optional()?)
    }

    pub fn analysis_count(&self) -> EngineResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM analyses", [], |r| r.get(0))?)
    }

    // ── Decisions ──────────────────────────────────────────────

    pub fn insert_decision(
        &self,
        action_id: &str,
        cycle_id: &str,
        decision: DecisionKind,
        actor: &str,
        comment: Option<&str>,
    ) -> EngineResult<i64> {
        self.conn.execute(
            "INSERT INTO decisions (action_id, cycle_id, decision, actor, comment, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![action_id, cycle_id, decision, actor, comment, now_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn decisions_for(&self, action_id: &str) -> EngineResult<Vec<DecisionEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, action_id, cycle_id, decision, actor, comment, recorded_at
             FROM decisions WHERE action_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![action_id], |r| {
            Ok(DecisionEntry {
                id: r.get(0)?,
                action_id: r.get(1)?,
                cycle_id: r.get(2)?,
                decision: r.get(3)?,
                actor: r.get(4)?,
                comment: r.get(5)?,
                recorded_at: r.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// The approve/reject decision for an action, if one was recorded.
    pub fn final_decision_for(&self, action_id: &str) -> EngineResult<Option<DecisionKind>> {
        Ok(self
            .conn
            .query_row(
                "SELECT decision FROM decisions
                 WHERE action_id = ?1 AND decision IN ('approved', 'rejected')
                 ORDER BY id ASC LIMIT 1",
                params![action_id],
                |r| r.get(0),
            )
            .optional()?)
    }

    pub fn decision_counts(&self) -> EngineResult<DecisionCounts> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(decision = 'approved'), 0),
                    COALESCE(SUM(decision = 'rejected'), 0),
                    COALESCE(SUM(decision = 'deferred'), 0)
             FROM decisions",
            [],
            |r| {
                Ok(DecisionCounts {
                    total: r.get(0)?,
                    approved: r.get(1)?,
                    rejected: r.get(2)?,
                    deferred: r.get(3)?,
                })
            },
        )?)
    }

    // ── Outcomes ───────────────────────────────────────────────

    pub fn insert_outcome(
        &self,
        action_id: &str,
        outcome: OutcomeKind,
        recovered_amount: Option<f64>,
        notes: Option<&str>,
    ) -> EngineResult<i64> {
        self.conn.execute(
            "INSERT INTO outcomes (action_id, outcome, recovered_amount, notes, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![action_id, outcome, recovered_amount, notes, now_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn outcomes_for(&self, action_id: &str) -> EngineResult<Vec<OutcomeEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, action_id, outcome, recovered_amount, notes, recorded_at
             FROM outcomes WHERE action_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![action_id], |r| {
            Ok(OutcomeEntry {
                id: r.get(0)?,
                action_id: r.get(1)?,
                outcome: r.get(2)?,
                recovered_amount: r.get(3)?,
                notes: r.get(4)?,
                recorded_at: r.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn outcome_counts(&self) -> EngineResult<OutcomeCounts> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(outcome = 'confirmed'), 0),
                    COALESCE(SUM(outcome = 'false_positive'), 0),
                    COALESCE(SUM(outcome = 'inconclusive'), 0)
             FROM outcomes",
            [],
            |r| {
                Ok(OutcomeCounts {
                    total: r.get(0)?,
                    confirmed: r.get(1)?,
                    false_positive: r.get(2)?,
                    inconclusive: r.get(3)?,
                })
            },
        )?)
    }

    /// Approved actions that have no outcome recorded yet.
    pub fn pending_outcome_count(&self) -> EngineResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(DISTINCT d.action_id) FROM decisions d
             WHERE d.decision = 'approved'
               AND NOT EXISTS (SELECT 1 FROM outcomes o WHERE o.action_id = d.action_id)",
            [],
            |r| r.get(0),
        )?)
    }
}
