//! SQLite persistence for the governance ledger.
//!
//! RULE: Only the store talks to the database.
//! The ledger calls store methods; it never executes SQL directly.
//! Every table is append-only: the store exposes INSERT and SELECT,
//! and database triggers reject UPDATE and DELETE.

use crate::{
    error::EngineResult,
    governance::AuditEntry,
};
use rusqlite::{params, Connection};

mod governance;

pub use governance::{AnalysisRow, DecisionCounts, OutcomeCounts};

pub struct LedgerStore {
    conn: Connection,
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl LedgerStore {
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open(":memory:")?;
        Ok(Self { conn })
    }

    /// Apply the schema. Idempotent.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_governance.sql"))?;
        Ok(())
    }

    // ── Audit trail ────────────────────────────────────────────

    pub fn append_audit(
        &self,
        event_type: &str,
        cycle_id: Option<&str>,
        action_id: Option<&str>,
        payload: &str,
    ) -> EngineResult<i64> {
        self.conn.execute(
            "INSERT INTO audit_trail (event_type, cycle_id, action_id, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![event_type, cycle_id, action_id, payload, now_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent entries last. `limit` caps how many of the newest are returned.
    pub fn audit_trail(&self, limit: usize) -> EngineResult<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_type, cycle_id, action_id, payload, recorded_at
             FROM (SELECT * FROM audit_trail ORDER BY id DESC LIMIT ?1)
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![limit as i64], |r| {
            Ok(AuditEntry {
                id: r.get(0)?,
                event_type: r.get(1)?,
                cycle_id: r.get(2)?,
                action_id: r.get(3)?,
                payload: r.get(4)?,
                recorded_at: r.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Runs a raw statement. Only used by tests that check the
    /// append-only triggers.
    #[doc(hidden)]
    pub fn execute_raw(&self, sql: &str) -> EngineResult<usize> {
        Ok(self.conn.execute(sql, [])?)
    }
}
