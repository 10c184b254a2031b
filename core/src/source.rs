//! Where receivable rows come from.
//!
//! The engine reads its data through `ReceivableSource` at each trigger
//! evaluation and each analysis cycle. Loading is one of the only two
//! places the monitoring loop may wait (hashing is the other).

use crate::{
    error::{EngineError, EngineResult},
    receivable::RawReceivable,
};
use std::{
    path::PathBuf,
    sync::{Arc, RwLock},
};

pub trait ReceivableSource: Send {
    /// Load the current rows. An empty load is `DataUnavailable`.
    fn load(&self) -> EngineResult<Vec<RawReceivable>>;

    fn describe(&self) -> String;
}

/// Rows held in memory. Clones share the same rows, so a caller can keep
/// a handle and `replace` the data between cycles.
#[derive(Clone, Default)]
pub struct InMemorySource {
    rows: Arc<RwLock<Vec<RawReceivable>>>,
}

impl InMemorySource {
    pub fn new(rows: Vec<RawReceivable>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(rows)),
        }
    }

    pub fn replace(&self, rows: Vec<RawReceivable>) {
        match self.rows.write() {
            Ok(mut guard) => *guard = rows,
            Err(poisoned) => *poisoned.into_inner() = rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReceivableSource for InMemorySource {
    fn load(&self) -> EngineResult<Vec<RawReceivable>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| EngineError::DataUnavailable {
                reason: "in-memory receivables lock poisoned".to_string(),
            })?
            .clone();
        if rows.is_empty() {
            return Err(EngineError::DataUnavailable {
                reason: "no receivable records loaded".to_string(),
            });
        }
        Ok(rows)
    }

    fn describe(&self) -> String {
        format!("in-memory ({} rows)", self.len())
    }
}

/// A JSON array of receivable rows on disk, re-read on every load.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReceivableSource for JsonFileSource {
    fn load(&self) -> EngineResult<Vec<RawReceivable>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| EngineError::DataUnavailable {
            reason: format!("cannot read {}: {e}", self.path.display()),
        })?;
        let rows: Vec<RawReceivable> =
            serde_json::from_str(&content).map_err(|e| EngineError::DataUnavailable {
                reason: format!("cannot parse {}: {e}", self.path.display()),
            })?;
        if rows.is_empty() {
            return Err(EngineError::DataUnavailable {
                reason: format!("{} contains no receivable records", self.path.display()),
            });
        }
        Ok(rows)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
