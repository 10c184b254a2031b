use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No receivable data available: {reason}")]
    DataUnavailable { reason: String },

    #[error("Malformed record '{invoice_id}': {reason}")]
    MalformedRecord { invoice_id: String, reason: String },

    #[error("Analysis cycle {cycle_id} failed: {reason}")]
    AnalysisFailure { cycle_id: String, reason: String },

    #[error("Governance invariant violated for action '{action_id}': {reason}")]
    GovernanceInvariantViolation { action_id: String, reason: String },

    #[error("Simulation numerical failure: {reason}")]
    SimulationNumericalFailure { reason: String },

    #[error("Operation '{operation}' not allowed in state {from}")]
    InvalidTransition { from: String, operation: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
