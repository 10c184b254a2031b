//! Engine events.
//!
//! RULE: Observers learn about the engine ONLY through these events.
//! Publishing is fire-and-forget; nothing in the engine waits on,
//! or fails because of, an observer.

use crate::{
    governance::{DecisionKind, OutcomeKind},
    state_machine::MachineState,
    types::{ActionId, CycleId},
};
use serde::{Deserialize, Serialize};

/// Every event the engine emits.
/// Variants are only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    StateChanged {
        from: MachineState,
        to: MachineState,
        reason: String,
    },
    TriggerEvaluated {
        fired: bool,
        reason: String,
    },
    /// The trigger did not fire; the reason says why nothing was done.
    CycleSkipped {
        reason: String,
    },
    AnalysisStarted {
        cycle_id: CycleId,
        trigger_reason: String,
    },
    AnalysisCompleted {
        cycle_id: CycleId,
        risk_count: usize,
        critical_count: usize,
        action_count: usize,
    },
    AnalysisFailed {
        cycle_id: CycleId,
        error: String,
    },
    ActionValidated {
        cycle_id: CycleId,
        action_id: ActionId,
        decision: DecisionKind,
        actor: String,
    },
    OutcomeRecorded {
        action_id: ActionId,
        outcome: OutcomeKind,
    },
    StressTestCompleted {
        prob_negative: f64,
        value_at_risk: f64,
        worst_case: Option<String>,
    },
}

impl EngineEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::StateChanged { .. } => "state_changed",
            EngineEvent::TriggerEvaluated { .. } => "trigger_evaluated",
            EngineEvent::CycleSkipped { .. } => "cycle_skipped",
            EngineEvent::AnalysisStarted { .. } => "analysis_started",
            EngineEvent::AnalysisCompleted { .. } => "analysis_completed",
            EngineEvent::AnalysisFailed { .. } => "analysis_failed",
            EngineEvent::ActionValidated { .. } => "action_validated",
            EngineEvent::OutcomeRecorded { .. } => "outcome_recorded",
            EngineEvent::StressTestCompleted { .. } => "stress_test_completed",
        }
    }

    pub fn cycle_id(&self) -> Option<&str> {
        match self {
            EngineEvent::AnalysisStarted { cycle_id, .. }
            | EngineEvent::AnalysisCompleted { cycle_id, .. }
            | EngineEvent::AnalysisFailed { cycle_id, .. }
            | EngineEvent::ActionValidated { cycle_id, .. } => Some(cycle_id),
            _ => None,
        }
    }
}
