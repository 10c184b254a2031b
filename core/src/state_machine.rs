//! Risk requalification state machine.
//!
//!   IDLE ──start──► MONITORING ──trigger──► ANALYZING
//!                       ▲                      │
//!                       │         ┌────────────┼──────────────┐
//!                       │      no actions   actions        failure
//!                       │         │            ▼              ▼
//!                       ├─────────┘   WAITING_VALIDATION    ERROR
//!                       │                      │              │
//!                       └──── last decision ───┘◄── fallback ─┘
//!
//! RULES:
//!   - Analysis never starts while ANALYZING or WAITING_VALIDATION.
//!   - Only a human decision on the last pending action leaves
//!     WAITING_VALIDATION; shutdown is the single exception.
//!   - ERROR is transient: a failed analysis always lands in MONITORING.
//!   - Shutdown keeps the current cycle. Restarting with actions still
//!     pending resumes WAITING_VALIDATION instead of MONITORING.
//!
//! The machine owns the current cycle's actions. It does no I/O; the
//! engine drives it and publishes the events it returns.

use crate::{
    action::{Action, ValidationStatus},
    error::{EngineError, EngineResult},
    event::EngineEvent,
    types::CycleId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineState {
    #[default]
    Idle,
    Monitoring,
    Analyzing,
    WaitingValidation,
    Error,
}

impl MachineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineState::Idle => "IDLE",
            MachineState::Monitoring => "MONITORING",
            MachineState::Analyzing => "ANALYZING",
            MachineState::WaitingValidation => "WAITING_VALIDATION",
            MachineState::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The cycle currently owned by the machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisCycle {
    pub cycle_id: CycleId,
    pub trigger_reason: String,
    pub actions: Vec<Action>,
}

impl AnalysisCycle {
    pub fn pending_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_pending()).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MachineSnapshot {
    pub state: MachineState,
    pub cycle: Option<AnalysisCycle>,
    pub last_error: Option<String>,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
}

#[derive(Debug, Default)]
pub struct RequalificationMachine {
    state: MachineState,
    cycle: Option<AnalysisCycle>,
    last_error: Option<String>,
    cycles_completed: u64,
    cycles_failed: u64,
}

impl RequalificationMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn cycle(&self) -> Option<&AnalysisCycle> {
        self.cycle.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            state: self.state,
            cycle: self.cycle.clone(),
            last_error: self.last_error.clone(),
            cycles_completed: self.cycles_completed,
            cycles_failed: self.cycles_failed,
        }
    }

    fn transition(&mut self, to: MachineState, reason: &str) -> EngineEvent {
        let from = self.state;
        self.state = to;
        log::info!("state {from} -> {to}: {reason}");
        EngineEvent::StateChanged {
            from,
            to,
            reason: reason.to_string(),
        }
    }

    fn refuse(&self, operation: &str) -> EngineError {
        EngineError::InvalidTransition {
            from: self.state.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn start(&mut self) -> EngineResult<Vec<EngineEvent>> {
        if self.state != MachineState::Idle {
            return Err(self.refuse("start"));
        }
        let pending = self.cycle.as_ref().map(|c| c.pending_count()).unwrap_or(0);
        let event = if pending > 0 {
            self.transition(
                MachineState::WaitingValidation,
                &format!("resumed with {pending} action(s) awaiting validation"),
            )
        } else {
            self.transition(MachineState::Monitoring, "monitoring started")
        };
        Ok(vec![event])
    }

    /// MONITORING → ANALYZING. Refused in every other state, which is what
    /// keeps analysis from ever running re-entrantly.
    pub fn begin_analysis(&mut self, cycle_id: &str, trigger_reason: &str) -> EngineResult<Vec<EngineEvent>> {
        if self.state != MachineState::Monitoring {
            return Err(self.refuse("run_analysis_cycle"));
        }
        self.cycle = Some(AnalysisCycle {
            cycle_id: cycle_id.to_string(),
            trigger_reason: trigger_reason.to_string(),
            actions: Vec::new(),
        });
        Ok(vec![
            self.transition(MachineState::Analyzing, trigger_reason),
            EngineEvent::AnalysisStarted {
                cycle_id: cycle_id.to_string(),
                trigger_reason: trigger_reason.to_string(),
            },
        ])
    }

    /// ANALYZING → WAITING_VALIDATION when actions were proposed,
    /// otherwise straight back to MONITORING.
    pub fn complete_analysis(&mut self, actions: Vec<Action>) -> EngineResult<Vec<EngineEvent>> {
        if self.state != MachineState::Analyzing {
            return Err(self.refuse("complete_analysis"));
        }
        self.cycles_completed += 1;
        self.last_error = None;
        let pending = actions.iter().filter(|a| a.is_pending()).count();
        if let Some(cycle) = self.cycle.as_mut() {
            cycle.actions = actions;
        }
        let event = if pending > 0 {
            self.transition(
                MachineState::WaitingValidation,
                &format!("{pending} action(s) awaiting validation"),
            )
        } else {
            self.transition(MachineState::Monitoring, "no action proposed")
        };
        Ok(vec![event])
    }

    /// ANALYZING → ERROR → MONITORING.
    pub fn fail_analysis(&mut self, error: &str) -> Vec<EngineEvent> {
        self.cycles_failed += 1;
        self.last_error = Some(error.to_string());
        let cycle_id = self
            .cycle
            .take()
            .map(|c| c.cycle_id)
            .unwrap_or_default();
        log::error!("cycle={cycle_id} analysis failed: {error}");
        vec![
            self.transition(MachineState::Error, error),
            EngineEvent::AnalysisFailed {
                cycle_id,
                error: error.to_string(),
            },
            self.transition(MachineState::Monitoring, "recovered after failed analysis"),
        ]
    }

    /// The pending action `action_id` of the current cycle.
    pub fn pending_action(&self, action_id: &str) -> EngineResult<&Action> {
        if self.state != MachineState::WaitingValidation {
            return Err(EngineError::GovernanceInvariantViolation {
                action_id: action_id.to_string(),
                reason: format!("no validation expected in state {}", self.state),
            });
        }
        let action = self
            .cycle
            .as_ref()
            .and_then(|c| c.actions.iter().find(|a| a.action_id == action_id))
            .ok_or_else(|| EngineError::GovernanceInvariantViolation {
                action_id: action_id.to_string(),
                reason: "unknown action".to_string(),
            })?;
        if !action.is_pending() {
            return Err(EngineError::GovernanceInvariantViolation {
                action_id: action_id.to_string(),
                reason: format!("already resolved as {:?}", action.validation),
            });
        }
        Ok(action)
    }

    /// Resolve one pending action. Returns to MONITORING once none remain.
    pub fn resolve(&mut self, action_id: &str, status: ValidationStatus) -> EngineResult<Vec<EngineEvent>> {
        self.pending_action(action_id)?;
        let remaining = match self.cycle.as_mut() {
            Some(cycle) => {
                if let Some(action) = cycle.actions.iter_mut().find(|a| a.action_id == action_id) {
                    action.resolve(status)?;
                }
                cycle.pending_count()
            }
            None => 0,
        };
        if remaining == 0 {
            Ok(vec![self.transition(MachineState::Monitoring, "all actions validated")])
        } else {
            log::debug!("{remaining} action(s) still pending");
            Ok(Vec::new())
        }
    }

    /// Any state → IDLE. Pending actions stay pending and undecided;
    /// `start` picks them up again.
    pub fn shutdown(&mut self) -> Vec<EngineEvent> {
        if self.state == MachineState::Idle {
            return Vec::new();
        }
        vec![self.transition(MachineState::Idle, "shutdown")]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, PriorityTier, RiskAction};

    fn pending(id: &str) -> Action {
        Action {
            action_id: id.to_string(),
            cycle_id: "c1".to_string(),
            kind: ActionKind::Risk(RiskAction::CollectionCall),
            title: "Collection call".to_string(),
            tier: PriorityTier::P1,
            counterparty_id: "A".to_string(),
            counterparty_name: "Counterparty A".to_string(),
            risk_ids: Vec::new(),
            impact_amount: 10_000.0,
            deadline: chrono::NaiveDate::from_ymd_opt(2026, 7, 5).unwrap(),
            priority_score: 50.0,
            impact_score: 50.0,
            ease_score: 50.0,
            urgency_score: 50.0,
            success_probability: 0.5,
            validation: ValidationStatus::Pending,
        }
    }

    #[test]
    fn analysis_refused_outside_monitoring() {
        let mut m = RequalificationMachine::new();
        assert!(m.begin_analysis("c1", "test").is_err(), "idle must refuse");
        m.start().unwrap();
        m.begin_analysis("c1", "test").unwrap();
        assert!(m.begin_analysis("c2", "again").is_err(), "analyzing must refuse");
    }

    #[test]
    fn failure_lands_in_monitoring() {
        let mut m = RequalificationMachine::new();
        m.start().unwrap();
        m.begin_analysis("c1", "test").unwrap();
        let events = m.fail_analysis("boom");
        assert_eq!(m.state(), MachineState::Monitoring);
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::AnalysisFailed { error, .. } if error == "boom")));
        assert_eq!(m.last_error(), Some("boom"));
    }

    #[test]
    fn restart_resumes_pending_validation() {
        let mut m = RequalificationMachine::new();
        m.start().unwrap();
        m.begin_analysis("c1", "test").unwrap();
        m.complete_analysis(vec![pending("a1"), pending("a2")]).unwrap();
        m.resolve("a1", ValidationStatus::Approved).unwrap();

        m.shutdown();
        assert_eq!(m.state(), MachineState::Idle);
        assert!(m.pending_action("a2").is_err(), "idle takes no validation");

        m.start().unwrap();
        assert_eq!(m.state(), MachineState::WaitingValidation);
        assert!(m.pending_action("a1").is_err(), "already resolved");
        m.resolve("a2", ValidationStatus::Rejected).unwrap();
        assert_eq!(m.state(), MachineState::Monitoring);

        m.shutdown();
        m.start().unwrap();
        assert_eq!(m.state(), MachineState::Monitoring, "nothing left to resume");
    }

    #[test]
    fn empty_cycle_returns_to_monitoring() {
        let mut m = RequalificationMachine::new();
        m.start().unwrap();
        m.begin_analysis("c1", "test").unwrap();
        m.complete_analysis(Vec::new()).unwrap();
        assert_eq!(m.state(), MachineState::Monitoring);
    }
}
