//! The risk engine: the surface the transport layer talks to.
//!
//! Owns the configuration, the receivable source, the governance ledger,
//! the event bus and the state machine. Every operation here is
//! synchronous; `monitor` wraps the engine in a tokio task for
//! scheduled evaluation.
//!
//! RULES:
//!   - Every state change is published on the bus.
//!   - A failure inside ANALYZING (error or panic) is contained here:
//!     the machine falls back to MONITORING and the failure is published
//!     and written to the audit trail.
//!   - Every "do nothing" trigger decision carries its reason.

use crate::{
    action::ValidationStatus,
    analytics::{margin, variance, BudgetLine, MarginBridge, ProductLine, VarianceReport},
    arbiter::{self, ArbitrationRequest, ArbitrationResult},
    bus::EventBus,
    config::EngineConfig,
    cycle::{self, AnalysisResult, CycleInputs},
    error::{EngineError, EngineResult},
    event::EngineEvent,
    governance::{DecisionKind, GovernanceLedger, GovernanceMetrics, OutcomeKind},
    portfolio::{CashPosition, PortfolioSnapshot},
    receivable::{self, RawReceivable},
    source::ReceivableSource,
    state_machine::{MachineSnapshot, MachineState, RequalificationMachine},
    stress::{self, StressRequest, StressResult},
    trigger::{self, TriggerDecision, TriggerInputs},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// The date receivables are aged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsOf {
    Fixed(NaiveDate),
    Today,
}

impl AsOf {
    pub fn resolve(&self) -> NaiveDate {
        match self {
            AsOf::Fixed(date) => *date,
            AsOf::Today => chrono::Local::now().date_naive(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationAck {
    pub action_id: String,
    pub decision: DecisionKind,
    pub decision_id: i64,
    pub state: MachineState,
    pub remaining_pending: usize,
}

/// What one scheduled evaluation did.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    NotMonitoring { state: MachineState },
    Skipped { reason: String },
    Analyzed { result: Box<AnalysisResult> },
    Failed { error: String },
}

pub struct RiskEngine {
    config: EngineConfig,
    source: Box<dyn ReceivableSource>,
    ledger: GovernanceLedger,
    bus: EventBus,
    machine: RequalificationMachine,
    cash: Option<CashPosition>,
    as_of: AsOf,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl RiskEngine {
    pub fn new(config: EngineConfig, source: Box<dyn ReceivableSource>, ledger: GovernanceLedger) -> Self {
        let bus = EventBus::new(config.monitor.event_capacity);
        Self {
            config,
            source,
            ledger,
            bus,
            machine: RequalificationMachine::new(),
            cash: None,
            as_of: AsOf::Today,
        }
    }

    /// Build an engine and move it to MONITORING.
    pub fn build(config: EngineConfig, source: Box<dyn ReceivableSource>, ledger: GovernanceLedger) -> EngineResult<Self> {
        let mut engine = Self::new(config, source, ledger);
        engine.start()?;
        Ok(engine)
    }

    pub fn with_as_of(mut self, as_of: AsOf) -> Self {
        self.as_of = as_of;
        self
    }

    pub fn with_cash_position(mut self, cash: CashPosition) -> Self {
        self.cash = Some(cash);
        self
    }

    pub fn set_as_of(&mut self, as_of: AsOf) {
        self.as_of = as_of;
    }

    pub fn set_cash_position(&mut self, cash: Option<CashPosition>) {
        self.cash = cash;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &GovernanceLedger {
        &self.ledger
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn state(&self) -> MachineState {
        self.machine.state()
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        self.machine.snapshot()
    }

    fn publish_all(&self, events: Vec<EngineEvent>) {
        for event in events {
            self.bus.publish(event);
        }
    }

    /// Audit writes never fail the operation they describe.
    fn audit<T: Serialize>(&self, event_type: &str, cycle_id: Option<&str>, action_id: Option<&str>, payload: &T) {
        if let Err(e) = self.ledger.audit(event_type, cycle_id, action_id, payload) {
            log::warn!("audit {event_type} not written: {e}");
        }
    }

    pub fn start(&mut self) -> EngineResult<()> {
        let events = self.machine.start()?;
        self.publish_all(events);
        Ok(())
    }

    /// Stop to IDLE. Actions still awaiting validation are listed in the
    /// audit trail and become reachable again after `start`.
    pub fn shutdown(&mut self) {
        if let Some(cycle) = self.machine.cycle() {
            let pending: Vec<&str> = cycle
                .actions
                .iter()
                .filter(|a| a.is_pending())
                .map(|a| a.action_id.as_str())
                .collect();
            if !pending.is_empty() && self.machine.state() != MachineState::Idle {
                log::warn!("cycle={} shutdown with {} action(s) pending", cycle.cycle_id, pending.len());
                self.audit(
                    "shutdown_with_pending",
                    Some(&cycle.cycle_id),
                    None,
                    &serde_json::json!({ "pending_actions": pending }),
                );
            }
        }
        let events = self.machine.shutdown();
        self.publish_all(events);
    }

    // ── Trigger ────────────────────────────────────────────────

    /// Full trigger decision. Missing data is a skip with a reason, never an error.
    pub fn trigger_decision(&self) -> TriggerDecision {
        let decision = match self.source.load() {
            Ok(raws) => self.decide(&raws),
            Err(EngineError::DataUnavailable { reason }) => {
                TriggerDecision::skipped(format!("no trigger: data unavailable ({reason})"), "")
            }
            Err(e) => TriggerDecision::skipped(format!("no trigger: data load failed ({e})"), ""),
        };
        if decision.fired {
            log::info!("trigger fired: {}", decision.reason);
        } else {
            log::info!("cycle skipped: {}", decision.reason);
        }
        self.bus.publish(EngineEvent::TriggerEvaluated {
            fired: decision.fired,
            reason: decision.reason.clone(),
        });
        if !decision.fired {
            self.bus.publish(EngineEvent::CycleSkipped {
                reason: decision.reason.clone(),
            });
            self.audit("cycle_skipped", None, None, &decision);
        }
        decision
    }

    fn decide(&self, raws: &[RawReceivable]) -> TriggerDecision {
        let data_hash = receivable::content_hash(raws);
        let batch = receivable::normalize(raws, self.as_of.resolve());
        if batch.records.is_empty() {
            return TriggerDecision::skipped(
                format!(
                    "no trigger: all {} records failed validation",
                    batch.excluded_count()
                ),
                data_hash,
            );
        }
        let prior = match self.ledger.prior_baseline() {
            Ok(prior) => prior,
            Err(e) => {
                return TriggerDecision::skipped(format!("no trigger: ledger unreadable ({e})"), data_hash);
            }
        };
        let snapshot = PortfolioSnapshot::from_records(&batch.records);
        trigger::evaluate(
            &TriggerInputs {
                records: &batch.records,
                snapshot: &snapshot,
                data_hash: &data_hash,
                prior: prior.as_ref(),
            },
            &self.config.trigger,
        )
    }

    /// `(fired, reason)`.
    pub fn evaluate_trigger(&self) -> (bool, String) {
        let decision = self.trigger_decision();
        (decision.fired, decision.reason)
    }

    // ── Analysis ───────────────────────────────────────────────

    pub fn run_analysis_cycle(&mut self, trigger_reason: &str) -> EngineResult<AnalysisResult> {
        let cycle_id = format!("cycle-{}", uuid::Uuid::new_v4().simple());
        let events = self.machine.begin_analysis(&cycle_id, trigger_reason)?;
        self.publish_all(events);
        self.audit(
            "analysis_started",
            Some(&cycle_id),
            None,
            &serde_json::json!({ "trigger_reason": trigger_reason }),
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| self.analyze(&cycle_id, trigger_reason)));
        let failure = match outcome {
            Ok(Ok(result)) => {
                let events = self.machine.complete_analysis(result.actions.clone())?;
                self.publish_all(events);
                self.bus.publish(EngineEvent::AnalysisCompleted {
                    cycle_id: cycle_id.clone(),
                    risk_count: result.risks.len(),
                    critical_count: result.metrics.risk_counts.critical,
                    action_count: result.actions.len(),
                });
                log::info!(
                    "cycle={cycle_id} complete: {} risks, {} actions",
                    result.risks.len(),
                    result.actions.len()
                );
                return Ok(result);
            }
            Ok(Err(EngineError::AnalysisFailure { reason, .. })) => reason,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("panic: {}", panic_message(payload.as_ref())),
        };

        let events = self.machine.fail_analysis(&failure);
        self.publish_all(events);
        self.audit(
            "analysis_failed",
            Some(&cycle_id),
            None,
            &serde_json::json!({ "error": failure }),
        );
        Err(EngineError::AnalysisFailure {
            cycle_id,
            reason: failure,
        })
    }

    fn analyze(&self, cycle_id: &str, trigger_reason: &str) -> EngineResult<AnalysisResult> {
        let raws = self.source.load()?;
        let data_hash = receivable::content_hash(&raws);
        let prior = self.ledger.prior_baseline()?;
        let output = cycle::run(&CycleInputs {
            cycle_id,
            as_of: self.as_of.resolve(),
            trigger_reason,
            raws: &raws,
            data_hash: &data_hash,
            cash: self.cash.as_ref(),
            prior: prior.as_ref(),
            config: &self.config,
        })?;
        self.ledger.record_analysis(
            cycle_id,
            trigger_reason,
            &data_hash,
            &output.result.risks,
            &output.result.actions,
            &output.summary,
        )?;
        Ok(output.result)
    }

    /// One scheduled evaluation: evaluate the trigger while MONITORING
    /// and run a cycle if it fires.
    pub fn tick(&mut self) -> TickOutcome {
        let state = self.machine.state();
        if state != MachineState::Monitoring {
            log::debug!("tick: state {state}, evaluation skipped");
            return TickOutcome::NotMonitoring { state };
        }
        let decision = self.trigger_decision();
        if !decision.fired {
            return TickOutcome::Skipped { reason: decision.reason };
        }
        match self.run_analysis_cycle(&decision.reason) {
            Ok(result) => TickOutcome::Analyzed { result: Box::new(result) },
            Err(e) => TickOutcome::Failed { error: e.to_string() },
        }
    }

    // ── Governance ─────────────────────────────────────────────

    /// Record a human decision on a pending action of the current cycle.
    pub fn record_validation(
        &mut self,
        action_id: &str,
        decision: DecisionKind,
        actor: &str,
        comment: Option<&str>,
    ) -> EngineResult<ValidationAck> {
        let cycle_id = self.machine.pending_action(action_id)?.cycle_id.clone();
        let decision_id = self
            .ledger
            .record_decision(action_id, &cycle_id, decision, actor, comment)?;

        let status = match decision {
            DecisionKind::Approved => Some(ValidationStatus::Approved),
            DecisionKind::Rejected => Some(ValidationStatus::Rejected),
            DecisionKind::Deferred => None,
        };
        if let Some(status) = status {
            let events = self.machine.resolve(action_id, status)?;
            self.publish_all(events);
        }
        self.bus.publish(EngineEvent::ActionValidated {
            cycle_id: cycle_id.clone(),
            action_id: action_id.to_string(),
            decision,
            actor: actor.to_string(),
        });
        self.audit(
            "action_validated",
            Some(&cycle_id),
            Some(action_id),
            &serde_json::json!({ "decision": decision, "actor": actor, "comment": comment }),
        );
        Ok(ValidationAck {
            action_id: action_id.to_string(),
            decision,
            decision_id,
            state: self.machine.state(),
            remaining_pending: self.machine.cycle().map(|c| c.pending_count()).unwrap_or(0),
        })
    }

    pub fn record_outcome(
        &self,
        action_id: &str,
        outcome: OutcomeKind,
        recovered_amount: Option<f64>,
        notes: Option<&str>,
    ) -> EngineResult<i64> {
        let id = self
            .ledger
            .record_outcome(action_id, outcome, recovered_amount, notes)?;
        self.bus.publish(EngineEvent::OutcomeRecorded {
            action_id: action_id.to_string(),
            outcome,
        });
        Ok(id)
    }

    pub fn get_governance_metrics(&self) -> EngineResult<GovernanceMetrics> {
        self.ledger.metrics()
    }

    // ── Quantitative analysis ──────────────────────────────────

    pub fn run_stress_test(&self, request: &StressRequest) -> EngineResult<StressResult> {
        let result = stress::run_stress_test(request, &self.config.stress)?;
        self.bus.publish(EngineEvent::StressTestCompleted {
            prob_negative: result.monte_carlo.prob_negative,
            value_at_risk: result.monte_carlo.value_at_risk,
            worst_case: result.worst_case.clone(),
        });
        self.audit(
            "stress_test",
            None,
            None,
            &serde_json::json!({
                "seed": result.monte_carlo.seed,
                "simulations": result.monte_carlo.simulations,
                "prob_negative": result.monte_carlo.prob_negative,
                "value_at_risk": result.monte_carlo.value_at_risk,
                "worst_case": result.worst_case,
            }),
        );
        Ok(result)
    }

    pub fn arbitrate(&self, request: &ArbitrationRequest) -> ArbitrationResult {
        let result = arbiter::arbitrate(request, &self.config.arbiter);
        self.audit(
            "arbitration",
            None,
            None,
            &serde_json::json!({
                "decision_type": result.decision_type,
                "recommendation": result.recommendation,
                "cost_gap": result.cost_gap,
            }),
        );
        result
    }

    pub fn analyze_variance(&self, lines: &[BudgetLine]) -> VarianceReport {
        variance::analyze(lines)
    }

    pub fn margin_bridge(&self, prior: &[ProductLine], current: &[ProductLine]) -> MarginBridge {
        margin::bridge(prior, current)
    }
}
