//! Scheduled trigger evaluation.
//!
//! The monitor task owns the engine. It wakes on a fixed interval,
//! evaluates the trigger while MONITORING and runs a cycle when it
//! fires. Human decisions and snapshot requests reach the engine through
//! the command channel, so the engine is only ever touched from this
//! one task and never runs two cycles at once.

use crate::{
    config::MonitorConfig,
    engine::{RiskEngine, TickOutcome, ValidationAck},
    error::{EngineError, EngineResult},
    governance::{DecisionKind, GovernanceMetrics},
    state_machine::MachineSnapshot,
};
use std::time::Duration;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

pub enum MonitorCommand {
    /// Evaluate now instead of waiting for the next interval.
    Tick {
        reply: oneshot::Sender<TickOutcome>,
    },
    Validate {
        action_id: String,
        decision: DecisionKind,
        actor: String,
        comment: Option<String>,
        reply: oneshot::Sender<EngineResult<ValidationAck>>,
    },
    Snapshot {
        reply: oneshot::Sender<MachineSnapshot>,
    },
    Metrics {
        reply: oneshot::Sender<EngineResult<GovernanceMetrics>>,
    },
    Shutdown,
}

/// Caller side of a running monitor.
pub struct MonitorHandle {
    tx: mpsc::Sender<MonitorCommand>,
    join: JoinHandle<RiskEngine>,
}

fn stopped() -> EngineError {
    EngineError::Other(anyhow::anyhow!("monitor stopped"))
}

impl MonitorHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> MonitorCommand) -> EngineResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }

    pub async fn tick(&self) -> EngineResult<TickOutcome> {
        self.request(|reply| MonitorCommand::Tick { reply }).await
    }

    pub async fn validate(
        &self,
        action_id: &str,
        decision: DecisionKind,
        actor: &str,
        comment: Option<&str>,
    ) -> EngineResult<ValidationAck> {
        self.request(|reply| MonitorCommand::Validate {
            action_id: action_id.to_string(),
            decision,
            actor: actor.to_string(),
            comment: comment.map(str::to_string),
            reply,
        })
        .await?
    }

    pub async fn snapshot(&self) -> EngineResult<MachineSnapshot> {
        self.request(|reply| MonitorCommand::Snapshot { reply }).await
    }

    pub async fn metrics(&self) -> EngineResult<GovernanceMetrics> {
        self.request(|reply| MonitorCommand::Metrics { reply }).await?
    }

    /// Stop the loop and get the engine back, shut down to IDLE.
    pub async fn shutdown(self) -> EngineResult<RiskEngine> {
        // A closed channel means the loop already ended.
        let _ = self.tx.send(MonitorCommand::Shutdown).await;
        self.join
            .await
            .map_err(|e| EngineError::Other(anyhow::anyhow!("monitor task failed: {e}")))
    }
}

/// Start the monitoring loop. Must be called from within a tokio runtime.
pub fn spawn_monitor(mut engine: RiskEngine, config: &MonitorConfig) -> MonitorHandle {
    let (tx, mut rx) = mpsc::channel(config.command_capacity.max(1));
    let period = Duration::from_secs(config.interval_secs.max(1));

    let join = tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!("monitor started, interval {}s", period.as_secs());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match engine.tick() {
                        TickOutcome::Analyzed { result } => {
                            log::info!("monitor: cycle={} ran, {} action(s)", result.cycle_id, result.actions.len());
                        }
                        TickOutcome::Failed { error } => log::warn!("monitor: {error}"),
                        TickOutcome::Skipped { .. } | TickOutcome::NotMonitoring { .. } => {}
                    }
                }
                command = rx.recv() => match command {
                    Some(MonitorCommand::Tick { reply }) => {
                        let _ = reply.send(engine.tick());
                    }
                    Some(MonitorCommand::Validate { action_id, decision, actor, comment, reply }) => {
                        let ack = engine.record_validation(&action_id, decision, &actor, comment.as_deref());
                        let _ = reply.send(ack);
                    }
                    Some(MonitorCommand::Snapshot { reply }) => {
                        let _ = reply.send(engine.snapshot());
                    }
                    Some(MonitorCommand::Metrics { reply }) => {
                        let _ = reply.send(engine.get_governance_metrics());
                    }
                    Some(MonitorCommand::Shutdown) | None => break,
                },
            }
        }
        engine.shutdown();
        log::info!("monitor stopped");
        engine
    });

    MonitorHandle { tx, join }
}
