//! Monitoring task and event bus under a tokio runtime.

use cashdesk_core::{
    bus::EventBus,
    config::EngineConfig,
    engine::{AsOf, RiskEngine, TickOutcome},
    event::EngineEvent,
    governance::{DecisionKind, GovernanceLedger},
    monitor,
    receivable::{RawReceivable, SettlementStatus},
    source::InMemorySource,
    state_machine::MachineState,
};
use chrono::NaiveDate;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()
}

fn rows() -> Vec<RawReceivable> {
    ["A", "B", "C", "D"]
        .iter()
        .enumerate()
        .map(|(i, cp)| RawReceivable {
            counterparty_id: Some(cp.to_string()),
            counterparty_name: Some(format!("Counterparty {cp}")),
            invoice_id: Some(format!("INV-{cp}")),
            amount: Some(120_000.0),
            amount_paid: None,
            due_date: Some(as_of() - chrono::Duration::days(if i == 0 { 120 } else { 5 })),
            status: Some(SettlementStatus::Overdue),
            settlement_date: None,
        })
        .collect()
}

fn engine() -> RiskEngine {
    let ledger = GovernanceLedger::in_memory().expect("ledger");
    RiskEngine::build(EngineConfig::default_test(), Box::new(InMemorySource::new(rows())), ledger)
        .expect("engine")
        .with_as_of(AsOf::Fixed(as_of()))
}

#[tokio::test]
async fn monitor_runs_cycle_and_takes_validations() {
    let config = EngineConfig::default_test().monitor;
    let handle = monitor::spawn_monitor(engine(), &config);

    // The interval fires immediately, so the cycle may already have run.
    let outcome = handle.tick().await.expect("tick");
    assert!(matches!(
        outcome,
        TickOutcome::Analyzed { .. } | TickOutcome::NotMonitoring { state: MachineState::WaitingValidation }
    ));

    let snapshot = handle.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.state, MachineState::WaitingValidation);
    assert_eq!(snapshot.cycles_completed, 1, "no second cycle while waiting");
    let cycle = snapshot.cycle.expect("current cycle");

    for action in &cycle.actions {
        handle
            .validate(&action.action_id, DecisionKind::Approved, "cfo", None)
            .await
            .expect("validate");
    }
    let metrics = handle.metrics().await.expect("metrics");
    assert_eq!(metrics.approved as usize, cycle.actions.len());

    let engine = handle.shutdown().await.expect("shutdown");
    assert_eq!(engine.state(), MachineState::Idle);
}

#[tokio::test]
async fn monitor_reports_validation_errors() {
    let config = EngineConfig::default_test().monitor;
    let handle = monitor::spawn_monitor(engine(), &config);
    let _ = handle.tick().await.expect("tick");
    let err = handle.validate("missing", DecisionKind::Approved, "cfo", None).await;
    assert!(err.is_err());
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failing_handler_does_not_block_others() {
    let bus = EventBus::new(16);
    let seen = Arc::new(AtomicUsize::new(0));

    bus.spawn_handler("broken", |_| Err(anyhow::anyhow!("handler down")));
    bus.spawn_handler("panicky", |_| panic!("handler panicked"));
    let counter = seen.clone();
    bus.spawn_handler("counter", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    for i in 0..5 {
        let delivered = bus.publish(EngineEvent::CycleSkipped { reason: format!("quiet {i}") });
        assert_eq!(delivered, 3);
    }

    for _ in 0..100 {
        if seen.load(Ordering::SeqCst) == 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(seen.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn slow_subscriber_lags_instead_of_blocking() {
    let bus = EventBus::new(2);
    let mut rx = bus.subscribe();
    for i in 0..5 {
        bus.publish(EngineEvent::CycleSkipped { reason: format!("quiet {i}") });
    }
    assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
    match rx.recv().await {
        Ok(EngineEvent::CycleSkipped { reason }) => assert_eq!(reason, "quiet 3"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn publish_without_subscribers_is_fine() {
    let bus = EventBus::new(4);
    assert_eq!(bus.publish(EngineEvent::CycleSkipped { reason: "nobody".into() }), 0);
    assert_eq!(bus.subscriber_count(), 0);
}
