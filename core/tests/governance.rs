//! Governance ledger: append-only history and calibration metrics.

use cashdesk_core::{
    action::{Action, ActionKind, PriorityTier, RiskAction, ValidationStatus},
    error::EngineError,
    governance::{AnalysisSummary, DecisionKind, GovernanceLedger, OutcomeKind},
};
use chrono::NaiveDate;
use proptest::prelude::*;

fn ledger() -> GovernanceLedger {
    GovernanceLedger::in_memory().expect("in-memory ledger")
}

fn action(id: &str, cycle_id: &str) -> Action {
    Action {
        action_id: id.to_string(),
        cycle_id: cycle_id.to_string(),
        kind: ActionKind::Risk(RiskAction::FormalNotice),
        title: "Send formal payment notice".to_string(),
        tier: PriorityTier::P1,
        counterparty_id: "A".to_string(),
        counterparty_name: "Counterparty A".to_string(),
        risk_ids: Vec::new(),
        impact_amount: 25_000.0,
        deadline: NaiveDate::from_ymd_opt(2026, 7, 3).unwrap(),
        priority_score: 60.0,
        impact_score: 70.0,
        ease_score: 40.0,
        urgency_score: 80.0,
        success_probability: 0.6,
        validation: ValidationStatus::Pending,
    }
}

/// A ledger holding one analysis of `cycle_id` that proposed `ids`.
fn ledger_with(cycle_id: &str, ids: &[String]) -> GovernanceLedger {
    let l = ledger();
    let actions: Vec<Action> = ids.iter().map(|id| action(id, cycle_id)).collect();
    l.record_analysis(cycle_id, "test", "hash", &[], &actions, &AnalysisSummary::default())
        .expect("analysis");
    l
}

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn empty_ledger_metrics_are_zero() {
    let m = ledger().metrics().expect("metrics");
    assert_eq!(m.total_decisions, 0);
    assert_eq!(m.approval_rate, 0.0);
    assert_eq!(m.accuracy_rate, 0.0);
    assert_eq!(m.false_positive_rate, 0.0);
    assert_eq!(m.pending_outcome_count, 0);
    assert_eq!(m.analyses_recorded, 0);
}

#[test]
fn metrics_follow_recorded_history() {
    let l = ledger_with("c1", &ids(&["a1", "a2", "a3"]));
    l.record_decision("a1", "c1", DecisionKind::Approved, "cfo", None).unwrap();
    l.record_decision("a2", "c1", DecisionKind::Rejected, "cfo", Some("client paid")).unwrap();
    l.record_decision("a3", "c1", DecisionKind::Deferred, "cfo", None).unwrap();
    l.record_decision("a3", "c1", DecisionKind::Approved, "cfo", None).unwrap();
    l.record_outcome("a1", OutcomeKind::Confirmed, Some(12_000.0), None).unwrap();

    let m = l.metrics().unwrap();
    assert_eq!(m.total_decisions, 4);
    assert_eq!(m.approved, 2);
    assert_eq!(m.rejected, 1);
    assert_eq!(m.deferred, 1);
    assert!((m.approval_rate - 50.0).abs() < 1e-9);
    assert_eq!(m.total_outcomes, 1);
    assert!((m.accuracy_rate - 100.0).abs() < 1e-9);
    assert_eq!(m.false_positive_rate, 0.0);
    assert_eq!(m.pending_outcome_count, 1, "a3 approved without outcome");
}

#[test]
fn second_final_decision_is_refused() {
    let l = ledger_with("c1", &ids(&["a1"]));
    l.record_decision("a1", "c1", DecisionKind::Approved, "cfo", None).unwrap();
    let err = l
        .record_decision("a1", "c1", DecisionKind::Rejected, "ceo", None)
        .unwrap_err();
    assert!(matches!(err, EngineError::GovernanceInvariantViolation { .. }));
    assert_eq!(l.decisions_for("a1").unwrap().len(), 1);
}

#[test]
fn outcome_requires_a_final_decision() {
    let l = ledger_with("c1", &ids(&["a1"]));
    let err = l
        .record_outcome("ghost", OutcomeKind::Confirmed, None, None)
        .unwrap_err();
    assert!(matches!(err, EngineError::GovernanceInvariantViolation { .. }));

    l.record_decision("a1", "c1", DecisionKind::Deferred, "cfo", None).unwrap();
    assert!(l.record_outcome("a1", OutcomeKind::Confirmed, None, None).is_err());
}

#[test]
fn ledger_rows_cannot_be_updated_or_deleted() {
    let l = ledger_with("c1", &ids(&["a1"]));
    l.record_decision("a1", "c1", DecisionKind::Approved, "cfo", None).unwrap();
    l.record_outcome("a1", OutcomeKind::FalsePositive, None, Some("paid next day")).unwrap();
    l.audit("note", None, None, &serde_json::json!({ "k": 1 })).unwrap();

    let store = l.store();
    assert!(store.execute_raw("UPDATE decisions SET decision = 'rejected'").is_err());
    assert!(store.execute_raw("DELETE FROM decisions").is_err());
    assert!(store.execute_raw("UPDATE outcomes SET outcome = 'confirmed'").is_err());
    assert!(store.execute_raw("DELETE FROM outcomes").is_err());
    assert!(store.execute_raw("DELETE FROM audit_trail").is_err());

    let decisions = l.decisions_for("a1").unwrap();
    assert_eq!(decisions[0].decision, DecisionKind::Approved);
    assert_eq!(l.outcomes_for("a1").unwrap()[0].outcome, OutcomeKind::FalsePositive);
}

#[test]
fn decision_needs_an_action_of_a_recorded_cycle() {
    let l = ledger_with("c1", &ids(&["a1"]));
    let unknown = l.record_decision("ghost", "c1", DecisionKind::Approved, "cfo", None);
    assert!(matches!(unknown, Err(EngineError::GovernanceInvariantViolation { .. })));
    let wrong_cycle = l.record_decision("a1", "c9", DecisionKind::Approved, "cfo", None);
    assert!(matches!(wrong_cycle, Err(EngineError::GovernanceInvariantViolation { .. })));
    assert_eq!(l.metrics().unwrap().total_decisions, 0);

    l.record_decision("a1", "c1", DecisionKind::Approved, "cfo", None).unwrap();
    assert_eq!(l.metrics().unwrap().total_decisions, 1);
}

#[test]
fn analyses_round_trip_and_feed_the_baseline() {
    let l = ledger();
    assert!(l.prior_baseline().unwrap().is_none());
    let summary = AnalysisSummary {
        weighted_days_overdue: 42.0,
        critical_invoices: vec!["INV-1".into()],
        ..Default::default()
    };
    l.record_analysis("c1", "first cycle", "hash-1", &[], &[], &summary).unwrap();
    assert!(l.record_analysis("c1", "again", "hash-1", &[], &[], &summary).is_err(), "cycle ids are unique");

    let entry = l.analysis("c1").unwrap().expect("stored");
    assert_eq!(entry.summary, summary);
    let prior = l.prior_baseline().unwrap().expect("baseline");
    assert_eq!(prior.cycle_id, "c1");
    assert_eq!(prior.data_hash, "hash-1");
    assert!(prior.critical_invoices.contains("INV-1"));
    assert_eq!(l.metrics().unwrap().analyses_recorded, 1);
}

#[test]
fn audit_trail_is_chronological() {
    let l = ledger();
    for i in 0..5 {
        l.audit("tick", None, None, &serde_json::json!({ "i": i })).unwrap();
    }
    let trail = l.audit_trail(3).unwrap();
    assert_eq!(trail.len(), 3);
    assert!(trail.windows(2).all(|w| w[0].id < w[1].id));
    assert!(trail.last().unwrap().payload.contains("\"i\":4"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Rates stay within [0, 100] whatever the history.
    #[test]
    fn rates_are_bounded(
        decisions in prop::collection::vec(0u8..3, 0..20),
        outcomes in prop::collection::vec(0u8..3, 0..20),
    ) {
        let names: Vec<String> = (0..decisions.len()).map(|i| format!("a{i}")).collect();
        let l = ledger_with("c", &names);
        for (i, d) in decisions.iter().enumerate() {
            let kind = match d {
                0 => DecisionKind::Approved,
                1 => DecisionKind::Rejected,
                _ => DecisionKind::Deferred,
            };
            l.record_decision(&format!("a{i}"), "c", kind, "cfo", None).unwrap();
        }
        for (i, o) in outcomes.iter().enumerate() {
            let kind = match o {
                0 => OutcomeKind::Confirmed,
                1 => OutcomeKind::FalsePositive,
                _ => OutcomeKind::Inconclusive,
            };
            // Only actions with a final decision accept outcomes.
            let _ = l.record_outcome(&format!("a{i}"), kind, None, None);
        }
        let m = l.metrics().unwrap();
        for rate in [m.approval_rate, m.accuracy_rate, m.false_positive_rate] {
            prop_assert!((0.0..=100.0).contains(&rate));
        }
        prop_assert!(m.pending_outcome_count <= m.approved);
    }
}
