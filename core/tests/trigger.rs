//! Trigger predicate: order of conditions and skip explanations.

use cashdesk_core::{
    config::TriggerConfig,
    governance::PriorBaseline,
    portfolio::PortfolioSnapshot,
    receivable::{self, RawReceivable, ReceivableRecord, SettlementStatus},
    trigger::{self, TriggerCondition, TriggerDecision, TriggerInputs},
};
use chrono::NaiveDate;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()
}

fn row(cp: &str, amount: f64, days_overdue: i64) -> RawReceivable {
    RawReceivable {
        counterparty_id: Some(cp.to_string()),
        counterparty_name: Some(format!("Counterparty {cp}")),
        invoice_id: Some(format!("INV-{cp}")),
        amount: Some(amount),
        amount_paid: None,
        due_date: Some(as_of() - chrono::Duration::days(days_overdue)),
        status: Some(SettlementStatus::Overdue),
        settlement_date: None,
    }
}

fn records(rows: &[RawReceivable]) -> Vec<ReceivableRecord> {
    receivable::normalize(rows, as_of()).records
}

fn evaluate(records: &[ReceivableRecord], hash: &str, prior: Option<&PriorBaseline>) -> TriggerDecision {
    let snapshot = PortfolioSnapshot::from_records(records);
    trigger::evaluate(
        &TriggerInputs { records, snapshot: &snapshot, data_hash: hash, prior },
        &TriggerConfig::default(),
    )
}

fn even_book(days: i64) -> Vec<ReceivableRecord> {
    records(&["A", "B", "C", "D", "E"].map(|cp| row(cp, 100_000.0, days)))
}

fn baseline_for(records: &[ReceivableRecord], hash: &str) -> PriorBaseline {
    let snapshot = PortfolioSnapshot::from_records(records);
    PriorBaseline {
        cycle_id: "cycle-1".into(),
        data_hash: hash.into(),
        weighted_days_overdue: snapshot.weighted_days_overdue,
        critical_invoices: records
            .iter()
            .filter(|r| r.days_overdue > 90)
            .map(|r| r.invoice_id.clone())
            .collect(),
        ..Default::default()
    }
}

#[test]
fn first_cycle_fires_on_quiet_data() {
    let book = even_book(10);
    let decision = evaluate(&book, "abcdef0123456789", None);
    assert!(decision.fired);
    assert_eq!(decision.condition, Some(TriggerCondition::FirstCycle));
    assert!(decision.reason.starts_with("first cycle"), "{}", decision.reason);
    assert!(decision.reason.contains("abcdef012345"));
}

#[test]
fn concentration_outranks_first_cycle() {
    let book = records(&[row("A", 500_000.0, 10), row("B", 100_000.0, 10)]);
    let decision = evaluate(&book, "h", None);
    assert_eq!(decision.condition, Some(TriggerCondition::Concentration));
    assert!(decision.reason.starts_with("critical concentration"), "{}", decision.reason);
    assert_eq!(
        decision.conditions,
        vec![TriggerCondition::Concentration, TriggerCondition::FirstCycle]
    );
}

#[test]
fn immaterial_critical_exposure_does_not_fire() {
    let book = records(&[
        row("A", 30_000.0, 120),
        row("B", 100_000.0, 5),
        row("C", 100_000.0, 5),
        row("D", 100_000.0, 5),
    ]);
    let decision = evaluate(&book, "h", None);
    assert!(!decision.conditions.contains(&TriggerCondition::CriticalOverdue));
    assert_eq!(decision.condition, Some(TriggerCondition::FirstCycle));
}

#[test]
fn quiet_book_explains_every_condition() {
    let book = even_book(10);
    let prior = baseline_for(&book, "same");
    let decision = evaluate(&book, "same", Some(&prior));
    assert!(!decision.fired);
    assert!(decision.conditions.is_empty());
    let reason = &decision.reason;
    assert!(reason.starts_with("no trigger: "), "{reason}");
    assert!(reason.contains("newly critical overdue 0"), "{reason}");
    assert!(reason.contains("top concentration 20.0%"), "{reason}");
    assert!(reason.contains("aging drift +0.0 days"), "{reason}");
    assert!(reason.contains("data unchanged since cycle cycle-1"), "{reason}");
}

#[test]
fn already_critical_invoices_do_not_refire() {
    let book = records(&[
        row("A", 100_000.0, 95),
        row("B", 100_000.0, 10),
        row("C", 100_000.0, 10),
        row("D", 100_000.0, 10),
    ]);
    let fresh = evaluate(&book, "h", None);
    assert_eq!(fresh.condition, Some(TriggerCondition::CriticalOverdue));

    let prior = baseline_for(&book, "h-old");
    let again = evaluate(&book, "h-new", Some(&prior));
    assert!(!again.fired, "{}", again.reason);
    assert!(again.reason.contains("data changed since cycle cycle-1 but no threshold crossed"));
}

#[test]
fn aging_drift_fires_past_threshold() {
    let before = even_book(10);
    let prior = baseline_for(&before, "old");
    let after = even_book(20);
    let decision = evaluate(&after, "new", Some(&prior));
    assert_eq!(decision.condition, Some(TriggerCondition::AgingDrift));
    assert!(decision.reason.contains("up 10.0 days"), "{}", decision.reason);
}
