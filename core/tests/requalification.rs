//! Requalification end to end: raw rows in, CERTAIN / UNCERTAIN / CRITICAL out.

use cashdesk_core::{
    config::EngineConfig,
    engine::{AsOf, RiskEngine},
    governance::GovernanceLedger,
    portfolio::PortfolioSnapshot,
    receivable::{self, RawReceivable, SettlementStatus},
    requalification::{self, RiskStatus},
    source::InMemorySource,
    state_machine::MachineState,
};
use chrono::NaiveDate;
use proptest::prelude::*;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()
}

fn row(cp: &str, invoice: &str, amount: f64, days_overdue: i64) -> RawReceivable {
    RawReceivable {
        counterparty_id: Some(cp.to_string()),
        counterparty_name: Some(format!("Counterparty {cp}")),
        invoice_id: Some(invoice.to_string()),
        amount: Some(amount),
        amount_paid: None,
        due_date: Some(as_of() - chrono::Duration::days(days_overdue)),
        status: Some(if days_overdue > 0 {
            SettlementStatus::Overdue
        } else {
            SettlementStatus::Open
        }),
        settlement_date: None,
    }
}

/// A 600k at 95 days, B 40k at 10 days, C 300k at 50 days plus a
/// not-yet-due invoice that brings C to 45% of outstanding.
fn scenario_one() -> Vec<RawReceivable> {
    vec![
        row("A", "INV-A", 600_000.0, 95),
        row("B", "INV-B", 40_000.0, 10),
        row("C", "INV-C", 300_000.0, 50),
        row("C", "INV-C-NEXT", 224_000.0, -30),
    ]
}

fn engine_with(rows: Vec<RawReceivable>) -> RiskEngine {
    let ledger = GovernanceLedger::in_memory().expect("ledger");
    RiskEngine::build(EngineConfig::default_test(), Box::new(InMemorySource::new(rows)), ledger)
        .expect("engine")
        .with_as_of(AsOf::Fixed(as_of()))
}

#[test]
fn scenario_one_requalifies_age_and_concentration() {
    let mut engine = engine_with(scenario_one());

    let (fired, reason) = engine.evaluate_trigger();
    assert!(fired, "trigger should fire: {reason}");
    assert!(reason.contains("critical"), "reason should name a critical condition: {reason}");
    assert!(!reason.contains(';'), "exactly one reason expected: {reason}");

    let result = engine.run_analysis_cycle(&reason).expect("cycle");
    let status_of = |invoice: &str| {
        result
            .risks
            .iter()
            .find(|r| r.invoice_id == invoice)
            .map(|r| r.status)
    };

    assert_eq!(status_of("INV-A"), Some(RiskStatus::Critical));
    assert_eq!(status_of("INV-B"), None, "B is below materiality");
    assert_eq!(status_of("INV-C"), Some(RiskStatus::Critical));

    let c = result.risks.iter().find(|r| r.invoice_id == "INV-C").unwrap();
    assert!((c.portfolio_share - 0.45).abs() < 0.001, "C share {}", c.portfolio_share);
    assert!(c.justification.contains("concentration"), "{}", c.justification);

    let a = result.risks.iter().find(|r| r.invoice_id == "INV-A").unwrap();
    assert!(a.justification.contains("95 days overdue"), "{}", a.justification);

    assert!(!result.actions.is_empty() && result.actions.len() <= 3);
    assert_eq!(engine.state(), MachineState::WaitingValidation);
}

#[test]
fn risks_sorted_by_priority() {
    let mut engine = engine_with(scenario_one());
    let result = engine.run_analysis_cycle("manual").expect("cycle");
    for pair in result.risks.windows(2) {
        assert!(pair[0].priority_score >= pair[1].priority_score);
    }
    for risk in &result.risks {
        assert!((0.0..=100.0).contains(&risk.priority_score));
        assert!((0.0..=1.0).contains(&risk.loss_probability));
    }
}

#[test]
fn malformed_rows_are_excluded_not_fatal() {
    let mut rows = scenario_one();
    rows.push(RawReceivable {
        counterparty_id: Some("E".into()),
        invoice_id: Some("INV-E".into()),
        amount: None,
        ..Default::default()
    });
    let mut engine = engine_with(rows);
    let result = engine.run_analysis_cycle("manual").expect("cycle");
    assert_eq!(result.metrics.excluded_records, 1);
    assert!(result.issues.iter().any(|i| i.invoice_id == "INV-E"));
    assert!(result.risks.iter().all(|r| r.invoice_id != "INV-E"));
}

proptest! {
    /// Age alone puts a receivable in CRITICAL, whatever its amount.
    #[test]
    fn critical_age_always_critical(
        amount in 1.0f64..2_000_000.0,
        days in 91i64..720,
        other in 10_000.0f64..5_000_000.0,
    ) {
        let config = EngineConfig::default_test();
        let raws = vec![row("X", "INV-X", amount, days), row("Y", "INV-Y", other, 0)];
        let batch = receivable::normalize(&raws, as_of());
        let snapshot = PortfolioSnapshot::from_records(&batch.records);
        let assessments = requalification::assess_counterparties(&batch.records, &snapshot, as_of(), &config.warnings);
        let risks = requalification::requalify(&batch.records, &snapshot, &assessments, &config.requalification);
        let x = risks.iter().find(|r| r.invoice_id == "INV-X");
        prop_assert!(x.is_some(), "critically aged receivable was filtered out");
        prop_assert_eq!(x.unwrap().status, RiskStatus::Critical);
    }

    /// Small, young, diluted receivables never enter the risk list.
    #[test]
    fn immaterial_young_receivable_skipped(
        amount in 1.0f64..49_999.0,
        days in 0i64..90,
    ) {
        let config = EngineConfig::default_test();
        let raws = vec![
            row("X", "INV-X", amount, days),
            row("Y", "INV-Y", 400_000.0, 0),
            row("Z", "INV-Z", 400_000.0, 0),
            row("W", "INV-W", 400_000.0, 0),
        ];
        let batch = receivable::normalize(&raws, as_of());
        let snapshot = PortfolioSnapshot::from_records(&batch.records);
        let assessments = requalification::assess_counterparties(&batch.records, &snapshot, as_of(), &config.warnings);
        let risks = requalification::requalify(&batch.records, &snapshot, &assessments, &config.requalification);
        prop_assert!(risks.iter().all(|r| r.invoice_id != "INV-X"));
    }
}
