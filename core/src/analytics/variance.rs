//! Budget versus actual variance.
//!
//! Sign convention: a line is favourable when it helps profit, i.e.
//! revenue above budget or cost below budget. `profit_impact` carries
//! that sign, so summing it over all lines gives the net profit variance.

use crate::stats;
use serde::{Deserialize, Serialize};

/// A variance is material when it exceeds both thresholds.
pub const MATERIAL_PCT: f64 = 0.05;
pub const MATERIAL_AMOUNT: f64 = 5_000.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Revenue,
    Cost,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetLine {
    pub label: String,
    pub kind: LineKind,
    pub budget: f64,
    pub actual: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VarianceLine {
    pub label: String,
    pub kind: LineKind,
    pub budget: f64,
    pub actual: f64,
    /// actual − budget
    pub variance: f64,
    /// variance / |budget|; None for a zero budget.
    pub variance_pct: Option<f64>,
    pub profit_impact: f64,
    pub favourable: bool,
    pub material: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VarianceReport {
    /// Sorted by absolute profit impact, largest first.
    pub lines: Vec<VarianceLine>,
    pub revenue_variance: f64,
    pub cost_variance: f64,
    pub net_profit_impact: f64,
    pub material_count: usize,
    pub findings: Vec<String>,
}

pub fn analyze_line(line: &BudgetLine) -> VarianceLine {
    let variance = line.actual - line.budget;
    let variance_pct = (line.budget.abs() > f64::EPSILON).then(|| variance / line.budget.abs());
    let profit_impact = match line.kind {
        LineKind::Revenue => variance,
        LineKind::Cost => -variance,
    };
    // A zero budget line with any spend is material if the amount is.
    let pct_material = variance_pct.map_or(true, |p| p.abs() >= MATERIAL_PCT);
    VarianceLine {
        label: line.label.clone(),
        kind: line.kind,
        budget: line.budget,
        actual: line.actual,
        variance,
        variance_pct,
        profit_impact,
        favourable: profit_impact >= 0.0,
        material: pct_material && variance.abs() >= MATERIAL_AMOUNT,
    }
}

pub fn analyze(lines: &[BudgetLine]) -> VarianceReport {
    let mut analyzed: Vec<VarianceLine> = lines.iter().map(analyze_line).collect();
    analyzed.sort_by(|a, b| {
        b.profit_impact
            .abs()
            .total_cmp(&a.profit_impact.abs())
            .then_with(|| a.label.cmp(&b.label))
    });
    let revenue_variance = analyzed
        .iter()
        .filter(|l| l.kind == LineKind::Revenue)
        .map(|l| l.variance)
        .sum();
    let cost_variance = analyzed
        .iter()
        .filter(|l| l.kind == LineKind::Cost)
        .map(|l| l.variance)
        .sum();
    let net_profit_impact = analyzed.iter().map(|l| l.profit_impact).sum();
    let material_count = analyzed.iter().filter(|l| l.material).count();

    let mut report = VarianceReport {
        lines: analyzed,
        revenue_variance,
        cost_variance,
        net_profit_impact,
        material_count,
        findings: Vec::new(),
    };
    report.findings = findings(&report);
    report
}

fn findings(report: &VarianceReport) -> Vec<String> {
    let mut out = vec![format!(
        "Net profit is {:.0} {} budget: revenue {:+.0}, costs {:+.0}.",
        report.net_profit_impact.abs(),
        if report.net_profit_impact >= 0.0 { "above" } else { "below" },
        report.revenue_variance,
        report.cost_variance
    )];
    let total_abs: f64 = report.lines.iter().map(|l| l.profit_impact.abs()).sum();
    for line in report.lines.iter().filter(|l| l.material).take(5) {
        let pct = line
            .variance_pct
            .map(|p| format!("{:+.1}%", p * 100.0))
            .unwrap_or_else(|| "unbudgeted".to_string());
        out.push(format!(
            "{} is {} by {:.0} ({pct}), {:.0}% of all variance.",
            line.label,
            if line.favourable { "favourable" } else { "unfavourable" },
            line.variance.abs(),
            stats::safe_ratio(line.profit_impact.abs(), total_abs) * 100.0
        ));
    }
    if report.material_count == 0 {
        out.push("No line deviates materially from budget.".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(label: &str, kind: LineKind, budget: f64, actual: f64) -> BudgetLine {
        BudgetLine { label: label.into(), kind, budget, actual }
    }

    #[test]
    fn cost_overrun_is_unfavourable() {
        let l = analyze_line(&line("rent", LineKind::Cost, 10_000.0, 12_000.0));
        assert!(!l.favourable);
        assert_eq!(l.profit_impact, -2_000.0);
        assert!(!l.material, "2k is below the amount threshold");
    }

    #[test]
    fn net_impact_sums_line_impacts() {
        let report = analyze(&[
            line("sales", LineKind::Revenue, 100_000.0, 90_000.0),
            line("payroll", LineKind::Cost, 50_000.0, 44_000.0),
        ]);
        assert_eq!(report.net_profit_impact, -4_000.0);
        assert_eq!(report.lines[0].label, "sales");
        assert_eq!(report.material_count, 2);
    }

    #[test]
    fn zero_budget_has_no_percentage() {
        let l = analyze_line(&line("fines", LineKind::Cost, 0.0, 8_000.0));
        assert_eq!(l.variance_pct, None);
        assert!(l.material);
    }
}
