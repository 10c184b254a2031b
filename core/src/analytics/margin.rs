//! Gross margin bridge between two periods.
//!
//! With total volume V, mix share sᵢ = vᵢ/V and unit margin mᵢ = pᵢ − cᵢ:
//!
//!   volume  (V₁ − V₀)·Σ s₀ᵢ·m₀ᵢ
//!   mix     V₁·Σ (s₁ᵢ − s₀ᵢ)·m₀ᵢ
//!   price   Σ v₁ᵢ·(p₁ᵢ − p₀ᵢ)
//!   cost    −Σ v₁ᵢ·(c₁ᵢ − c₀ᵢ)
//!
//! The four effects sum exactly to GM₁ − GM₀. A line new in the current
//! period takes its current price and cost as prior values, so it shows
//! up in volume and mix only. Lines sharing a name within a period are
//! merged first: volumes add, price and cost become volume-weighted.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductLine {
    pub name: String,
    pub volume: f64,
    pub unit_price: f64,
    pub unit_cost: f64,
}

impl ProductLine {
    pub fn unit_margin(&self) -> f64 {
        self.unit_price - self.unit_cost
    }

    pub fn gross_margin(&self) -> f64 {
        self.volume * self.unit_margin()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeLine {
    pub name: String,
    pub volume_effect: f64,
    pub mix_effect: f64,
    pub price_effect: f64,
    pub cost_effect: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarginBridge {
    pub prior_margin: f64,
    pub current_margin: f64,
    pub total_change: f64,
    pub volume_effect: f64,
    pub mix_effect: f64,
    pub price_effect: f64,
    pub cost_effect: f64,
    pub lines: Vec<BridgeLine>,
    pub findings: Vec<String>,
}

/// One line per product name. Zero total volume falls back to plain averages.
pub fn merge_lines(lines: &[ProductLine]) -> BTreeMap<&str, ProductLine> {
    let mut groups: BTreeMap<&str, Vec<&ProductLine>> = BTreeMap::new();
    for line in lines {
        groups.entry(line.name.as_str()).or_default().push(line);
    }
    groups
        .into_iter()
        .map(|(name, group)| {
            if group.len() > 1 {
                log::debug!("margin: merging {} lines named {name}", group.len());
            }
            let volume: f64 = group.iter().map(|l| l.volume).sum();
            let (weights, denom): (Vec<f64>, f64) = if volume.abs() > f64::EPSILON {
                (group.iter().map(|l| l.volume).collect(), volume)
            } else {
                (vec![1.0; group.len()], group.len() as f64)
            };
            let weighted = |f: fn(&ProductLine) -> f64| -> f64 {
                group.iter().zip(&weights).map(|(l, w)| f(l) * w).sum::<f64>() / denom
            };
            let merged = ProductLine {
                name: name.to_string(),
                volume,
                unit_price: weighted(|l| l.unit_price),
                unit_cost: weighted(|l| l.unit_cost),
            };
            (name, merged)
        })
        .collect()
}

pub fn bridge(prior: &[ProductLine], current: &[ProductLine]) -> MarginBridge {
    let p0 = merge_lines(prior);
    let p1 = merge_lines(current);
    let names: BTreeSet<&str> = p0.keys().chain(p1.keys()).copied().collect();

    let v0_total: f64 = p0.values().map(|l| l.volume).sum();
    let v1_total: f64 = p1.values().map(|l| l.volume).sum();
    let share = |v: f64, total: f64| if total.abs() > f64::EPSILON { v / total } else { 0.0 };

    let lines: Vec<BridgeLine> = names
        .into_iter()
        .map(|name| {
            let cur = p1.get(name);
            let pri = p0.get(name);
            let (v0, price0, cost0) = match (pri, cur) {
                (Some(p), _) => (p.volume, p.unit_price, p.unit_cost),
                (None, Some(c)) => (0.0, c.unit_price, c.unit_cost),
                (None, None) => (0.0, 0.0, 0.0),
            };
            let (v1, price1, cost1) = match cur {
                Some(c) => (c.volume, c.unit_price, c.unit_cost),
                None => (0.0, price0, cost0),
            };
            let m0 = price0 - cost0;
            let s0 = share(v0, v0_total);
            let s1 = share(v1, v1_total);
            let volume_effect = (v1_total - v0_total) * s0 * m0;
            let mix_effect = v1_total * (s1 - s0) * m0;
            let price_effect = v1 * (price1 - price0);
            let cost_effect = -v1 * (cost1 - cost0);
            BridgeLine {
                name: name.to_string(),
                volume_effect,
                mix_effect,
                price_effect,
                cost_effect,
                total: volume_effect + mix_effect + price_effect + cost_effect,
            }
        })
        .collect();

    let prior_margin: f64 = p0.values().map(ProductLine::gross_margin).sum();
    let current_margin: f64 = p1.values().map(ProductLine::gross_margin).sum();
    let mut out = MarginBridge {
        prior_margin,
        current_margin,
        total_change: current_margin - prior_margin,
        volume_effect: lines.iter().map(|l| l.volume_effect).sum(),
        mix_effect: lines.iter().map(|l| l.mix_effect).sum(),
        price_effect: lines.iter().map(|l| l.price_effect).sum(),
        cost_effect: lines.iter().map(|l| l.cost_effect).sum(),
        lines,
        findings: Vec::new(),
    };
    out.findings = findings(&out);
    out
}

fn findings(b: &MarginBridge) -> Vec<String> {
    let mut out = vec![format!(
        "Gross margin moved from {:.0} to {:.0} ({:+.0}).",
        b.prior_margin, b.current_margin, b.total_change
    )];
    let mut effects = [
        ("volume", b.volume_effect),
        ("mix", b.mix_effect),
        ("price", b.price_effect),
        ("unit cost", b.cost_effect),
    ];
    effects.sort_by(|a, c| c.1.abs().total_cmp(&a.1.abs()));
    let parts: Vec<String> = effects.iter().map(|(n, v)| format!("{n} {v:+.0}")).collect();
    out.push(format!("By driver: {}.", parts.join(", ")));
    if let Some(top) = b
        .lines
        .iter()
        .max_by(|x, y| x.total.abs().total_cmp(&y.total.abs()))
    {
        out.push(format!("{} accounts for the largest move ({:+.0}).", top.name, top.total));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str, volume: f64, price: f64, cost: f64) -> ProductLine {
        ProductLine { name: name.into(), volume, unit_price: price, unit_cost: cost }
    }

    #[test]
    fn effects_sum_exactly_with_new_and_dropped_lines() {
        let prior = vec![p("a", 100.0, 10.0, 6.0), p("b", 50.0, 20.0, 15.0)];
        let current = vec![p("a", 120.0, 11.0, 6.5), p("c", 30.0, 8.0, 3.0)];
        let b = bridge(&prior, &current);
        let sum = b.volume_effect + b.mix_effect + b.price_effect + b.cost_effect;
        assert!((sum - b.total_change).abs() < 1e-9, "sum {sum} vs {}", b.total_change);
    }

    #[test]
    fn duplicate_names_are_merged() {
        let prior = vec![p("a", 100.0, 10.0, 6.0), p("a", 100.0, 12.0, 6.0)];
        let current = vec![p("a", 150.0, 11.0, 6.0), p("b", 50.0, 9.0, 5.0), p("a", 50.0, 13.0, 8.0)];
        let b = bridge(&prior, &current);
        assert!((b.prior_margin - 1_000.0).abs() < 1e-9);
        assert!((b.current_margin - 1_200.0).abs() < 1e-9);
        assert_eq!(b.lines.len(), 2);
        let sum = b.volume_effect + b.mix_effect + b.price_effect + b.cost_effect;
        assert!((sum - b.total_change).abs() < 1e-9, "sum {sum} vs {}", b.total_change);

        let merged = merge_lines(&prior);
        assert!((merged["a"].unit_price - 11.0).abs() < 1e-12);
        assert!((merged["a"].volume - 200.0).abs() < 1e-12);
    }

    #[test]
    fn pure_price_increase() {
        let b = bridge(&[p("a", 100.0, 10.0, 6.0)], &[p("a", 100.0, 12.0, 6.0)]);
        assert!((b.price_effect - 200.0).abs() < 1e-9);
        assert!(b.volume_effect.abs() < 1e-9 && b.mix_effect.abs() < 1e-9);
    }
}
