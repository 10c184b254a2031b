//! Action prioritizer: multi-criteria ranking of candidate interventions.
//!
//!   priority = impact × 0.7 + ease × 0.3
//!   impact   = ½ normalised exposure + ½ success probability
//!              (+ runway boost when runway < 30 days)
//!   ease     = 40% effort + 35% responsiveness + 25% complexity
//!   urgency  = 100 / 80 / 50 / 20 by days to deadline
//!
//! Urgency only sets the P-tier. Ranking is by priority alone,
//! ties broken by higher impact. At most `max_actions` survive.

use crate::{
    action::{profile, Action, ActionCandidate, Complexity, PriorityTier, ValidationStatus},
    client_scoring::Rating,
    config::PrioritizerConfig,
    types::CycleId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriorityContext {
    pub as_of: NaiveDate,
    pub runway_days: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: ActionCandidate,
    pub impact_score: f64,
    pub ease_score: f64,
    pub urgency_score: f64,
    pub priority_score: f64,
    pub success_probability: f64,
    pub tier: PriorityTier,
}

/// Success probability in points: base rate adjusted by counterparty rating.
pub fn success_probability(candidate: &ActionCandidate, config: &PrioritizerConfig) -> f64 {
    let base = profile(candidate.kind).base_success_rate;
    let adj = config.rating_adjustment;
    let delta = match candidate.rating {
        Some(Rating::A) => adj,
        Some(Rating::B) => adj / 2.0,
        Some(Rating::C) => -adj / 2.0,
        Some(Rating::D) => -adj,
        None => 0.0,
    };
    (base + delta).clamp(0.0, 100.0)
}

pub fn impact_score(
    candidate: &ActionCandidate,
    max_amount: f64,
    runway_days: Option<f64>,
    config: &PrioritizerConfig,
) -> f64 {
    let amount_norm = if max_amount > 0.0 {
        (candidate.impact_amount / max_amount * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };
    let mut impact = 0.5 * amount_norm + 0.5 * success_probability(candidate, config);
    if let Some(runway) = runway_days {
        if runway < config.runway_critical_days {
            let criticality = 1.0 - (runway.max(0.0) / config.runway_critical_days);
            impact += config.runway_boost_max * criticality;
        }
    }
    impact.clamp(0.0, 100.0)
}

pub fn ease_score(candidate: &ActionCandidate) -> f64 {
    let p = profile(candidate.kind);
    let effort = (100.0 - p.effort_hours / 40.0 * 100.0).clamp(0.0, 100.0);
    let complexity = match p.complexity {
        Complexity::Low => 100.0,
        Complexity::Medium => 60.0,
        Complexity::High => 25.0,
    };
    (0.40 * effort + 0.35 * candidate.responsiveness.clamp(0.0, 100.0) + 0.25 * complexity).clamp(0.0, 100.0)
}

pub fn urgency_score(days_to_deadline: i64) -> f64 {
    if days_to_deadline <= 3 {
        100.0
    } else if days_to_deadline <= 7 {
        80.0
    } else if days_to_deadline <= 14 {
        50.0
    } else {
        20.0
    }
}

pub fn tier_for(priority: f64, urgency: f64) -> PriorityTier {
    if priority > 75.0 || urgency > 90.0 {
        PriorityTier::P1
    } else if priority > 50.0 || urgency > 70.0 {
        PriorityTier::P2
    } else {
        PriorityTier::P3
    }
}

/// Score and order every candidate. No truncation.
pub fn rank(
    candidates: &[ActionCandidate],
    ctx: &PriorityContext,
    config: &PrioritizerConfig,
) -> Vec<ScoredCandidate> {
    let max_amount = candidates.iter().map(|c| c.impact_amount).fold(0.0, f64::max);
    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|c| {
            let impact = impact_score(c, max_amount, ctx.runway_days, config);
            let ease = ease_score(c);
            let priority = impact * config.impact_weight + ease * config.ease_weight;
            let urgency = urgency_score((c.deadline - ctx.as_of).num_days());
            ScoredCandidate {
                candidate: c.clone(),
                impact_score: impact,
                ease_score: ease,
                urgency_score: urgency,
                priority_score: priority,
                success_probability: success_probability(c, config) / 100.0,
                tier: tier_for(priority, urgency),
            }
        })
        .collect();
    scored.sort_by(|a, b| {
        b.priority_score
            .total_cmp(&a.priority_score)
            .then_with(|| b.impact_score.total_cmp(&a.impact_score))
            .then_with(|| a.candidate.counterparty_id.cmp(&b.candidate.counterparty_id))
            .then_with(|| a.candidate.kind.cmp(&b.candidate.kind))
    });
    scored
}

/// Rank and keep the top `max_actions` (never more than 3) as pending actions.
pub fn prioritize(
    candidates: &[ActionCandidate],
    cycle_id: &CycleId,
    ctx: &PriorityContext,
    config: &PrioritizerConfig,
) -> Vec<Action> {
    rank(candidates, ctx, config)
        .into_iter()
        .take(config.max_actions.min(3))
        .map(|s| Action {
            action_id: uuid::Uuid::new_v4().to_string(),
            cycle_id: cycle_id.clone(),
            kind: s.candidate.kind,
            title: format!("{}: {}", profile(s.candidate.kind).label, s.candidate.counterparty_name),
            tier: s.tier,
            counterparty_id: s.candidate.counterparty_id,
            counterparty_name: s.candidate.counterparty_name,
            risk_ids: s.candidate.risk_ids,
            impact_amount: s.candidate.impact_amount,
            deadline: s.candidate.deadline,
            priority_score: s.priority_score,
            impact_score: s.impact_score,
            ease_score: s.ease_score,
            urgency_score: s.urgency_score,
            success_probability: s.success_probability,
            validation: ValidationStatus::Pending,
        })
        .collect()
}
