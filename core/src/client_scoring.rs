//! Client risk scorer: 0..100 composite and A..D rating per counterparty.
//!
//! Composite = 40% payment behaviour + 25% trend + 20% stability
//!           + 15% exposure concentration. Higher is riskier.
//! Rating bands: A [0, 25], B (25, 50], C (50, 75], D (75, 100].
//! Boundary values resolve to the lower-risk band.

use crate::{
    payment_pattern::{PaymentPattern, Trend, VERY_LATE_DAYS},
    types::CounterpartyId,
};
use serde::{Deserialize, Serialize};

pub const WEIGHT_PAYMENT: f64 = 0.40;
pub const WEIGHT_TREND: f64 = 0.25;
pub const WEIGHT_STABILITY: f64 = 0.20;
pub const WEIGHT_EXPOSURE: f64 = 0.15;

/// Portfolio share at which the exposure sub-score saturates.
const EXPOSURE_SATURATION_SHARE: f64 = 0.40;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rating {
    A,
    B,
    C,
    D,
}

impl Rating {
    pub fn from_score(score: f64) -> Self {
        if score <= 25.0 {
            Rating::A
        } else if score <= 50.0 {
            Rating::B
        } else if score <= 75.0 {
            Rating::C
        } else {
            Rating::D
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskScore {
    pub counterparty_id: CounterpartyId,
    pub payment_behavior: f64,
    pub trend: f64,
    pub stability: f64,
    pub exposure: f64,
    pub composite: f64,
    pub rating: Rating,
}

pub fn score(pattern: &PaymentPattern, portfolio_share: f64) -> RiskScore {
    let payment_behavior = (100.0 - pattern.reliability_score).clamp(0.0, 100.0);
    let trend = match pattern.trend {
        Trend::Improving => 15.0,
        Trend::Stable => 35.0,
        Trend::Worsening => (60.0 + pattern.trend_slope.max(0.0) * 4.0).min(100.0),
    };
    let stability = if pattern.sample_size == 0 {
        50.0
    } else {
        (pattern.std_delay / VERY_LATE_DAYS as f64 * 100.0).min(100.0)
    };
    let exposure = (portfolio_share.max(0.0) / EXPOSURE_SATURATION_SHARE * 100.0).min(100.0);

    let composite = (payment_behavior * WEIGHT_PAYMENT
        + trend * WEIGHT_TREND
        + stability * WEIGHT_STABILITY
        + exposure * WEIGHT_EXPOSURE)
        .clamp(0.0, 100.0);

    RiskScore {
        counterparty_id: pattern.counterparty_id.clone(),
        payment_behavior,
        trend,
        stability,
        exposure,
        composite,
        rating: Rating::from_score(composite),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges_resolve_to_lower_risk() {
        assert_eq!(Rating::from_score(0.0), Rating::A);
        assert_eq!(Rating::from_score(25.0), Rating::A);
        assert_eq!(Rating::from_score(25.0001), Rating::B);
        assert_eq!(Rating::from_score(50.0), Rating::B);
        assert_eq!(Rating::from_score(75.0), Rating::C);
        assert_eq!(Rating::from_score(75.01), Rating::D);
        assert_eq!(Rating::from_score(100.0), Rating::D);
    }

    #[test]
    fn weights_sum_to_one() {
        let total = WEIGHT_PAYMENT + WEIGHT_TREND + WEIGHT_STABILITY + WEIGHT_EXPOSURE;
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reliable_small_client_rates_a() {
        let mut p = PaymentPattern::no_history("c");
        p.sample_size = 12;
        p.reliability_score = 98.0;
        p.std_delay = 1.0;
        p.trend = Trend::Improving;
        let s = score(&p, 0.02);
        assert_eq!(s.rating, Rating::A, "composite {:.1}", s.composite);
    }

    #[test]
    fn worsening_concentrated_client_rates_d() {
        let mut p = PaymentPattern::no_history("c");
        p.sample_size = 8;
        p.reliability_score = 5.0;
        p.std_delay = 40.0;
        p.trend = Trend::Worsening;
        p.trend_slope = 12.0;
        let s = score(&p, 0.5);
        assert_eq!(s.rating, Rating::D, "composite {:.1}", s.composite);
    }
}
