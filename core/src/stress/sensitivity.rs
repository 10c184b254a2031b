//! One-at-a-time sensitivity of final cash to each input.
//!
//! Revenue and cost are perturbed over -30%..+30% in 10-point steps,
//! collection delay over 0..90 days. The elasticity is the OLS slope of
//! cash impact against the input change (per percentage point, or per
//! day for delay). The breaking point is the change that would bring
//! final cash to zero along that slope.

use super::model::{CashModel, Shock};
use crate::stats;
use serde::{Deserialize, Serialize};

pub const PCT_GRID: [f64; 7] = [-30.0, -20.0, -10.0, 0.0, 10.0, 20.0, 30.0];
pub const DELAY_GRID: [f64; 6] = [0.0, 15.0, 30.0, 45.0, 60.0, 90.0];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StressVariable {
    Revenue,
    Cost,
    CollectionDelay,
}

impl StressVariable {
    pub fn unit(self) -> &'static str {
        match self {
            StressVariable::Revenue | StressVariable::Cost => "pct",
            StressVariable::CollectionDelay => "days",
        }
    }

    fn grid(self) -> &'static [f64] {
        match self {
            StressVariable::Revenue | StressVariable::Cost => &PCT_GRID,
            StressVariable::CollectionDelay => &DELAY_GRID,
        }
    }

    fn shock(self, change: f64) -> Shock {
        match self {
            StressVariable::Revenue => Shock { revenue_change: change / 100.0, ..Default::default() },
            StressVariable::Cost => Shock { cost_change: change / 100.0, ..Default::default() },
            StressVariable::CollectionDelay => Shock { delay_days: change, ..Default::default() },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SensitivityPoint {
    pub input_change: f64,
    pub final_cash: f64,
    pub cash_impact: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensitivityCurve {
    pub variable: StressVariable,
    pub unit: String,
    pub points: Vec<SensitivityPoint>,
    /// Cash impact per unit of input change.
    pub elasticity: f64,
    /// Input change at which final cash reaches zero, if the slope allows.
    pub breaking_point: Option<f64>,
}

pub fn analyze(baseline: &CashModel, horizon: usize) -> Vec<SensitivityCurve> {
    [StressVariable::Revenue, StressVariable::Cost, StressVariable::CollectionDelay]
        .into_iter()
        .map(|v| curve(baseline, v, horizon))
        .collect()
}

pub fn curve(baseline: &CashModel, variable: StressVariable, horizon: usize) -> SensitivityCurve {
    let base_final = baseline.deterministic_final(horizon);
    let points: Vec<SensitivityPoint> = variable
        .grid()
        .iter()
        .map(|&change| {
            let final_cash = baseline.shocked(&variable.shock(change)).deterministic_final(horizon);
            SensitivityPoint {
                input_change: change,
                final_cash,
                cash_impact: final_cash - base_final,
            }
        })
        .collect();

    let xs: Vec<f64> = points.iter().map(|p| p.input_change).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.cash_impact).collect();
    let elasticity = stats::ols_slope(&xs, &ys);

    let breaking_point = if base_final <= 0.0 {
        Some(0.0)
    } else if elasticity.abs() < f64::EPSILON {
        None
    } else {
        Some(-base_final / elasticity)
    };

    SensitivityCurve {
        variable,
        unit: variable.unit().to_string(),
        points,
        elasticity,
        breaking_point,
    }
}
