//! Engine configuration: every threshold, weight and default the engine uses.
//!
//! Loaded from `{data_dir}/engine_config.json`. Every section carries
//! `#[serde(default)]`, so a partial file only overrides what it names.
//! In tests, use EngineConfig::default_test().

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Days overdue beyond which a receivable counts as critically aged.
    pub critical_age_days: i64,
    /// Newly critical exposure must exceed this amount to fire.
    pub min_material_amount: f64,
    /// Single-counterparty share of outstanding that fires the trigger.
    pub concentration_threshold: f64,
    /// Upward drift of average days overdue (vs prior cycle) that fires.
    pub dso_drift_days: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            critical_age_days: 90,
            min_material_amount: 50_000.0,
            concentration_threshold: 0.40,
            dso_drift_days: 7.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequalificationConfig {
    /// Strictly above this many days overdue a receivable is CRITICAL.
    pub critical_overdue_days: i64,
    /// Strictly above this many days overdue a receivable is at least UNCERTAIN.
    pub uncertain_overdue_days: i64,
    /// Strictly above this share a counterparty's receivables are CRITICAL.
    pub critical_concentration: f64,
    /// Strictly above this share a counterparty's receivables are at least UNCERTAIN.
    pub uncertain_concentration: f64,
    /// Receivables below this outstanding amount are not requalified.
    pub materiality_min: f64,
    /// Composite score weights: age, amount, probability, counterparty score.
    pub weight_age: f64,
    pub weight_amount: f64,
    pub weight_probability: f64,
    pub weight_client: f64,
    /// Minimum settled invoices for a green data-quality flag.
    pub min_history_for_green: usize,
}

impl Default for RequalificationConfig {
    fn default() -> Self {
        Self {
            critical_overdue_days: 90,
            uncertain_overdue_days: 30,
            critical_concentration: 0.40,
            uncertain_concentration: 0.25,
            materiality_min: 50_000.0,
            weight_age: 0.30,
            weight_amount: 0.25,
            weight_probability: 0.25,
            weight_client: 0.20,
            min_history_for_green: 3,
        }
    }
}

/// A named calendar window during which some clients historically pay late.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonalWindow {
    pub name: String,
    /// First month of the window, 1..=12.
    pub start_month: u32,
    /// Last month of the window, 1..=12. May wrap past December.
    pub end_month: u32,
}

impl SeasonalWindow {
    pub fn contains_month(&self, month: u32) -> bool {
        if self.start_month <= self.end_month {
            month >= self.start_month && month <= self.end_month
        } else {
            month >= self.start_month || month <= self.end_month
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningConfig {
    /// Lookback for delay-slope and partial-payment detection.
    pub lookback_days: i64,
    /// Minimum fitted delay growth over the lookback to flag.
    pub progressive_delay_min_days: f64,
    /// Delay level at which a worsening client is considered defaulting.
    pub default_delay_days: f64,
    pub partial_payment_min_count: usize,
    /// Recent window compared against the 12-month baseline.
    pub frequency_recent_days: i64,
    pub frequency_baseline_days: i64,
    /// Late-rate increase (absolute, 0..1) that flags rising frequency.
    pub frequency_increase_min: f64,
    pub concentration_threshold: f64,
    /// Window delay must exceed the client's mean delay by this much.
    pub seasonal_excess_days: f64,
    /// Only flag windows starting within this many days.
    pub seasonal_horizon_days: i64,
    pub seasonal_windows: Vec<SeasonalWindow>,
}

impl Default for WarningConfig {
    fn default() -> Self {
        Self {
            lookback_days: 180,
            progressive_delay_min_days: 15.0,
            default_delay_days: 60.0,
            partial_payment_min_count: 2,
            frequency_recent_days: 90,
            frequency_baseline_days: 365,
            frequency_increase_min: 0.20,
            concentration_threshold: 0.30,
            seasonal_excess_days: 15.0,
            seasonal_horizon_days: 90,
            seasonal_windows: vec![
                SeasonalWindow { name: "summer".into(),   start_month: 7,  end_month: 8 },
                SeasonalWindow { name: "year_end".into(), start_month: 12, end_month: 1 },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrioritizerConfig {
    pub max_actions: usize,
    pub impact_weight: f64,
    pub ease_weight: f64,
    /// Runway (days) under which the criticality boost applies.
    pub runway_critical_days: f64,
    /// Maximum impact points added when runway hits zero.
    pub runway_boost_max: f64,
    /// Rating adjustment of success probability, in points.
    pub rating_adjustment: f64,
}

impl Default for PrioritizerConfig {
    fn default() -> Self {
        Self {
            max_actions: 3,
            impact_weight: 0.7,
            ease_weight: 0.3,
            runway_critical_days: 30.0,
            runway_boost_max: 20.0,
            rating_adjustment: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    pub simulations: usize,
    pub horizon_periods: usize,
    pub confidence: f64,
    /// Safety threshold as a number of periods of cost coverage.
    pub safety_periods: f64,
    /// Paths per deterministic scenario when estimating its survival probability.
    pub scenario_simulations: usize,
    /// Cost volatility used when the caller supplies none.
    pub default_cost_volatility: f64,
    pub reverse_horizon_periods: usize,
    /// Fraction of each single-variable shock used in the combined shock.
    pub combined_shock_fraction: f64,
    pub seed: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            simulations: 10_000,
            horizon_periods: 12,
            confidence: 0.95,
            safety_periods: 2.0,
            scenario_simulations: 2_000,
            default_cost_volatility: 0.05,
            reverse_horizon_periods: 6,
            combined_shock_fraction: 0.5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    pub annual_discount_rate: f64,
    pub strong_threshold: f64,
    pub slight_threshold: f64,
    /// Saving, as a share of option A's cost, option B needs to be recommended.
    pub switch_threshold: f64,
    pub weight_npv: f64,
    pub weight_cash: f64,
    pub weight_risk: f64,
    pub weight_flexibility: f64,
    pub weight_strategic: f64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            annual_discount_rate: 0.08,
            strong_threshold: 0.15,
            slight_threshold: 0.05,
            switch_threshold: 0.10,
            weight_npv: 0.35,
            weight_cash: 0.25,
            weight_risk: 0.20,
            weight_flexibility: 0.10,
            weight_strategic: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    pub event_capacity: usize,
    pub command_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            event_capacity: 256,
            command_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub trigger: TriggerConfig,
    pub requalification: RequalificationConfig,
    pub warnings: WarningConfig,
    pub prioritizer: PrioritizerConfig,
    pub stress: StressConfig,
    pub arbiter: ArbiterConfig,
    pub monitor: MonitorConfig,
}

impl EngineConfig {
    /// Load from the data/ directory.
    /// In tests, use EngineConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/engine_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Config with hardcoded defaults for use in unit tests.
    /// Smaller simulation counts keep the suite fast.
    pub fn default_test() -> Self {
        let mut config = Self::default();
        config.stress.simulations = 2_000;
        config.stress.scenario_simulations = 500;
        config.monitor.interval_secs = 1;
        config
    }

    fn validate(&self) -> anyhow::Result<()> {
        let weights = self.requalification.weight_age
            + self.requalification.weight_amount
            + self.requalification.weight_probability
            + self.requalification.weight_client;
        if (weights - 1.0).abs() > 1e-6 {
            anyhow::bail!("requalification weights must sum to 1.0, got {weights:.3}");
        }
        if self.requalification.uncertain_overdue_days > self.requalification.critical_overdue_days {
            anyhow::bail!("uncertain_overdue_days must not exceed critical_overdue_days");
        }
        if !(0.5..1.0).contains(&self.stress.confidence) {
            anyhow::bail!("stress.confidence must be in [0.5, 1.0)");
        }
        if self.stress.simulations == 0 || self.stress.horizon_periods == 0 {
            anyhow::bail!("stress.simulations and stress.horizon_periods must be positive");
        }
        if !(0.0..1.0).contains(&self.arbiter.switch_threshold) {
            anyhow::bail!("arbiter.switch_threshold must be in [0.0, 1.0)");
        }
        if self.prioritizer.max_actions > 3 {
            anyhow::bail!("prioritizer.max_actions cannot exceed 3");
        }
        Ok(())
    }
}
