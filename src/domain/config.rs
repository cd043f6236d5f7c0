//! Engine configuration.
//!
//! Every tunable of the pipeline lives here with its default. The `pf`
//! binary builds an `EngineConfig` from an optional TOML file and then applies
//! command-line overrides; library callers construct it directly.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{Datelike, Duration, FixedOffset, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Future calendar day for which a terminal distribution is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AnchorDay {
    /// Last day of the month containing the first forecast day.
    MonthEnd,
    /// First occurrence of this weekday on or after the first forecast day.
    NextWeekday(Weekday),
    Date(NaiveDate),
}

impl AnchorDay {
    /// Resolve the anchor relative to the first forecast day.
    pub fn resolve(self, start: NaiveDate) -> NaiveDate {
        match self {
            AnchorDay::MonthEnd => month_end(start),
            AnchorDay::NextWeekday(wd) => {
                let ahead = (7 + wd.num_days_from_monday() as i64
                    - start.weekday().num_days_from_monday() as i64)
                    % 7;
                start + Duration::days(ahead)
            }
            AnchorDay::Date(d) => d,
        }
    }
}

fn month_end(date: NaiveDate) -> NaiveDate {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

impl FromStr for AnchorDay {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        if key == "month-end" || key == "month_end" || key == "eom" {
            return Ok(AnchorDay::MonthEnd);
        }
        if let Ok(wd) = key.parse::<Weekday>() {
            return Ok(AnchorDay::NextWeekday(wd));
        }
        NaiveDate::parse_from_str(&key, "%Y-%m-%d")
            .map(AnchorDay::Date)
            .map_err(|_| {
                EngineError::Config(format!(
                    "invalid anchor '{s}' (expected month-end, a weekday, or YYYY-MM-DD)"
                ))
            })
    }
}

impl TryFrom<String> for AnchorDay {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AnchorDay> for String {
    fn from(value: AnchorDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AnchorDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorDay::MonthEnd => f.write_str("month-end"),
            AnchorDay::NextWeekday(wd) => write!(f, "{}", format!("{wd}").to_lowercase()),
            AnchorDay::Date(d) => write!(f, "{d}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Offset of the reference timezone that defines a "day", in minutes east of UTC.
    ///
    /// The collectors run on New York time; set `-240` (EDT) or `-300` (EST)
    /// so early-UTC scrapes land on the collector's day. Snapshot rows that
    /// carry an `as_of_date` do not depend on this.
    pub utc_offset_minutes: i32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self { utc_offset_minutes: 0 }
    }
}

impl PanelConfig {
    pub fn timezone(&self) -> Result<FixedOffset, EngineError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            EngineError::Config(format!(
                "utc_offset_minutes={} is outside +/-24h",
                self.utc_offset_minutes
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Ratio between consecutive impulse weights.
    pub decay: f64,
    /// Number of days a release keeps contributing (including its own day).
    pub length: usize,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self { decay: 0.6, length: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    pub radius: usize,
    pub n_sigma: f64,
    pub span: f64,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            radius: 3,
            n_sigma: 3.0,
            span: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Wholesale-to-retail transmission delay, calendar days.
    pub driver_lag_days: i64,
    pub momentum_span: f64,
    /// Largest plausible daily retail move; bounds the momentum term.
    pub max_daily_move: f64,
    /// Multiplier on driver A before subtracting driver B (42 gal/bbl).
    pub spread_driver_a_scale: f64,
    pub spread_change_days: i64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            driver_lag_days: 7,
            momentum_span: 7.0,
            max_daily_move: 0.05,
            spread_driver_a_scale: 42.0,
            spread_change_days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub lookback_days: i64,
    pub min_rows: usize,
    pub half_life_days: f64,
    /// L2 penalty on standardized (non-intercept) coefficients.
    pub ridge_lambda: f64,
    pub holdout_fraction: f64,
    /// Relative held-out improvement required to keep the pulse features.
    pub gate_tolerance: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            lookback_days: 150,
            min_rows: 24,
            half_life_days: 90.0,
            ridge_lambda: 1.0,
            holdout_fraction: 0.2,
            gate_tolerance: 0.03,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub paths: usize,
    pub seed: u64,
    pub min_horizon_days: i64,
    pub max_horizon_days: i64,
    /// Half-width of the uniform jitter added to each bootstrap draw (half a price tick).
    pub residual_jitter: f64,
    pub anchor: AnchorDay,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            paths: 4000,
            seed: 42,
            min_horizon_days: 7,
            max_horizon_days: 62,
            residual_jitter: 0.0005,
            anchor: AnchorDay::MonthEnd,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub increment: f64,
    pub steps_each_side: usize,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            increment: 0.05,
            steps_each_side: 4,
            lower_percentile: 5.0,
            upper_percentile: 95.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NaiveConfig {
    pub trend_window: usize,
    pub trend_decay: f64,
}

impl Default for NaiveConfig {
    fn default() -> Self {
        Self {
            trend_window: 7,
            trend_decay: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub panel: PanelConfig,
    pub pulse: PulseConfig,
    pub smoother: SmootherConfig,
    pub features: FeatureConfig,
    pub fit: FitConfig,
    pub simulation: SimulationConfig,
    pub thresholds: ThresholdConfig,
    pub naive: NaiveConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        fn check(ok: bool, msg: &str) -> Result<(), EngineError> {
            if ok { Ok(()) } else { Err(EngineError::Config(msg.to_string())) }
        }

        self.panel.timezone()?;
        check(
            self.pulse.decay.is_finite() && (0.0..=1.0).contains(&self.pulse.decay),
            "pulse.decay must be in [0, 1]",
        )?;
        check(self.pulse.length >= 1, "pulse.length must be >= 1")?;
        check(self.smoother.radius >= 1, "smoother.radius must be >= 1")?;
        check(
            self.smoother.n_sigma.is_finite() && self.smoother.n_sigma > 0.0,
            "smoother.n_sigma must be > 0",
        )?;
        check(
            self.smoother.span.is_finite() && self.smoother.span >= 1.0,
            "smoother.span must be >= 1",
        )?;
        check(self.features.driver_lag_days >= 0, "features.driver_lag_days must be >= 0")?;
        check(
            self.features.momentum_span.is_finite() && self.features.momentum_span >= 1.0,
            "features.momentum_span must be >= 1",
        )?;
        check(
            self.features.max_daily_move.is_finite() && self.features.max_daily_move > 0.0,
            "features.max_daily_move must be > 0",
        )?;
        check(
            self.features.spread_driver_a_scale.is_finite(),
            "features.spread_driver_a_scale must be finite",
        )?;
        check(self.features.spread_change_days >= 1, "features.spread_change_days must be >= 1")?;
        check(self.fit.lookback_days >= 2, "fit.lookback_days must be >= 2")?;
        check(self.fit.min_rows >= 2, "fit.min_rows must be >= 2")?;
        check(
            self.fit.half_life_days.is_finite() && self.fit.half_life_days > 0.0,
            "fit.half_life_days must be > 0",
        )?;
        check(
            self.fit.ridge_lambda.is_finite() && self.fit.ridge_lambda >= 0.0,
            "fit.ridge_lambda must be >= 0",
        )?;
        check(
            self.fit.holdout_fraction > 0.0 && self.fit.holdout_fraction < 1.0,
            "fit.holdout_fraction must be in (0, 1)",
        )?;
        check(
            self.fit.gate_tolerance.is_finite() && (0.0..1.0).contains(&self.fit.gate_tolerance),
            "fit.gate_tolerance must be in [0, 1)",
        )?;
        check(self.simulation.paths >= 1, "simulation.paths must be >= 1")?;
        check(self.simulation.min_horizon_days >= 1, "simulation.min_horizon_days must be >= 1")?;
        check(
            self.simulation.max_horizon_days >= self.simulation.min_horizon_days,
            "simulation.max_horizon_days must be >= min_horizon_days",
        )?;
        check(
            self.simulation.residual_jitter.is_finite() && self.simulation.residual_jitter >= 0.0,
            "simulation.residual_jitter must be >= 0",
        )?;
        check(
            self.thresholds.increment.is_finite() && self.thresholds.increment > 0.0,
            "thresholds.increment must be > 0",
        )?;
        check(
            (0.0..=100.0).contains(&self.thresholds.lower_percentile)
                && (0.0..=100.0).contains(&self.thresholds.upper_percentile)
                && self.thresholds.lower_percentile < self.thresholds.upper_percentile,
            "thresholds percentiles must satisfy 0 <= lower < upper <= 100",
        )?;
        check(self.naive.trend_window >= 1, "naive.trend_window must be >= 1")?;
        check(
            self.naive.trend_decay.is_finite() && (0.0..=1.0).contains(&self.naive.trend_decay),
            "naive.trend_decay must be in [0, 1]",
        )?;
        Ok(())
    }
}
