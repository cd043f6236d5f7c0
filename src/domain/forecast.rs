//! Forecast outputs.
//!
//! `ForecastResult` is the in-memory result of one invocation (it keeps the
//! whole simulated ensemble). `ForecastReport` is the serializable contract
//! handed to the presentation layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which path produced the forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ForecastMethod {
    Model,
    /// Last value plus decayed recent trend, used when the model cannot be fitted.
    Naive { reason: String },
}

/// Per-day percentile band of the simulated ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandRow {
    pub date: NaiveDate,
    pub p5: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRow {
    pub threshold: f64,
    pub probability: f64,
}

/// Terminal distribution summary at the anchor day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorSummary {
    pub date: NaiveDate,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDiagnostics {
    pub used_pulse_features: bool,
    #[serde(rename = "heldOutMAE_baseline")]
    pub held_out_mae_baseline: Option<f64>,
    #[serde(rename = "heldOutMAE_augmented")]
    pub held_out_mae_augmented: Option<f64>,
    pub training_rows: usize,
    pub residual_count: usize,
    pub missing_driver_substitutions: usize,
    /// `(feature name, coefficient)` on the standardized scale, intercept first.
    pub coefficients: Vec<(String, f64)>,
}

/// Simulated paths, `paths[member][day]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ensemble {
    pub paths: Vec<Vec<f64>>,
}

impl Ensemble {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// All members' values on one horizon day.
    pub fn day_values(&self, day: usize) -> Vec<f64> {
        self.paths.iter().filter_map(|p| p.get(day).copied()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    pub method: ForecastMethod,
    pub last_confirmed_date: NaiveDate,
    pub last_confirmed_value: f64,
    pub dates: Vec<NaiveDate>,
    pub point: Vec<f64>,
    pub ensemble: Ensemble,
    pub bands: Vec<BandRow>,
    pub anchor: AnchorSummary,
    pub thresholds: Vec<ThresholdRow>,
    pub diagnostics: ModelDiagnostics,
}

impl ForecastResult {
    pub fn point_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .iter()
            .position(|d| *d == date)
            .and_then(|i| self.point.get(i).copied())
    }
}

/// Output contract for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastReport {
    pub method: ForecastMethod,
    pub last_confirmed_date: NaiveDate,
    pub last_confirmed_value: f64,
    pub point_forecast: Vec<(NaiveDate, f64)>,
    pub ensemble_bands: Vec<BandRow>,
    pub anchor: AnchorSummary,
    pub threshold_table: Vec<ThresholdRow>,
    pub model_diagnostics: ModelDiagnostics,
}

impl From<&ForecastResult> for ForecastReport {
    fn from(result: &ForecastResult) -> Self {
        Self {
            method: result.method.clone(),
            last_confirmed_date: result.last_confirmed_date,
            last_confirmed_value: result.last_confirmed_value,
            point_forecast: result
                .dates
                .iter()
                .copied()
                .zip(result.point.iter().copied())
                .collect(),
            ensemble_bands: result.bands.clone(),
            anchor: result.anchor.clone(),
            threshold_table: result.thresholds.clone(),
            model_diagnostics: result.diagnostics.clone(),
        }
    }
}
