//! Recency-weighted ridge regression for one feature set.
//!
//! Given:
//! - feature rows `x_t` for the training days
//! - the next-day change `Δy_t = y_t - y_{t-1}` as response
//! - recency weights `w_t = exp(-ln 2 / half_life * age_t)`
//!
//! we standardize every regressor with its weighted mean and standard
//! deviation, then solve
//!
//! ```text
//! minimize Σ w_t (Δy_t - β0 - z_t^T β)^2 + λ ||β||^2
//! ```
//!
//! The intercept `β0` is not penalized. Regressors with zero weighted
//! variance (for example a flat driver) are zeroed and end up with a zero
//! coefficient.

use chrono::NaiveDate;
use nalgebra::DMatrix;

use crate::domain::FitConfig;
use crate::error::EngineError;
use crate::features::{FeatureRow, FeatureTable};
use crate::math::{solve_weighted_ridge, weighted_mean_std};
use crate::models::{FeatureSet, INTERCEPT, fill_design_row};
use crate::panel::Panel;

/// Standard deviations at or below this are treated as a constant column.
const MIN_SCALE: f64 = 1e-12;

/// Rows the regression is fitted on, in chronological order.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<FeatureRow>,
    /// Day-over-day change of the target.
    pub response: Vec<f64>,
    pub weights: Vec<f64>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows `range`, keeping the original weights.
    pub fn slice(&self, range: std::ops::Range<usize>) -> TrainingSet {
        TrainingSet {
            dates: self.dates[range.clone()].to_vec(),
            rows: self.rows[range.clone()].to_vec(),
            response: self.response[range.clone()].to_vec(),
            weights: self.weights[range].to_vec(),
        }
    }
}

/// Collect the training rows for the window ending at the last confirmed day.
///
/// A day qualifies when its target is a real observation, it has a prior
/// panel day, and it lies within `lookback_days` of the last confirmed day.
pub fn training_set(
    panel: &Panel,
    features: &FeatureTable,
    config: &FitConfig,
) -> Result<TrainingSet, EngineError> {
    let last = panel
        .last_confirmed_index()
        .ok_or_else(|| EngineError::insufficient("no confirmed target observation"))?;
    let last_date = panel.dates[last];
    let decay = std::f64::consts::LN_2 / config.half_life_days;

    let mut set = TrainingSet::default();
    for i in 1..=last {
        let date = panel.dates[i];
        let age = (last_date - date).num_days();
        if age >= config.lookback_days || !panel.target_source[i].is_confirmed() {
            continue;
        }
        set.dates.push(date);
        set.rows.push(features.rows[i]);
        set.response.push(panel.target[i] - panel.target[i - 1]);
        set.weights.push((-decay * age as f64).exp());
    }

    if set.len() < config.min_rows {
        return Err(EngineError::insufficient(format!(
            "{} training rows in the last {} days, need {}",
            set.len(),
            config.lookback_days,
            config.min_rows
        )));
    }

    Ok(set)
}

/// A fitted next-day change model.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    pub feature_set: FeatureSet,
    pub intercept: f64,
    /// Coefficients on the standardized regressors, in `feature_set` order.
    pub coefficients: Vec<f64>,
    pub means: Vec<f64>,
    /// Weighted standard deviations; 0 marks a zeroed column.
    pub scales: Vec<f64>,
    /// In-sample residuals `Δy - prediction`, chronological.
    pub residuals: Vec<f64>,
    pub training_rows: usize,
}

impl FittedModel {
    /// Predicted change of the target from the previous day to the row's day.
    pub fn predict_change(&self, row: &FeatureRow) -> f64 {
        let mut raw = vec![0.0; self.feature_set.len()];
        fill_design_row(self.feature_set, row, &mut raw);
        let mut out = self.intercept;
        for (j, x) in raw.iter().enumerate() {
            if self.scales[j] > 0.0 {
                out += self.coefficients[j] * (x - self.means[j]) / self.scales[j];
            }
        }
        out
    }

    pub fn uses_pulse(&self) -> bool {
        self.feature_set.uses_pulse()
    }

    /// `(name, coefficient)` pairs with the intercept first.
    pub fn named_coefficients(&self) -> Vec<(String, f64)> {
        let names = self.feature_set.column_names();
        std::iter::once(self.intercept)
            .chain(self.coefficients.iter().copied())
            .zip(names)
            .map(|(c, name)| (name.to_string(), c))
            .collect()
    }
}

/// Fit one feature set on `data`.
pub fn fit_ridge(set: FeatureSet, data: &TrainingSet, lambda: f64) -> Result<FittedModel, EngineError> {
    let n = data.len();
    let p = set.len();
    if n == 0 {
        return Err(EngineError::insufficient("no rows to fit"));
    }

    // Raw regressors, column-major for the per-column statistics.
    let mut columns = vec![Vec::with_capacity(n); p];
    let mut row_buf = vec![0.0; p];
    for row in &data.rows {
        fill_design_row(set, row, &mut row_buf);
        for (col, x) in columns.iter_mut().zip(&row_buf) {
            col.push(*x);
        }
    }

    let mut means = Vec::with_capacity(p);
    let mut scales = Vec::with_capacity(p);
    for col in &columns {
        let (m, s) = weighted_mean_std(col, &data.weights)
            .ok_or_else(|| EngineError::insufficient("training weights sum to zero"))?;
        means.push(m);
        scales.push(if s.is_finite() && s > MIN_SCALE { s } else { 0.0 });
    }

    let mut x = DMatrix::<f64>::zeros(n, p + 1);
    for i in 0..n {
        x[(i, 0)] = 1.0;
        for j in 0..p {
            if scales[j] > 0.0 {
                x[(i, j + 1)] = (columns[j][i] - means[j]) / scales[j];
            }
        }
    }

    let beta = solve_weighted_ridge(&x, &data.response, &data.weights, lambda, 1)
        .ok_or_else(|| EngineError::insufficient("ridge system could not be solved"))?;
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(EngineError::insufficient("ridge solution is not finite"));
    }

    let mut model = FittedModel {
        feature_set: set,
        intercept: beta[0],
        coefficients: beta.iter().skip(1).copied().collect(),
        means,
        scales,
        residuals: Vec::new(),
        training_rows: n,
    };
    model.residuals = data
        .rows
        .iter()
        .zip(&data.response)
        .map(|(row, dy)| dy - model.predict_change(row))
        .collect();

    tracing::debug!(
        feature_set = ?set,
        rows = n,
        intercept = model.intercept,
        "Fitted ridge model"
    );

    Ok(model)
}

/// Mean absolute one-step error of `model` on `data`.
pub fn mean_absolute_error(model: &FittedModel, data: &TrainingSet) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let total: f64 = data
        .rows
        .iter()
        .zip(&data.response)
        .map(|(row, dy)| (dy - model.predict_change(row)).abs())
        .sum();
    total / data.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(n: usize, f: impl Fn(usize) -> (FeatureRow, f64)) -> TrainingSet {
        let mut set = TrainingSet::default();
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        for i in 0..n {
            let (row, dy) = f(i);
            set.dates.push(start + chrono::Duration::days(i as i64));
            set.rows.push(row);
            set.response.push(dy);
            set.weights.push(1.0);
        }
        set
    }

    #[test]
    fn constant_change_is_captured_by_the_intercept() {
        let data = synthetic(30, |i| {
            let mut row = FeatureRow::default();
            row.target_lag1 = 3.0 + 0.01 * i as f64;
            row.exo.driver_a_lag = 2.5;
            (row, 0.01)
        });
        let model = fit_ridge(FeatureSet::Baseline, &data, 1.0).unwrap();
        assert!((model.intercept - 0.01).abs() < 1e-12, "intercept {}", model.intercept);
        assert!(model.coefficients.iter().all(|c| c.abs() < 1e-10));
        // Flat driver column is zeroed.
        assert_eq!(model.scales[2], 0.0);
        assert!(model.residuals.iter().all(|r| r.abs() < 1e-10));
        assert!(mean_absolute_error(&model, &data) < 1e-10);
    }

    #[test]
    fn recovers_a_linear_pulse_effect() {
        let data = synthetic(60, |i| {
            let mut row = FeatureRow::default();
            row.target_lag1 = 3.0;
            row.exo.pulse_stock = ((i * 7) % 11) as f64 - 5.0;
            (row, 0.002 + 0.004 * row.exo.pulse_stock)
        });
        let ols = fit_ridge(FeatureSet::Augmented, &data, 0.0).unwrap();
        let query = {
            let mut r = FeatureRow::default();
            r.target_lag1 = 3.0;
            r.exo.pulse_stock = 2.0;
            r
        };
        assert!((ols.predict_change(&query) - 0.010).abs() < 1e-9);

        let ridge = fit_ridge(FeatureSet::Augmented, &data, 10.0).unwrap();
        let pulse_idx = ridge.feature_set.features().len() - 2;
        assert!(ridge.coefficients[pulse_idx].abs() < ols.coefficients[pulse_idx].abs());
        assert!(ridge.uses_pulse());
    }

    #[test]
    fn named_coefficients_start_with_intercept() {
        let data = synthetic(10, |i| {
            let mut row = FeatureRow::default();
            row.momentum = i as f64;
            (row, 0.0)
        });
        let model = fit_ridge(FeatureSet::Baseline, &data, 1.0).unwrap();
        let named = model.named_coefficients();
        assert_eq!(named.len(), FeatureSet::Baseline.len() + 1);
        assert_eq!(named[0].0, INTERCEPT);
        assert_eq!(named[2].0, "momentum");
    }
}
