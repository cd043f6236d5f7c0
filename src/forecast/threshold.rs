//! Anchor-day distribution summary and exceedance probabilities.

use chrono::NaiveDate;

use crate::domain::{AnchorSummary, ThresholdConfig, ThresholdRow};
use crate::error::EngineError;
use crate::math::{mean, percentile_sorted, sort_floats};

/// Threshold grid: multiples of `increment` centred on `center` rounded to the grid.
pub fn threshold_grid(center: f64, config: &ThresholdConfig) -> Vec<f64> {
    let inc = config.increment;
    let k0 = (center / inc).round() as i64;
    let n = config.steps_each_side as i64;
    (-n..=n)
        .map(|k| round_to_micros((k0 + k) as f64 * inc))
        .collect()
}

fn round_to_micros(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

/// `P(value > threshold)` for every threshold, as a fraction of `values`.
pub fn exceedance_table(values: &[f64], thresholds: &[f64]) -> Vec<ThresholdRow> {
    let n = values.len().max(1) as f64;
    thresholds
        .iter()
        .map(|&threshold| ThresholdRow {
            threshold,
            probability: values.iter().filter(|v| **v > threshold).count() as f64 / n,
        })
        .collect()
}

/// Summarize the ensemble values of the anchor day.
pub fn estimate_thresholds(
    date: NaiveDate,
    values: &[f64],
    config: &ThresholdConfig,
) -> Result<(AnchorSummary, Vec<ThresholdRow>), EngineError> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let avg = mean(&sorted)
        .ok_or_else(|| EngineError::insufficient(format!("no ensemble values on {date}")))?;
    sort_floats(&mut sorted);

    let lower = percentile_sorted(&sorted, config.lower_percentile).unwrap_or(avg);
    let upper = percentile_sorted(&sorted, config.upper_percentile).unwrap_or(avg);

    let grid = threshold_grid(avg, config);
    let table = exceedance_table(&sorted, &grid);

    let summary = AnchorSummary {
        date,
        mean: avg,
        lower,
        upper,
        lower_percentile: config.lower_percentile,
        upper_percentile: config.upper_percentile,
    };
    Ok((summary, table))
}
