//! Robust smoothing of driver series (model inputs only).
//!
//! Two passes:
//! 1. outlier repair: a point is replaced by its centered rolling median when
//!    it deviates by more than `n_sigma * 1.4826 * MAD` (the factor makes MAD
//!    comparable to a standard deviation under normality);
//! 2. exponential weighted average with a short span.
//!
//! Only points with a full window are candidates for repair: the first and
//! last `radius` points pass through unchanged, so a move on the latest day
//! survives until later days confirm or contradict it.

use crate::domain::SmootherConfig;
use crate::math::{ewm, median_mut};

/// MAD to standard-deviation scale factor under a normal distribution.
pub const MAD_SCALE: f64 = 1.4826;

/// Replace outliers with the rolling median.
pub fn repair_outliers(values: &[f64], radius: usize, n_sigma: f64) -> Vec<f64> {
    let n = values.len();
    let mut out = values.to_vec();
    let mut window = Vec::with_capacity(2 * radius + 1);
    let mut deviations = Vec::with_capacity(2 * radius + 1);

    for i in 0..n {
        if i < radius || i + radius >= n {
            continue;
        }
        let lo = i - radius;
        let hi = i + radius;

        window.clear();
        window.extend_from_slice(&values[lo..=hi]);
        let Some(med) = median_mut(&mut window) else {
            continue;
        };

        deviations.clear();
        deviations.extend(values[lo..=hi].iter().map(|v| (v - med).abs()));
        let mad = median_mut(&mut deviations).unwrap_or(0.0);

        let limit = n_sigma * MAD_SCALE * mad;
        let dev = (values[i] - med).abs();
        // With MAD = 0 the window is flat apart from isolated points; only a
        // genuine departure (beyond float noise) counts as an outlier.
        if dev > limit && dev > 1e-12 * med.abs().max(1.0) {
            out[i] = med;
        }
    }

    out
}

/// Outlier repair followed by EWM smoothing.
pub fn robust_smooth(values: &[f64], config: &SmootherConfig) -> Vec<f64> {
    let repaired = repair_outliers(values, config.radius, config.n_sigma);
    ewm(&repaired, config.span)
}
