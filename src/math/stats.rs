//! Small descriptive-statistics helpers shared by the smoother, fitter and simulator.

use std::cmp::Ordering;

/// Sort a slice of floats in place (NaNs compare equal, so they stay put).
pub fn sort_floats(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
}

pub fn median_mut(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    sort_floats(values);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    let mut v = values.to_vec();
    median_mut(&mut v)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Percentile `q` in `[0, 100]` of an already sorted slice, linear interpolation
/// between closest ranks.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !q.is_finite() {
        return None;
    }
    let q = q.clamp(0.0, 100.0);
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Weighted mean and (population) standard deviation.
pub fn weighted_mean_std(values: &[f64], weights: &[f64]) -> Option<(f64, f64)> {
    let sw: f64 = weights.iter().sum();
    if values.is_empty() || values.len() != weights.len() || !(sw > 0.0) {
        return None;
    }
    let mean = values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / sw;
    let var = values
        .iter()
        .zip(weights)
        .map(|(v, w)| w * (v - mean) * (v - mean))
        .sum::<f64>()
        / sw;
    Some((mean, var.max(0.0).sqrt()))
}

/// Exponentially weighted moving average with `alpha = 2 / (span + 1)`.
///
/// Recursive form seeded with the first value:
/// `s_0 = x_0`, `s_t = alpha x_t + (1 - alpha) s_{t-1}`.
pub fn ewm(values: &[f64], span: f64) -> Vec<f64> {
    let alpha = ewm_alpha(span);
    let mut out = Vec::with_capacity(values.len());
    let mut state: Option<f64> = None;
    for &x in values {
        let s = match state {
            None => x,
            Some(prev) => alpha * x + (1.0 - alpha) * prev,
        };
        out.push(s);
        state = Some(s);
    }
    out
}

pub fn ewm_alpha(span: f64) -> f64 {
    2.0 / (span.max(1.0) + 1.0)
}
