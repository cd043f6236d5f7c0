//! Pulse transform for sparse weekly event series.
//!
//! A release at day `d` contributes `w[i] * value` to day `d + i` for
//! `i < L`, with geometric weights `w[i] = decay^i`. This is a finite impulse
//! response, so the effect of a release has fully vanished `L` days later.
//!
//! Past the last known day no new releases are assumed; only the still-active
//! tail of observed releases is carried forward.

/// Geometric decay weights `[1, decay, decay^2, ...]` of length `len`.
pub fn decay_weights(decay: f64, len: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(len);
    let mut w = 1.0;
    for _ in 0..len {
        out.push(w);
        w *= decay;
    }
    out
}

/// `pulse[t] = Σ_{i<L} w[i] * raw[t-i]`, with days before the series start counted as 0.
pub fn pulse(raw: &[f64], weights: &[f64]) -> Vec<f64> {
    (0..raw.len())
        .map(|t| {
            weights
                .iter()
                .enumerate()
                .take(t + 1)
                .map(|(i, w)| w * raw[t - i])
                .sum()
        })
        .collect()
}

/// Pulse value `h >= 1` days after the last element of `raw`.
///
/// `pulse[T+h] = Σ_{i=h}^{L-1} w[i] * raw[T-(i-h)]`
pub fn project_pulse(raw: &[f64], weights: &[f64], h: usize) -> f64 {
    let Some(last) = raw.len().checked_sub(1) else {
        return 0.0;
    };
    weights
        .iter()
        .enumerate()
        .skip(h)
        .filter_map(|(i, w)| last.checked_sub(i - h).map(|idx| w * raw[idx]))
        .sum()
}
