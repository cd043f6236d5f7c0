//! Pulse-feature gating.
//!
//! The event pulses only stay in the model when they earn their place on data
//! the fit has not seen:
//!
//! 1. Split the training rows chronologically: the first 80% fit, the last 20%
//!    evaluate.
//! 2. Fit baseline and baseline+pulse on the fitting part and compute each
//!    candidate's held-out MAE of one-step predictions.
//! 3. Keep the pulses iff `mae_aug <= (1 - tolerance) * mae_base`. A baseline
//!    that is already exact on the held-out rows cannot be improved on, so the
//!    baseline is kept there.
//! 4. Refit the chosen set on all training rows.

use crate::domain::FitConfig;
use crate::error::EngineError;
use crate::fit::fitter::{FittedModel, TrainingSet, fit_ridge, mean_absolute_error};
use crate::models::FeatureSet;

/// Held-out errors at or below this count as a perfect baseline.
pub const MAE_FLOOR: f64 = 1e-9;

/// Output of gating + final refit.
#[derive(Debug, Clone)]
pub struct ModelSelection {
    pub model: FittedModel,
    pub held_out_mae_baseline: f64,
    pub held_out_mae_augmented: f64,
    pub held_out_rows: usize,
}

impl ModelSelection {
    pub fn used_pulse_features(&self) -> bool {
        self.model.uses_pulse()
    }
}

/// Index where the held-out block starts.
pub fn holdout_split(n: usize, holdout_fraction: f64) -> usize {
    let held = ((n as f64) * holdout_fraction - 1e-9).ceil() as usize;
    n.saturating_sub(held.max(1)).max(1).min(n)
}

/// Decide whether the augmented model beats the baseline by enough.
pub fn keep_pulse(mae_base: f64, mae_aug: f64, tolerance: f64) -> bool {
    mae_base > MAE_FLOOR && mae_aug <= (1.0 - tolerance) * mae_base
}

/// Gate the pulse features and fit the final model.
pub fn fit_and_select(data: &TrainingSet, config: &FitConfig) -> Result<ModelSelection, EngineError> {
    let n = data.len();
    let split = holdout_split(n, config.holdout_fraction);
    if split >= n {
        return Err(EngineError::insufficient(format!(
            "{n} training rows leave nothing to hold out"
        )));
    }

    let fit_part = data.slice(0..split);
    let held_out = data.slice(split..n);

    let base = fit_ridge(FeatureSet::Baseline, &fit_part, config.ridge_lambda)?;
    let aug = fit_ridge(FeatureSet::Augmented, &fit_part, config.ridge_lambda)?;
    let mae_base = mean_absolute_error(&base, &held_out);
    let mae_aug = mean_absolute_error(&aug, &held_out);

    let use_pulse = keep_pulse(mae_base, mae_aug, config.gate_tolerance);
    let chosen = if use_pulse {
        FeatureSet::Augmented
    } else {
        FeatureSet::Baseline
    };

    tracing::info!(
        mae_baseline = mae_base,
        mae_augmented = mae_aug,
        held_out_rows = n - split,
        use_pulse,
        "Gated pulse features"
    );

    let model = fit_ridge(chosen, data, config.ridge_lambda)?;

    Ok(ModelSelection {
        model,
        held_out_mae_baseline: mae_base,
        held_out_mae_augmented: mae_aug,
        held_out_rows: n - split,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureRow;
    use chrono::{Duration, NaiveDate};
    use rand::prelude::*;
    use rand::rngs::StdRng;

    fn data(n: usize, mut f: impl FnMut(usize) -> (FeatureRow, f64)) -> TrainingSet {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut set = TrainingSet::default();
        for i in 0..n {
            let (row, dy) = f(i);
            set.dates.push(start + Duration::days(i as i64));
            set.rows.push(row);
            set.response.push(dy);
            set.weights.push(1.0);
        }
        set
    }

    fn pulse_pattern(i: usize) -> f64 {
        // Weekly release with a decaying tail, alternating sign.
        let phase = i % 7;
        let sign = if (i / 7) % 2 == 0 { 1.0 } else { -1.5 };
        if phase < 4 { sign * 0.6f64.powi(phase as i32) } else { 0.0 }
    }

    #[test]
    fn split_keeps_at_least_one_row_each_side() {
        assert_eq!(holdout_split(100, 0.2), 80);
        assert_eq!(holdout_split(24, 0.2), 19);
        assert_eq!(holdout_split(2, 0.2), 1);
        assert_eq!(holdout_split(2, 0.9), 1);
    }

    #[test]
    fn gate_rule() {
        assert!(keep_pulse(0.010, 0.0096, 0.03));
        assert!(!keep_pulse(0.010, 0.0098, 0.03));
        assert!(!keep_pulse(0.0, 0.0, 0.03));
    }

    #[test]
    fn pulses_that_drive_the_target_are_kept() {
        let set = data(60, |i| {
            let mut row = FeatureRow::default();
            row.target_lag1 = 3.0 + 0.001 * i as f64;
            row.exo.pulse_stock = pulse_pattern(i);
            (row, 0.001 + 0.02 * row.exo.pulse_stock)
        });
        let sel = fit_and_select(&set, &FitConfig::default()).unwrap();
        assert!(sel.used_pulse_features());
        assert!(sel.held_out_mae_augmented < 0.5 * sel.held_out_mae_baseline);
        assert_eq!(sel.model.training_rows, 60);
        assert_eq!(sel.held_out_rows, 12);
    }

    #[test]
    fn noise_pulses_rarely_pass_the_gate() {
        // Pulses independent of a noisy response. Any one seed may get lucky
        // on the held-out block; across seeds the gate must mostly say no.
        let mut kept = 0;
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let set = data(300, |i| {
                let mut row = FeatureRow::default();
                row.target_lag1 = 3.0 + 0.001 * i as f64;
                row.exo.pulse_stock = rng.gen_range(-5.0..5.0);
                row.exo.pulse_refinery = rng.gen_range(-5.0..5.0);
                (row, 0.001 + rng.gen_range(-0.01..0.01))
            });
            let sel = fit_and_select(&set, &FitConfig::default()).unwrap();
            assert!(sel.held_out_mae_baseline > MAE_FLOOR, "seed {seed}");
            if sel.used_pulse_features() {
                kept += 1;
            }
        }
        assert!(kept <= 5, "noise pulses kept for {kept} of 50 seeds");
    }
}
