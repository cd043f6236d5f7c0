//! Design rows for the two candidate regressions.
//!
//! The fitter relies on two primitive operations:
//! - fill a design row for a given feature set (for the ridge solve)
//! - predict the next-day change from coefficients (for residuals and paths)
//!
//! Both candidates share the baseline columns; the augmented set appends the
//! two event pulses.

use crate::features::FeatureRow;

/// A single regressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    TargetLag1,
    Momentum,
    DriverALag,
    DriverBLag,
    SpreadLag,
    SpreadChange,
    FallbackGap,
    PulseStock,
    PulseRefinery,
}

impl Feature {
    pub fn name(self) -> &'static str {
        match self {
            Feature::TargetLag1 => "target_lag1",
            Feature::Momentum => "momentum",
            Feature::DriverALag => "driver_a_lag",
            Feature::DriverBLag => "driver_b_lag",
            Feature::SpreadLag => "spread_lag",
            Feature::SpreadChange => "spread_change",
            Feature::FallbackGap => "fallback_gap",
            Feature::PulseStock => "pulse_stock",
            Feature::PulseRefinery => "pulse_refinery",
        }
    }

    pub fn value(self, row: &FeatureRow) -> f64 {
        match self {
            Feature::TargetLag1 => row.target_lag1,
            Feature::Momentum => row.momentum,
            Feature::DriverALag => row.exo.driver_a_lag,
            Feature::DriverBLag => row.exo.driver_b_lag,
            Feature::SpreadLag => row.exo.spread_lag,
            Feature::SpreadChange => row.exo.spread_change,
            Feature::FallbackGap => row.exo.fallback_gap,
            Feature::PulseStock => row.exo.pulse_stock,
            Feature::PulseRefinery => row.exo.pulse_refinery,
        }
    }
}

const BASELINE: [Feature; 7] = [
    Feature::TargetLag1,
    Feature::Momentum,
    Feature::DriverALag,
    Feature::DriverBLag,
    Feature::SpreadLag,
    Feature::SpreadChange,
    Feature::FallbackGap,
];

const AUGMENTED: [Feature; 9] = [
    Feature::TargetLag1,
    Feature::Momentum,
    Feature::DriverALag,
    Feature::DriverBLag,
    Feature::SpreadLag,
    Feature::SpreadChange,
    Feature::FallbackGap,
    Feature::PulseStock,
    Feature::PulseRefinery,
];

/// Name of the unpenalized constant column, always at index 0.
pub const INTERCEPT: &str = "intercept";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSet {
    Baseline,
    /// Baseline plus the event pulses.
    Augmented,
}

impl FeatureSet {
    pub fn features(self) -> &'static [Feature] {
        match self {
            FeatureSet::Baseline => &BASELINE,
            FeatureSet::Augmented => &AUGMENTED,
        }
    }

    pub fn uses_pulse(self) -> bool {
        self == FeatureSet::Augmented
    }

    /// Number of regressors, excluding the intercept.
    pub fn len(self) -> usize {
        self.features().len()
    }

    /// Column names including the intercept at index 0.
    pub fn column_names(self) -> Vec<&'static str> {
        std::iter::once(INTERCEPT)
            .chain(self.features().iter().map(|f| f.name()))
            .collect()
    }
}

/// Fill the raw (unstandardized) regressor values for `row`, intercept excluded.
///
/// # Panics
/// Panics if `out` is shorter than `set.len()`.
pub fn fill_design_row(set: FeatureSet, row: &FeatureRow, out: &mut [f64]) {
    for (slot, feature) in out.iter_mut().zip(set.features()) {
        *slot = feature.value(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn augmented_extends_baseline_with_pulses() {
        let base = FeatureSet::Baseline.features();
        let aug = FeatureSet::Augmented.features();
        assert_eq!(&aug[..base.len()], base);
        assert_eq!(&aug[base.len()..], &[Feature::PulseStock, Feature::PulseRefinery]);
        assert_eq!(FeatureSet::Augmented.column_names()[0], INTERCEPT);
    }

    #[test]
    fn design_row_reads_feature_values() {
        let mut row = FeatureRow::default();
        row.target_lag1 = 3.1;
        row.exo.pulse_refinery = -0.5;
        let mut out = vec![0.0; FeatureSet::Augmented.len()];
        fill_design_row(FeatureSet::Augmented, &row, &mut out);
        assert_eq!(out[0], 3.1);
        assert_eq!(out[8], -0.5);
    }
}
