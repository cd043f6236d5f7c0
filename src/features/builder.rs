//! Per-day feature construction.
//!
//! Features split into two groups:
//!
//! - endogenous: depend on the target path itself (`target_lag1`,
//!   `momentum`) and must be recomputed along every simulated path
//! - exogenous: depend only on drivers, the fallback gap and event pulses,
//!   so they are identical for every path on a given date
//!
//! All lookups go through the filled panel, so no feature is ever missing.
//! A lag lookup that falls off the calendar is a `MissingDriverDay`; it is
//! resolved by substituting the nearest known driver level and counted.

use chrono::{Duration, NaiveDate};

use crate::domain::{FeatureConfig, SourceId};
use crate::math::ewm;
use crate::panel::{Panel, project_pulse};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Exogenous {
    pub driver_a_lag: f64,
    pub driver_b_lag: f64,
    pub spread_lag: f64,
    pub spread_change: f64,
    pub fallback_gap: f64,
    pub pulse_stock: f64,
    pub pulse_refinery: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureRow {
    pub target_lag1: f64,
    pub momentum: f64,
    pub exo: Exogenous,
}

/// Features for every panel day, aligned with `panel.dates`.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
    /// EWM of the resolved target, used to seed the momentum state when forecasting.
    pub target_ewm: Vec<f64>,
    pub substitutions: usize,
}

/// Bounded momentum: `max_move * tanh(diff / max_move)`.
pub fn squash_momentum(diff: f64, max_move: f64) -> f64 {
    max_move * (diff / max_move).tanh()
}

/// Build the feature table for the whole panel.
pub fn build_features(panel: &Panel, config: &FeatureConfig) -> FeatureTable {
    let target_ewm = ewm(&panel.target, config.momentum_span);
    let mut substitutions = 0usize;

    let rows = panel
        .dates
        .iter()
        .enumerate()
        .map(|(i, &date)| {
            let target_lag1 = if i > 0 { panel.target[i - 1] } else { panel.target[0] };
            let momentum = if i >= 2 {
                squash_momentum(target_ewm[i - 1] - target_ewm[i - 2], config.max_daily_move)
            } else {
                0.0
            };
            FeatureRow {
                target_lag1,
                momentum,
                exo: exogenous_at(panel, config, date, &mut substitutions),
            }
        })
        .collect();

    if substitutions > 0 {
        tracing::debug!(substitutions, "Substituted nearest driver values for off-calendar lags");
    }

    FeatureTable {
        rows,
        target_ewm,
        substitutions,
    }
}

/// Exogenous features for any date, inside or past the panel calendar.
pub fn exogenous_at(
    panel: &Panel,
    config: &FeatureConfig,
    date: NaiveDate,
    substitutions: &mut usize,
) -> Exogenous {
    let lag_date = date - Duration::days(config.driver_lag_days);
    let prev_date = lag_date - Duration::days(config.spread_change_days);

    let a = driver_or_nearest(panel, SourceId::DriverAFutures, lag_date, substitutions);
    let b = driver_or_nearest(panel, SourceId::DriverBFutures, lag_date, substitutions);
    let a_prev = driver_or_nearest(panel, SourceId::DriverAFutures, prev_date, substitutions);
    let b_prev = driver_or_nearest(panel, SourceId::DriverBFutures, prev_date, substitutions);

    let spread_lag = config.spread_driver_a_scale * a - b;
    let spread_prev = config.spread_driver_a_scale * a_prev - b_prev;

    let (fallback_gap, pulse_stock, pulse_refinery) = match panel.index_of(date) {
        Some(i) => (panel.fallback_gap[i], panel.stock.pulse[i], panel.refinery.pulse[i]),
        None if !panel.is_empty() && date > panel.end() => {
            let h = (date - panel.end()).num_days() as usize;
            (
                0.0,
                project_pulse(&panel.stock.raw, &panel.pulse_weights, h),
                project_pulse(&panel.refinery.raw, &panel.pulse_weights, h),
            )
        }
        None => (0.0, 0.0, 0.0),
    };

    Exogenous {
        driver_a_lag: a,
        driver_b_lag: b,
        spread_lag,
        spread_change: spread_lag - spread_prev,
        fallback_gap,
        pulse_stock,
        pulse_refinery,
    }
}

fn driver_or_nearest(
    panel: &Panel,
    source: SourceId,
    date: NaiveDate,
    substitutions: &mut usize,
) -> f64 {
    match panel.driver_at(source, date) {
        Ok(v) => v,
        Err(err) => {
            tracing::trace!(%err, "Using nearest driver value");
            *substitutions += 1;
            panel.nearest_driver(source, date)
        }
    }
}
