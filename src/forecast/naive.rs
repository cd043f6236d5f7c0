//! Naive fallback forecast for when the model cannot be fitted.
//!
//! Point path: last confirmed value plus the mean of the recent daily changes,
//! decayed geometrically per step. The ensemble adds bootstrapped de-meaned
//! recent changes, so the usual band and threshold summaries still apply.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::domain::{
    AnchorDay, DailySeries, EngineConfig, ForecastMethod, ForecastResult, ModelDiagnostics, SourceId,
};
use crate::error::EngineError;
use crate::forecast::horizon::forecast_horizon;
use crate::forecast::simulate::{ResidualPool, ensemble_bands, run_ensemble};
use crate::forecast::threshold::estimate_thresholds;
use crate::math::mean;

/// Confirmed target history: snapshot where present, live-feed mean otherwise.
pub fn primary_history(series: &HashMap<SourceId, DailySeries>) -> BTreeMap<NaiveDate, f64> {
    let mut out = BTreeMap::new();
    if let Some(live) = series.get(&SourceId::PrimaryRetailLive) {
        out.extend(live.values.iter().map(|(d, v)| (*d, *v)));
    }
    if let Some(snapshot) = series.get(&SourceId::PrimaryRetailDaily) {
        out.extend(snapshot.values.iter().map(|(d, v)| (*d, *v)));
    }
    out
}

/// Per-day changes between consecutive observations, the last `window` of them.
fn recent_changes(history: &BTreeMap<NaiveDate, f64>, window: usize) -> Vec<f64> {
    let points: Vec<(NaiveDate, f64)> = history.iter().map(|(d, v)| (*d, *v)).collect();
    let changes: Vec<f64> = points
        .windows(2)
        .map(|w| {
            let gap = (w[1].0 - w[0].0).num_days().max(1) as f64;
            (w[1].1 - w[0].1) / gap
        })
        .collect();
    let skip = changes.len().saturating_sub(window);
    changes[skip..].to_vec()
}

/// Trend contribution of step `k` (1-based).
fn trend_step(trend: f64, decay: f64, k: usize) -> f64 {
    trend * decay.powi(k as i32 - 1)
}

fn naive_path(
    start: f64,
    trend: f64,
    decay: f64,
    days: usize,
    mut shock: impl FnMut() -> f64,
) -> Vec<f64> {
    let mut level = start;
    (1..=days)
        .map(|k| {
            level += trend_step(trend, decay, k) + shock();
            level
        })
        .collect()
}

pub fn naive_forecast(
    series: &HashMap<SourceId, DailySeries>,
    anchor: AnchorDay,
    reason: &str,
    config: &EngineConfig,
) -> Result<ForecastResult, EngineError> {
    let history = primary_history(series);
    let Some((&last_date, &last_value)) = history.iter().next_back() else {
        return Err(EngineError::insufficient("no primary retail observations"));
    };

    let changes = recent_changes(&history, config.naive.trend_window);
    let trend = mean(&changes).unwrap_or(0.0);
    let demeaned: Vec<f64> = if changes.len() >= 2 {
        changes.iter().map(|c| c - trend).collect()
    } else {
        Vec::new()
    };

    let horizon = forecast_horizon(last_date, anchor, &config.simulation)?;
    let dates = horizon.dates();
    let decay = config.naive.trend_decay;

    let point = naive_path(last_value, trend, decay, dates.len(), || 0.0);
    let pool = ResidualPool::or_zero(&demeaned, config.simulation.residual_jitter);
    let ensemble = run_ensemble(config.simulation.paths, config.simulation.seed, |rng| {
        naive_path(last_value, trend, decay, dates.len(), || pool.draw(rng))
    });
    let bands = ensemble_bands(&dates, &ensemble);
    let (anchor_summary, thresholds) = estimate_thresholds(
        horizon.anchor,
        &ensemble.day_values(horizon.anchor_index()),
        &config.thresholds,
    )?;

    tracing::warn!(
        reason,
        last_date = %last_date,
        trend,
        changes = changes.len(),
        "Using naive fallback forecast"
    );

    Ok(ForecastResult {
        method: ForecastMethod::Naive {
            reason: reason.to_string(),
        },
        last_confirmed_date: last_date,
        last_confirmed_value: last_value,
        dates,
        point,
        ensemble,
        bands,
        anchor: anchor_summary,
        thresholds,
        diagnostics: ModelDiagnostics {
            residual_count: demeaned.len(),
            ..ModelDiagnostics::default()
        },
    })
}
