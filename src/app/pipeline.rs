//! Shared forecast pipeline used by the `forecast` and `demo` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! store read -> normalize -> panel -> features -> fit/gate -> simulate -> thresholds
//!
//! The commands can then focus on presentation (printing vs exporting).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::data::ObservationStore;
use crate::domain::{
    AnchorDay, DailySeries, EngineConfig, ForecastMethod, ForecastResult, ModelDiagnostics, SourceId,
};
use crate::error::EngineError;
use crate::features::build_features;
use crate::fit::{fit_and_select, training_set};
use crate::forecast::{estimate_thresholds, forecast_horizon, naive_forecast, simulate};
use crate::panel::{DateWindow, assemble_panel, normalize_all};

/// Extra history read beyond the lookback and lag windows, so the smoother and
/// the first lagged features have data to work with.
const HISTORY_PADDING_DAYS: i64 = 14;

/// One forecast invocation: what the caller knows, and which day it cares about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastRequest {
    pub as_of: DateTime<Utc>,
    pub anchor: AnchorDay,
}

/// Calendar days of history the pipeline reads before `as_of`.
pub fn history_days(config: &EngineConfig) -> i64 {
    config.fit.lookback_days
        + config.features.driver_lag_days
        + config.features.spread_change_days
        + HISTORY_PADDING_DAYS
}

/// Read the request's window from the store and reduce it to daily series.
pub fn load_series<S: ObservationStore + ?Sized>(
    store: &S,
    request: &ForecastRequest,
    config: &EngineConfig,
) -> Result<HashMap<SourceId, DailySeries>, EngineError> {
    let tz = config.panel.timezone()?;
    let start = request.as_of - Duration::days(history_days(config));
    let observations = store.read(&SourceId::ALL, start, request.as_of)?;

    let window = DateWindow {
        start: start.with_timezone(&tz).date_naive(),
        end: request.as_of.with_timezone(&tz).date_naive(),
    };
    let series = normalize_all(&observations, Some(window), tz);

    tracing::info!(
        observations = observations.len(),
        start = %window.start,
        end = %window.end,
        "Loaded observation window"
    );
    for (source, s) in series.iter().filter(|(_, s)| !s.is_empty()) {
        tracing::debug!(source = %source, days = s.len(), "Normalized series");
    }

    Ok(series)
}

/// Fit the model and simulate. Fails with `InsufficientData` when the data
/// cannot support a model.
pub fn model_forecast(
    series: &HashMap<SourceId, DailySeries>,
    anchor: AnchorDay,
    config: &EngineConfig,
) -> Result<ForecastResult, EngineError> {
    let panel = assemble_panel(series, config)?;
    let features = build_features(&panel, &config.features);
    let training = training_set(&panel, &features, &config.fit)?;
    let selection = fit_and_select(&training, &config.fit)?;

    let last = panel
        .last_confirmed_index()
        .ok_or_else(|| EngineError::insufficient("no confirmed target observation"))?;
    let last_date = panel.dates[last];
    let horizon = forecast_horizon(last_date, anchor, &config.simulation)?;

    let sim = simulate(&panel, &features, &selection.model, &horizon, config)?;
    let (anchor_summary, thresholds) = estimate_thresholds(
        horizon.anchor,
        &sim.ensemble.day_values(horizon.anchor_index()),
        &config.thresholds,
    )?;

    let diagnostics = ModelDiagnostics {
        used_pulse_features: selection.used_pulse_features(),
        held_out_mae_baseline: Some(selection.held_out_mae_baseline),
        held_out_mae_augmented: Some(selection.held_out_mae_augmented),
        training_rows: selection.model.training_rows,
        residual_count: sim.residual_count,
        missing_driver_substitutions: features.substitutions + sim.substitutions,
        coefficients: selection.model.named_coefficients(),
    };

    tracing::info!(
        last_confirmed = %last_date,
        anchor = %horizon.anchor,
        anchor_mean = anchor_summary.mean,
        used_pulse_features = diagnostics.used_pulse_features,
        "Model forecast complete"
    );

    Ok(ForecastResult {
        method: ForecastMethod::Model,
        last_confirmed_date: last_date,
        last_confirmed_value: panel.target[last],
        dates: sim.dates,
        point: sim.point,
        ensemble: sim.ensemble,
        bands: sim.bands,
        anchor: anchor_summary,
        thresholds,
        diagnostics,
    })
}

/// Run the model pipeline against `store`.
pub fn run_forecast<S: ObservationStore + ?Sized>(
    store: &S,
    request: &ForecastRequest,
    config: &EngineConfig,
) -> Result<ForecastResult, EngineError> {
    let series = load_series(store, request, config)?;
    model_forecast(&series, request.anchor, config)
}

/// Like `run_forecast`, but answers `InsufficientData` with the naive
/// fallback forecast instead of failing.
pub fn forecast_or_naive<S: ObservationStore + ?Sized>(
    store: &S,
    request: &ForecastRequest,
    config: &EngineConfig,
) -> Result<ForecastResult, EngineError> {
    let series = load_series(store, request, config)?;
    match model_forecast(&series, request.anchor, config) {
        Err(err) if err.is_insufficient_data() => {
            naive_forecast(&series, request.anchor, &err.to_string(), config)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleConfig, Snapshot, generate_sample};
    use crate::domain::Observation;
    use crate::panel::{decay_weights, pulse};
    use chrono::{Datelike, NaiveDate, TimeZone, Weekday};
    use rand::prelude::*;
    use rand::rngs::StdRng;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn at(day: usize, hour: u32) -> DateTime<Utc> {
        let date = start() + Duration::days(day as i64);
        Utc.from_utc_datetime(&date.and_hms_opt(hour, 0, 0).unwrap())
    }

    /// 40 days of live-feed retail rising linearly 3.000 -> 3.400, flat drivers.
    fn linear_snapshot() -> Snapshot {
        let mut rows = Vec::new();
        for day in 0..40 {
            let price = 3.0 + 0.4 * day as f64 / 39.0;
            for hour in [6, 12, 18] {
                rows.push(
                    Observation::new(SourceId::PrimaryRetailLive, price, None, None, at(day, hour))
                        .unwrap(),
                );
            }
            rows.push(Observation::new(SourceId::DriverAFutures, 2.5, None, None, at(day, 21)).unwrap());
            rows.push(Observation::new(SourceId::DriverBFutures, 75.0, None, None, at(day, 21)).unwrap());
        }
        Snapshot::latest(rows)
    }

    /// Live-feed retail with flat drivers and Wednesday event releases. Each
    /// day's retail change is `effect * stock_pulse + U(-noise, noise)`.
    fn event_snapshot(days: usize, seed: u64, effect: f64, noise: f64) -> Snapshot {
        let pulse_cfg = EngineConfig::default().pulse;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::new();
        let mut surprises = vec![0.0; days];
        let mut sign = 1.0_f64;

        for (day, surprise) in surprises.iter_mut().enumerate() {
            let date = start() + Duration::days(day as i64);
            if date.weekday() != Weekday::Wed {
                continue;
            }
            *surprise = sign * rng.gen_range(1.0..5.0);
            sign = -sign;
            let label = Some(format!("Week ending {date}"));
            rows.push(
                Observation::new(
                    SourceId::EventStockSurprise,
                    230.0 + *surprise,
                    Some(*surprise),
                    label.clone(),
                    at(day, 15),
                )
                .unwrap(),
            );
            rows.push(
                Observation::new(
                    SourceId::EventRefineryLevel,
                    90.0 + rng.gen_range(-2.0..2.0),
                    None,
                    label,
                    at(day, 16),
                )
                .unwrap(),
            );
        }

        let stock_pulse = pulse(&surprises, &decay_weights(pulse_cfg.decay, pulse_cfg.length));
        let mut price = 3.2;
        for (day, p) in stock_pulse.iter().enumerate() {
            if day > 0 {
                price += effect * p + rng.gen_range(-noise..noise);
            }
            rows.push(Observation::new(SourceId::PrimaryRetailLive, price, None, None, at(day, 12)).unwrap());
            rows.push(Observation::new(SourceId::DriverAFutures, 2.5, None, None, at(day, 21)).unwrap());
            rows.push(Observation::new(SourceId::DriverBFutures, 75.0, None, None, at(day, 21)).unwrap());
        }
        Snapshot::latest(rows)
    }

    fn request(snapshot: &Snapshot) -> ForecastRequest {
        ForecastRequest {
            as_of: snapshot.as_of(),
            anchor: AnchorDay::MonthEnd,
        }
    }

    fn config(paths: usize) -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.simulation.paths = paths;
        cfg
    }

    #[test]
    fn linear_trend_is_extrapolated_with_bands_around_it() {
        let snap = linear_snapshot();
        let cfg = config(1000);
        let result = run_forecast(&snap, &request(&snap), &cfg).unwrap();

        assert_eq!(result.method, ForecastMethod::Model);
        assert_eq!(result.last_confirmed_date, start() + Duration::days(39));
        assert!(!result.diagnostics.used_pulse_features);

        let slope = 0.4 / 39.0;
        for h in 0..7 {
            let expected = 3.4 + slope * (h + 1) as f64;
            let got = result.point[h];
            assert!((got - expected).abs() <= 0.02, "day {h}: {got} vs {expected}");
            let band = &result.bands[h];
            assert!(band.p5 < got && got < band.p95, "day {h}: {got} not inside ({}, {})", band.p5, band.p95);
        }
    }

    #[test]
    fn fixed_seed_is_idempotent() {
        let snap = linear_snapshot();
        let cfg = config(300);
        let a = run_forecast(&snap, &request(&snap), &cfg).unwrap();
        let b = run_forecast(&snap, &request(&snap), &cfg).unwrap();
        assert_eq!(a.point, b.point);
        assert_eq!(a.diagnostics, b.diagnostics);
        assert_eq!(a.ensemble, b.ensemble);
        assert_eq!(a.thresholds, b.thresholds);
    }

    #[test]
    fn single_short_source_is_insufficient_then_naive() {
        let rows: Vec<Observation> = (0..3)
            .map(|d| {
                Observation::new(SourceId::PrimaryRetailLive, 3.1 + 0.01 * d as f64, None, None, at(d, 12))
                    .unwrap()
            })
            .collect();
        let snap = Snapshot::latest(rows);
        let cfg = config(100);

        let err = run_forecast(&snap, &request(&snap), &cfg).unwrap_err();
        assert!(err.is_insufficient_data(), "got {err}");

        let naive = forecast_or_naive(&snap, &request(&snap), &cfg).unwrap();
        assert!(matches!(naive.method, ForecastMethod::Naive { .. }));
        assert!((naive.point[0] - 3.13).abs() < 1e-9);
    }

    #[test]
    fn synthetic_sample_runs_end_to_end() {
        let snap = generate_sample(&SampleConfig::default()).unwrap();
        let cfg = config(500);
        let result = run_forecast(&snap, &request(&snap), &cfg).unwrap();

        assert_eq!(result.method, ForecastMethod::Model);
        assert!(result.diagnostics.training_rows >= cfg.fit.min_rows);
        assert!(result.diagnostics.held_out_mae_baseline.is_some());
        assert_eq!(result.bands.len(), result.point.len());
        assert!(result.point.iter().all(|v| v.is_finite()));
        for w in result.thresholds.windows(2) {
            assert!(w[0].probability >= w[1].probability);
        }
    }

    #[test]
    fn stock_surprises_that_move_retail_keep_their_pulses() {
        let snap = event_snapshot(150, 11, 0.01, 0.002);
        let cfg = config(300);
        let result = run_forecast(&snap, &request(&snap), &cfg).unwrap();

        let d = &result.diagnostics;
        assert_eq!(result.method, ForecastMethod::Model);
        assert!(d.used_pulse_features);
        let (base, aug) = (d.held_out_mae_baseline.unwrap(), d.held_out_mae_augmented.unwrap());
        assert!(aug < 0.5 * base, "augmented {aug} vs baseline {base}");
        let stock = d.coefficients.iter().find(|(name, _)| name == "pulse_stock").map(|(_, c)| *c);
        assert!(stock.is_some_and(|c| c > 0.0), "pulse_stock coefficient {stock:?}");
    }

    #[test]
    fn unrelated_events_over_noisy_retail_are_gated_out() {
        let snap = event_snapshot(400, 23, 0.0, 0.01);
        let mut cfg = config(300);
        cfg.fit.lookback_days = 400;
        cfg.fit.half_life_days = 365.0;
        let result = run_forecast(&snap, &request(&snap), &cfg).unwrap();

        let d = &result.diagnostics;
        assert_eq!(result.method, ForecastMethod::Model);
        assert!(d.held_out_mae_baseline.is_some_and(|m| m > crate::fit::MAE_FLOOR));
        assert!(!d.used_pulse_features);
        assert!(d.coefficients.iter().all(|(name, _)| !name.starts_with("pulse_")));
    }
}
