//! Panel assembly: per-source daily series -> one contiguous daily table.
//!
//! Fill policy:
//! - target: snapshot value, else live-feed mean, else forward fill, else
//!   back fill (only reachable for the leading rows)
//! - drivers: back fill to seed the leading gap, forward fill afterwards
//! - events: raw value on release days, 0 elsewhere; then the pulse transform
//!
//! The calendar runs from the earliest to the latest date across the primary
//! and driver streams. Event streams never extend it.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};

use crate::domain::{DailySeries, EngineConfig, SourceId};
use crate::error::EngineError;
use crate::panel::pulse::{decay_weights, pulse};
use crate::panel::smooth::robust_smooth;

/// How the target value of a panel day was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    Snapshot,
    LiveFeed,
    ForwardFill,
    BackFill,
}

impl TargetSource {
    /// A confirmed day carries a real observation of the target.
    pub fn is_confirmed(self) -> bool {
        matches!(self, TargetSource::Snapshot | TargetSource::LiveFeed)
    }
}

/// A futures-like driver on the panel calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverColumn {
    pub source: SourceId,
    /// Filled raw levels (for display).
    pub raw: Vec<f64>,
    /// Outlier-repaired and smoothed levels (model input only).
    pub smoothed: Vec<f64>,
    /// False when the stream had no data and the column is all zeros.
    pub present: bool,
}

/// A weekly event stream on the panel calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct EventColumn {
    pub source: SourceId,
    /// Release value on release days, 0 elsewhere.
    pub raw: Vec<f64>,
    pub pulse: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub dates: Vec<NaiveDate>,
    pub target: Vec<f64>,
    pub target_source: Vec<TargetSource>,
    pub snapshot: Vec<Option<f64>>,
    pub live_mean: Vec<Option<f64>>,
    /// `live - snapshot`, 0 when either side is missing.
    pub fallback_gap: Vec<f64>,
    pub driver_a: DriverColumn,
    pub driver_b: DriverColumn,
    pub stock: EventColumn,
    pub refinery: EventColumn,
    pub pulse_weights: Vec<f64>,
}

impl Panel {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn start(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn end(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    /// Row index of `date`; relies on the calendar being contiguous.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        let first = *self.dates.first()?;
        let offset = (date - first).num_days();
        if offset < 0 {
            return None;
        }
        let idx = offset as usize;
        (idx < self.dates.len()).then_some(idx)
    }

    /// Index of the latest day with a confirmed target observation.
    pub fn last_confirmed_index(&self) -> Option<usize> {
        self.target_source.iter().rposition(|s| s.is_confirmed())
    }

    pub fn driver(&self, source: SourceId) -> Option<&DriverColumn> {
        match source {
            SourceId::DriverAFutures => Some(&self.driver_a),
            SourceId::DriverBFutures => Some(&self.driver_b),
            _ => None,
        }
    }

    /// Smoothed driver level on `date`.
    ///
    /// Fails with `MissingDriverDay` when the date lies outside the calendar.
    pub fn driver_at(&self, source: SourceId, date: NaiveDate) -> Result<f64, EngineError> {
        self.driver(source)
            .zip(self.index_of(date))
            .map(|(column, i)| column.smoothed[i])
            .ok_or_else(|| EngineError::MissingDriverDay { series: source, date })
    }

    /// Closest known smoothed driver level: the first value for dates before
    /// the calendar, the latest value for dates after it.
    pub fn nearest_driver(&self, source: SourceId, date: NaiveDate) -> f64 {
        let Some(column) = self.driver(source) else {
            return 0.0;
        };
        if self.is_empty() {
            return 0.0;
        }
        if date < self.start() {
            column.smoothed[0]
        } else {
            column.smoothed[column.smoothed.len() - 1]
        }
    }

    /// True when every consecutive pair of dates is exactly one day apart.
    pub fn is_contiguous(&self) -> bool {
        self.dates.windows(2).all(|w| w[1] - w[0] == Duration::days(1))
    }
}

/// Build the panel from normalized series.
pub fn assemble_panel(
    series: &HashMap<SourceId, DailySeries>,
    config: &EngineConfig,
) -> Result<Panel, EngineError> {
    let with_data: Vec<SourceId> = SourceId::ALL
        .into_iter()
        .filter(|s| series.get(s).is_some_and(|d| !d.is_empty()))
        .collect();

    if with_data.len() < 2 {
        return Err(EngineError::insufficient(format!(
            "need at least two source series with data, found {}",
            with_data.len()
        )));
    }
    if !with_data.iter().any(|s| s.is_primary()) {
        return Err(EngineError::insufficient("no primary retail series has data"));
    }

    let calendar_sources: Vec<&DailySeries> = with_data
        .iter()
        .filter(|s| s.extends_calendar())
        .filter_map(|s| series.get(s))
        .collect();
    let start = calendar_sources
        .iter()
        .filter_map(|d| d.first_date())
        .min()
        .ok_or_else(|| EngineError::insufficient("no calendar source has data"))?;
    let end = calendar_sources
        .iter()
        .filter_map(|d| d.last_date())
        .max()
        .ok_or_else(|| EngineError::insufficient("no calendar source has data"))?;

    let n = (end - start).num_days() as usize + 1;
    let dates: Vec<NaiveDate> = (0..n).map(|i| start + Duration::days(i as i64)).collect();

    let empty_snapshot = DailySeries::new(SourceId::PrimaryRetailDaily);
    let empty_live = DailySeries::new(SourceId::PrimaryRetailLive);
    let snapshot_series = series.get(&SourceId::PrimaryRetailDaily).unwrap_or(&empty_snapshot);
    let live_series = series.get(&SourceId::PrimaryRetailLive).unwrap_or(&empty_live);

    let snapshot: Vec<Option<f64>> = dates.iter().map(|d| snapshot_series.get(*d)).collect();
    let live_mean: Vec<Option<f64>> = dates.iter().map(|d| live_series.get(*d)).collect();

    let (target, target_source) = resolve_target(&snapshot, &live_mean)?;

    let fallback_gap = snapshot
        .iter()
        .zip(&live_mean)
        .map(|(s, l)| match (s, l) {
            (Some(s), Some(l)) => l - s,
            _ => 0.0,
        })
        .collect();

    let driver_a = driver_column(SourceId::DriverAFutures, series, &dates, config);
    let driver_b = driver_column(SourceId::DriverBFutures, series, &dates, config);

    let pulse_weights = decay_weights(config.pulse.decay, config.pulse.length);
    let stock = event_column(SourceId::EventStockSurprise, series, &dates, &pulse_weights);
    let refinery = event_column(SourceId::EventRefineryLevel, series, &dates, &pulse_weights);

    let confirmed = target_source.iter().filter(|s| s.is_confirmed()).count();
    tracing::info!(
        start = %start,
        end = %end,
        days = n,
        confirmed_days = confirmed,
        sources = with_data.len(),
        "Assembled panel"
    );

    Ok(Panel {
        dates,
        target,
        target_source,
        snapshot,
        live_mean,
        fallback_gap,
        driver_a,
        driver_b,
        stock,
        refinery,
        pulse_weights,
    })
}

fn resolve_target(
    snapshot: &[Option<f64>],
    live_mean: &[Option<f64>],
) -> Result<(Vec<f64>, Vec<TargetSource>), EngineError> {
    let n = snapshot.len();
    let mut values: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut sources: Vec<Option<TargetSource>> = Vec::with_capacity(n);

    let mut last: Option<f64> = None;
    for i in 0..n {
        let (v, s) = if let Some(v) = snapshot[i] {
            (Some(v), Some(TargetSource::Snapshot))
        } else if let Some(v) = live_mean[i] {
            (Some(v), Some(TargetSource::LiveFeed))
        } else if let Some(v) = last {
            (Some(v), Some(TargetSource::ForwardFill))
        } else {
            (None, None)
        };
        if v.is_some() {
            last = v;
        }
        values.push(v);
        sources.push(s);
    }

    let first = values
        .iter()
        .position(Option::is_some)
        .ok_or_else(|| EngineError::insufficient("target series has no values"))?;
    let seed = values[first];
    for i in 0..first {
        values[i] = seed;
        sources[i] = Some(TargetSource::BackFill);
    }

    let values = values.into_iter().map(|v| v.unwrap_or(0.0)).collect();
    let sources = sources
        .into_iter()
        .map(|s| s.unwrap_or(TargetSource::BackFill))
        .collect();
    Ok((values, sources))
}

fn driver_column(
    source: SourceId,
    series: &HashMap<SourceId, DailySeries>,
    dates: &[NaiveDate],
    config: &EngineConfig,
) -> DriverColumn {
    let data = series.get(&source).filter(|d| !d.is_empty());
    let Some(data) = data else {
        tracing::warn!(source = %source, "Driver has no data; using a zero column");
        return DriverColumn {
            source,
            raw: vec![0.0; dates.len()],
            smoothed: vec![0.0; dates.len()],
            present: false,
        };
    };

    let mut raw: Vec<Option<f64>> = dates.iter().map(|d| data.get(*d)).collect();
    // Seed the leading gap with the first in-calendar value (or the latest
    // value published before the calendar), then carry forward.
    let seed = raw
        .iter()
        .flatten()
        .next()
        .copied()
        .or_else(|| data.last_date().and_then(|d| data.get(d)))
        .unwrap_or(0.0);
    let mut last = seed;
    for v in raw.iter_mut() {
        match v {
            Some(x) => last = *x,
            None => *v = Some(last),
        }
    }
    let raw: Vec<f64> = raw.into_iter().map(|v| v.unwrap_or(seed)).collect();
    let smoothed = robust_smooth(&raw, &config.smoother);

    DriverColumn {
        source,
        raw,
        smoothed,
        present: true,
    }
}

fn event_column(
    source: SourceId,
    series: &HashMap<SourceId, DailySeries>,
    dates: &[NaiveDate],
    weights: &[f64],
) -> EventColumn {
    let raw: Vec<f64> = match series.get(&source) {
        Some(data) => dates.iter().map(|d| data.get(*d).unwrap_or(0.0)).collect(),
        None => vec![0.0; dates.len()],
    };
    let pulse = pulse(&raw, weights);
    EventColumn { source, raw, pulse }
}
