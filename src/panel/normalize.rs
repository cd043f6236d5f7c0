//! Series normalization: raw observations -> one value per calendar day.
//!
//! Reduction depends on the stream's `SourceClass`:
//!
//! - live feed: arithmetic mean of the day's scrapes
//! - daily snapshot: keyed to the collector's `as_of_date` when the row has
//!   one, else to `published_date - 1`; the latest publication wins
//! - driver: last scrape of the day
//! - weekly event: keyed to the release date parsed from the label, falling
//!   back to the scrape date; the latest scrape wins
//!
//! A day without observations has no entry. Values outside the stream's
//! plausible range are dropped as corrupted scrapes.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

use crate::domain::{DailySeries, Observation, SourceClass, SourceId};

/// Inclusive date window applied to the normalized keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Normalize the observations of one source.
///
/// Observations belonging to other sources are ignored.
pub fn normalize_source(
    source: SourceId,
    observations: &[Observation],
    window: Option<DateWindow>,
    tz: FixedOffset,
) -> DailySeries {
    let mut dropped = 0usize;
    let usable = observations.iter().filter(|o| o.source() == source).filter(|o| {
        let ok = is_plausible(source, o.model_value());
        if !ok {
            dropped += 1;
        }
        ok
    });

    let mut series = DailySeries::new(source);
    match source.class() {
        SourceClass::LiveFeed => {
            let mut acc: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
            for o in usable {
                let e = acc.entry(o.local_date(tz)).or_insert((0.0, 0));
                e.0 += o.model_value();
                e.1 += 1;
            }
            series.values = acc
                .into_iter()
                .map(|(d, (sum, n))| (d, sum / n as f64))
                .collect();
        }
        SourceClass::DailySnapshot => {
            series.values = latest_per_day(usable, |o| {
                o.reference_date()
                    .unwrap_or_else(|| o.local_date(tz) - Duration::days(1))
            });
        }
        SourceClass::Driver => {
            series.values = latest_per_day(usable, |o| o.local_date(tz));
        }
        SourceClass::WeeklyEvent => {
            series.values =
                latest_per_day(usable, |o| o.label_date().unwrap_or_else(|| o.local_date(tz)));
        }
    }

    if dropped > 0 {
        tracing::warn!(source = %source, dropped, "Dropped implausible observations");
    }
    if let Some(w) = window {
        series.values.retain(|d, _| w.contains(*d));
    }
    series
}

/// Normalize every known source. Sources without observations map to empty series.
pub fn normalize_all(
    observations: &[Observation],
    window: Option<DateWindow>,
    tz: FixedOffset,
) -> HashMap<SourceId, DailySeries> {
    SourceId::ALL
        .into_iter()
        .map(|s| (s, normalize_source(s, observations, window, tz)))
        .collect()
}

fn is_plausible(source: SourceId, value: f64) -> bool {
    match source.plausible_range() {
        Some((lo, hi)) => value >= lo && value <= hi,
        None => true,
    }
}

fn latest_per_day<'a>(
    observations: impl Iterator<Item = &'a Observation>,
    key: impl Fn(&Observation) -> NaiveDate,
) -> BTreeMap<NaiveDate, f64> {
    let mut best: BTreeMap<NaiveDate, (DateTime<Utc>, f64)> = BTreeMap::new();
    for o in observations {
        let k = key(o);
        match best.get(&k) {
            Some((ts, _)) if *ts > o.observed_at() => {}
            _ => {
                best.insert(k, (o.observed_at(), o.model_value()));
            }
        }
    }
    best.into_iter().map(|(d, (_, v))| (d, v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn obs(source: SourceId, value: f64, y: i32, m: u32, d: u32, h: u32) -> Observation {
        let ts = Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap();
        Observation::new(source, value, None, None, ts).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn live_feed_averages_same_day_scrapes() {
        let rows = vec![
            obs(SourceId::PrimaryRetailLive, 3.10, 2025, 8, 24, 1),
            obs(SourceId::PrimaryRetailLive, 3.20, 2025, 8, 24, 13),
            obs(SourceId::PrimaryRetailLive, 3.30, 2025, 8, 25, 9),
        ];
        let s = normalize_source(SourceId::PrimaryRetailLive, &rows, None, utc());
        assert_eq!(s.len(), 2);
        assert!((s.get(date(2025, 8, 24)).unwrap() - 3.15).abs() < 1e-12);
        assert!((s.get(date(2025, 8, 25)).unwrap() - 3.30).abs() < 1e-12);
    }

    #[test]
    fn daily_snapshot_shifts_back_one_day() {
        let rows = vec![
            obs(SourceId::PrimaryRetailDaily, 3.15, 2025, 8, 25, 3),
            obs(SourceId::PrimaryRetailDaily, 3.16, 2025, 8, 25, 9),
        ];
        let s = normalize_source(SourceId::PrimaryRetailDaily, &rows, None, utc());
        assert_eq!(s.len(), 1);
        assert_eq!(s.get(date(2025, 8, 24)), Some(3.16));
    }

    #[test]
    fn snapshot_as_of_date_beats_the_scrape_clock() {
        // 03:01 UTC is still the previous evening in New York; the collector's
        // as_of_date says the value is for the 25th.
        let ts = Utc.with_ymd_and_hms(2025, 8, 26, 3, 1, 0).unwrap();
        let dated = Observation::new(SourceId::PrimaryRetailDaily, 3.18, None, None, ts)
            .unwrap()
            .with_reference_date(Some(date(2025, 8, 25)));
        let s = normalize_source(SourceId::PrimaryRetailDaily, &[dated.clone()], None, utc());
        assert_eq!(s.get(date(2025, 8, 25)), Some(3.18));
        assert_eq!(s.len(), 1);

        let undated = Observation::new(SourceId::PrimaryRetailDaily, 3.18, None, None, ts).unwrap();
        let new_york = FixedOffset::west_opt(4 * 3600).unwrap();
        let s = normalize_source(SourceId::PrimaryRetailDaily, &[undated], None, new_york);
        assert_eq!(s.get(date(2025, 8, 24)), Some(3.18));
        let s = normalize_source(SourceId::PrimaryRetailDaily, &[dated], None, new_york);
        assert_eq!(s.get(date(2025, 8, 25)), Some(3.18));
    }

    #[test]
    fn driver_takes_last_of_day() {
        let rows = vec![
            obs(SourceId::DriverAFutures, 2.40, 2025, 8, 25, 16),
            obs(SourceId::DriverAFutures, 2.45, 2025, 8, 25, 18),
            obs(SourceId::DriverAFutures, 2.38, 2025, 8, 25, 14),
        ];
        let s = normalize_source(SourceId::DriverAFutures, &rows, None, utc());
        assert_eq!(s.get(date(2025, 8, 25)), Some(2.45));
    }

    #[test]
    fn weekly_event_uses_label_date_when_available() {
        let ts = Utc.with_ymd_and_hms(2025, 8, 28, 15, 35, 0).unwrap();
        let labelled = Observation::new(
            SourceId::EventStockSurprise,
            -1.5,
            Some(-0.8),
            Some("Week of 2025-08-22".to_string()),
            ts,
        )
        .unwrap();
        let unlabelled =
            Observation::new(SourceId::EventRefineryLevel, 0.2, None, None, ts).unwrap();
        let rows = vec![labelled, unlabelled];

        let stock = normalize_source(SourceId::EventStockSurprise, &rows, None, utc());
        assert_eq!(stock.get(date(2025, 8, 22)), Some(-0.8));
        let runs = normalize_source(SourceId::EventRefineryLevel, &rows, None, utc());
        assert_eq!(runs.get(date(2025, 8, 28)), Some(0.2));
    }

    #[test]
    fn reference_timezone_decides_the_day() {
        // 02:00 UTC is still the previous evening at UTC-5.
        let rows = vec![obs(SourceId::PrimaryRetailLive, 3.0, 2025, 8, 25, 2)];
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let s = normalize_source(SourceId::PrimaryRetailLive, &rows, None, tz);
        assert_eq!(s.first_date(), Some(date(2025, 8, 24)));
    }

    #[test]
    fn implausible_values_and_out_of_window_days_are_dropped() {
        let rows = vec![
            obs(SourceId::DriverAFutures, 5.858, 2025, 8, 26, 14),
            obs(SourceId::DriverAFutures, 2.41, 2025, 8, 26, 12),
            obs(SourceId::DriverAFutures, 2.42, 2025, 8, 27, 12),
        ];
        let window = DateWindow {
            start: date(2025, 8, 26),
            end: date(2025, 8, 26),
        };
        let s = normalize_source(SourceId::DriverAFutures, &rows, Some(window), utc());
        assert_eq!(s.len(), 1);
        assert_eq!(s.get(date(2025, 8, 26)), Some(2.41));
    }
}
