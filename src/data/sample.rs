//! Synthetic observation-store contents for `pf demo` and pipeline tests.
//!
//! The generator mimics the collector cadences:
//! - live feed: four scrapes per day
//! - daily snapshot: one publication the following morning
//! - drivers: one close per day, random walks
//! - weekly events: one release per week, labelled with its release date
//!
//! Retail follows driver A with a one-week transmission lag plus a small
//! response to stock surprises, so the fitted model has something to find.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::store::Snapshot;
use crate::domain::{Observation, SourceId};
use crate::error::EngineError;

/// Transmission lag from driver A to retail in the generated data.
const RETAIL_LAG_DAYS: usize = 7;
/// Daily pull of retail towards its driver-implied level.
const PASS_THROUGH: f64 = 0.15;
/// Retail markup over driver A, $/gal.
const MARKUP: f64 = 0.95;

#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub start: NaiveDate,
    pub days: usize,
    pub seed: u64,
    /// Include the daily snapshot stream (otherwise only the live feed covers retail).
    pub with_snapshot: bool,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap_or_default(),
            days: 180,
            seed: 7,
            with_snapshot: true,
        }
    }
}

/// Generate a snapshot as of the last generated scrape.
pub fn generate_sample(config: &SampleConfig) -> Result<Snapshot, EngineError> {
    if config.days < 2 {
        return Err(EngineError::Config("sample needs at least two days".into()));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = |sd: f64| {
        Normal::new(0.0, sd).map_err(|e| EngineError::Config(format!("noise distribution error: {e}")))
    };
    let rbob_noise = normal(0.02)?;
    let wti_noise = normal(0.6)?;
    let retail_noise = normal(0.003)?;
    let scrape_noise = normal(0.002)?;
    let surprise_noise = normal(2.0)?;
    let runs_noise = normal(1.0)?;

    let mut rbob = Vec::with_capacity(config.days);
    let mut wti = Vec::with_capacity(config.days);
    let mut a = 2.30;
    let mut b = 70.0;
    for _ in 0..config.days {
        a = (a + rbob_noise.sample(&mut rng)).clamp(1.2, 3.8);
        b = (b + wti_noise.sample(&mut rng)).clamp(40.0, 120.0);
        rbob.push(a);
        wti.push(b);
    }

    let mut observations = Vec::new();
    let mut retail = MARKUP + rbob[0];
    let mut surprise_effect = 0.0;

    for day in 0..config.days {
        let date = config.start + Duration::days(day as i64);

        if date.weekday() == Weekday::Wed {
            let surprise: f64 = surprise_noise.sample(&mut rng);
            let label = Some(format!("Week ending {date}"));
            observations.push(Observation::new(
                SourceId::EventStockSurprise,
                230.0 + surprise,
                Some(surprise),
                label.clone(),
                at(date, 15, 30)?,
            )?);
            observations.push(Observation::new(
                SourceId::EventRefineryLevel,
                90.0 + runs_noise.sample(&mut rng),
                None,
                label,
                at(date, 15, 35)?,
            )?);
            // A draw (negative surprise) lifts retail over the following days.
            surprise_effect = -0.002 * surprise;
        }

        let implied = MARKUP + rbob[day.saturating_sub(RETAIL_LAG_DAYS)];
        retail += PASS_THROUGH * (implied - retail) + surprise_effect + retail_noise.sample(&mut rng);
        surprise_effect *= 0.6;

        for hour in [2, 8, 14, 20] {
            observations.push(Observation::new(
                SourceId::PrimaryRetailLive,
                retail + scrape_noise.sample(&mut rng),
                None,
                None,
                at(date, hour, 5)?,
            )?);
        }
        // Published the next morning for this day.
        if config.with_snapshot && day + 1 < config.days {
            observations.push(Observation::new(
                SourceId::PrimaryRetailDaily,
                round_cents_tenth(retail),
                None,
                None,
                at(date + Duration::days(1), 9, 0)?,
            )?);
        }
        observations.push(Observation::new(
            SourceId::DriverAFutures,
            rbob[day],
            None,
            None,
            at(date, 21, 0)?,
        )?);
        observations.push(Observation::new(
            SourceId::DriverBFutures,
            wti[day],
            None,
            None,
            at(date, 21, 0)?,
        )?);
    }

    tracing::debug!(rows = observations.len(), days = config.days, "Generated sample observations");
    Ok(Snapshot::latest(observations))
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> Result<DateTime<Utc>, EngineError> {
    date.and_hms_opt(hour, minute, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| EngineError::Config(format!("invalid sample time {date} {hour}:{minute}")))
}

/// Published retail averages carry three decimals.
fn round_cents_tenth(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_deterministic_for_a_seed() {
        let cfg = SampleConfig {
            days: 30,
            ..SampleConfig::default()
        };
        let a = generate_sample(&cfg).unwrap();
        let b = generate_sample(&cfg).unwrap();
        assert_eq!(a, b);
        let c = generate_sample(&SampleConfig { seed: 8, ..cfg }).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn every_stream_is_populated() {
        let snap = generate_sample(&SampleConfig {
            days: 21,
            ..SampleConfig::default()
        })
        .unwrap();
        for (source, count) in snap.source_counts() {
            assert!(count > 0, "{source} has no rows");
        }
        let live = snap
            .source_counts()
            .into_iter()
            .find(|(s, _)| *s == SourceId::PrimaryRetailLive)
            .map(|(_, n)| n);
        assert_eq!(live, Some(84));
        assert!(snap.observations().iter().all(|o| {
            o.source()
                .plausible_range()
                .is_none_or(|(lo, hi)| (lo..=hi).contains(&o.value()))
        }));
    }

    #[test]
    fn too_short_is_rejected() {
        let err = generate_sample(&SampleConfig {
            days: 1,
            ..SampleConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
