//! Forecast horizon: which calendar days get simulated.
//!
//! The horizon starts the day after the last confirmed target observation and
//! runs through the later of `start + min_horizon_days - 1` and the anchor day.

use chrono::{Duration, NaiveDate};

use crate::domain::{AnchorDay, SimulationConfig};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub anchor: NaiveDate,
}

impl Horizon {
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        (0..self.len())
            .map(|i| self.start + Duration::days(i as i64))
            .collect()
    }

    /// Position of the anchor day within `dates()`.
    pub fn anchor_index(&self) -> usize {
        (self.anchor - self.start).num_days() as usize
    }
}

pub fn forecast_horizon(
    last_confirmed: NaiveDate,
    anchor: AnchorDay,
    config: &SimulationConfig,
) -> Result<Horizon, EngineError> {
    let start = last_confirmed + Duration::days(1);
    let anchor_date = anchor.resolve(start);
    if anchor_date < start {
        return Err(EngineError::Config(format!(
            "anchor day {anchor_date} is not after the last confirmed day {last_confirmed}"
        )));
    }

    let min_end = start + Duration::days(config.min_horizon_days - 1);
    let end = min_end.max(anchor_date);
    let days = (end - start).num_days() + 1;
    if days > config.max_horizon_days {
        return Err(EngineError::Config(format!(
            "horizon of {days} days to {end} exceeds the {}-day maximum",
            config.max_horizon_days
        )));
    }

    Ok(Horizon {
        start,
        end,
        anchor: anchor_date,
    })
}
