//! Read side of the observation store.
//!
//! The engine never talks to a database directly. Callers hand it an
//! `ObservationStore`; the provided implementation is `Snapshot`, an explicit
//! as-of copy of the store, so repeated runs over the same snapshot see the
//! same rows.

use chrono::{DateTime, Utc};

use crate::domain::{Observation, SourceId};
use crate::error::EngineError;

pub trait ObservationStore {
    /// All observations of `sources` with `start <= observed_at <= end`,
    /// ordered by `observed_at`.
    fn read(
        &self,
        sources: &[SourceId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Observation>, EngineError>;
}

/// Observations known at `as_of`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    as_of: DateTime<Utc>,
    observations: Vec<Observation>,
}

impl Snapshot {
    /// Rows observed after `as_of` are left out.
    pub fn new(observations: Vec<Observation>, as_of: DateTime<Utc>) -> Self {
        let mut observations: Vec<Observation> = observations
            .into_iter()
            .filter(|o| o.observed_at() <= as_of)
            .collect();
        observations.sort_by_key(|o| o.observed_at());
        Self { as_of, observations }
    }

    /// Snapshot as of the latest observation (or the epoch when empty).
    pub fn latest(observations: Vec<Observation>) -> Self {
        let as_of = observations
            .iter()
            .map(|o| o.observed_at())
            .max()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self::new(observations, as_of)
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Count of rows per source, in `SourceId::ALL` order.
    pub fn source_counts(&self) -> Vec<(SourceId, usize)> {
        SourceId::ALL
            .into_iter()
            .map(|s| (s, self.observations.iter().filter(|o| o.source() == s).count()))
            .collect()
    }
}

impl ObservationStore for Snapshot {
    fn read(
        &self,
        sources: &[SourceId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Observation>, EngineError> {
        if end < start {
            return Err(EngineError::Config(format!(
                "read window ends ({end}) before it starts ({start})"
            )));
        }
        Ok(self
            .observations
            .iter()
            .filter(|o| sources.contains(&o.source()))
            .filter(|o| o.observed_at() >= start && o.observed_at() <= end)
            .cloned()
            .collect())
    }
}
