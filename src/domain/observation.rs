//! Observation streams and the raw records they produce.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// How a stream is collected, which decides how it is reduced to one value per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceClass {
    /// Many observations per day (sub-hourly scrape).
    LiveFeed,
    /// One authoritative value per day, published for the previous day.
    DailySnapshot,
    /// Futures-like level scraped a few times per trading day.
    Driver,
    /// Weekly release, absent on most days.
    WeeklyEvent,
}

/// The fixed set of named observation streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    PrimaryRetailLive,
    PrimaryRetailDaily,
    DriverAFutures,
    DriverBFutures,
    EventStockSurprise,
    EventRefineryLevel,
}

impl SourceId {
    pub const ALL: [SourceId; 6] = [
        SourceId::PrimaryRetailLive,
        SourceId::PrimaryRetailDaily,
        SourceId::DriverAFutures,
        SourceId::DriverBFutures,
        SourceId::EventStockSurprise,
        SourceId::EventRefineryLevel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceId::PrimaryRetailLive => "primary_retail_live",
            SourceId::PrimaryRetailDaily => "primary_retail_daily",
            SourceId::DriverAFutures => "driver_a_futures",
            SourceId::DriverBFutures => "driver_b_futures",
            SourceId::EventStockSurprise => "event_stock_surprise",
            SourceId::EventRefineryLevel => "event_refinery_level",
        }
    }

    /// Source name used by the collector jobs that write the observation store.
    pub fn collector_name(self) -> &'static str {
        match self {
            SourceId::PrimaryRetailLive => "gasbuddy_fuel_insights",
            SourceId::PrimaryRetailDaily => "aaa_gas_prices",
            SourceId::DriverAFutures => "marketwatch_rbob_futures",
            SourceId::DriverBFutures => "marketwatch_wti_futures",
            SourceId::EventStockSurprise => "tradingeconomics_gasoline_stocks",
            SourceId::EventRefineryLevel => "tradingeconomics_refinery_runs",
        }
    }

    pub fn class(self) -> SourceClass {
        match self {
            SourceId::PrimaryRetailLive => SourceClass::LiveFeed,
            SourceId::PrimaryRetailDaily => SourceClass::DailySnapshot,
            SourceId::DriverAFutures | SourceId::DriverBFutures => SourceClass::Driver,
            SourceId::EventStockSurprise | SourceId::EventRefineryLevel => SourceClass::WeeklyEvent,
        }
    }

    pub fn is_primary(self) -> bool {
        matches!(self, SourceId::PrimaryRetailLive | SourceId::PrimaryRetailDaily)
    }

    /// Whether this stream contributes to the panel calendar.
    pub fn extends_calendar(self) -> bool {
        self.class() != SourceClass::WeeklyEvent
    }

    /// Range outside which a value is treated as a corrupted scrape.
    ///
    /// Retail and RBOB are $/gal, WTI is $/bbl. Event streams are signed
    /// changes and have no fixed range.
    pub fn plausible_range(self) -> Option<(f64, f64)> {
        match self {
            SourceId::PrimaryRetailLive | SourceId::PrimaryRetailDaily => Some((1.0, 10.0)),
            SourceId::DriverAFutures => Some((0.5, 5.0)),
            SourceId::DriverBFutures => Some((10.0, 200.0)),
            SourceId::EventStockSurprise | SourceId::EventRefineryLevel => None,
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        SourceId::ALL
            .into_iter()
            .find(|id| id.as_str() == key || id.collector_name() == key)
            .ok_or_else(|| EngineError::InvalidObservation(format!("unknown source '{s}'")))
    }
}

/// One row of the observation store.
///
/// Fields are private so the finiteness checks in [`Observation::new`] hold
/// for every instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    source: SourceId,
    value: f64,
    secondary_value: Option<f64>,
    event_label: Option<String>,
    observed_at: DateTime<Utc>,
    /// Day the value describes, when the collector recorded it.
    reference_date: Option<NaiveDate>,
}

impl Observation {
    pub fn new(
        source: SourceId,
        value: f64,
        secondary_value: Option<f64>,
        event_label: Option<String>,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        if !value.is_finite() {
            return Err(EngineError::InvalidObservation(format!(
                "{source} value at {observed_at} is not finite"
            )));
        }
        if let Some(v) = secondary_value {
            if !v.is_finite() {
                return Err(EngineError::InvalidObservation(format!(
                    "{source} secondary value at {observed_at} is not finite"
                )));
            }
        }
        let event_label = event_label.and_then(|l| {
            let l = l.trim().to_string();
            if l.is_empty() { None } else { Some(l) }
        });
        Ok(Self {
            source,
            value,
            secondary_value,
            event_label,
            observed_at,
            reference_date: None,
        })
    }

    pub fn with_reference_date(mut self, date: Option<NaiveDate>) -> Self {
        self.reference_date = date;
        self
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn secondary_value(&self) -> Option<f64> {
        self.secondary_value
    }

    pub fn event_label(&self) -> Option<&str> {
        self.event_label.as_deref()
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn reference_date(&self) -> Option<NaiveDate> {
        self.reference_date
    }

    /// Calendar date of the scrape in the reference timezone.
    pub fn local_date(&self, tz: FixedOffset) -> NaiveDate {
        self.observed_at.with_timezone(&tz).date_naive()
    }

    /// The value the engine models for this stream.
    ///
    /// The stock release is modelled as its surprise versus consensus when
    /// the collector captured one.
    pub fn model_value(&self) -> f64 {
        match self.source {
            SourceId::EventStockSurprise => self.secondary_value.unwrap_or(self.value),
            _ => self.value,
        }
    }

    /// Release date embedded in the label, if any.
    pub fn label_date(&self) -> Option<NaiveDate> {
        self.event_label.as_deref().and_then(parse_label_date)
    }
}

/// Find the first `YYYY-MM-DD` or `MM/DD/YYYY` date inside a free-text label.
pub fn parse_label_date(label: &str) -> Option<NaiveDate> {
    label
        .split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
        .map(|tok| tok.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|tok| !tok.is_empty())
        .find_map(|tok| {
            NaiveDate::parse_from_str(tok, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(tok, "%m/%d/%Y"))
                .ok()
        })
}

/// One value per calendar day for a single source.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    pub source: SourceId,
    pub values: BTreeMap<NaiveDate, f64>,
}

impl DailySeries {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.values.get(&date).copied()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.values.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.values.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
