//! Engine error taxonomy.
//!
//! Every failure is local to one forecast request. Callers match on the
//! variant: `InsufficientData` is the signal to fall back to the naive
//! forecast, while `MissingDriverDay` and `DegenerateResidualSet` are raised
//! internally and resolved by the documented substitution policies.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::SourceId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("no panel row for {series} on {date}")]
    MissingDriverDay { series: SourceId, date: NaiveDate },

    #[error("residual set is empty")]
    DegenerateResidualSet,

    #[error("invalid observation: {0}")]
    InvalidObservation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EngineError {
    pub fn insufficient(reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            reason: reason.into(),
        }
    }

    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }

    /// Process exit code for the `pf` binary.
    ///
    /// - 2: bad input or configuration
    /// - 3: not enough data to forecast
    /// - 4: computation failure
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_)
            | Self::InvalidObservation(_)
            | Self::Io(_)
            | Self::Csv(_)
            | Self::Json(_)
            | Self::Toml(_) => 2,
            Self::InsufficientData { .. } => 3,
            Self::MissingDriverDay { .. } | Self::DegenerateResidualSet => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
