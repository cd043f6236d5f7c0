//! CSV ingest of an observation-store export.
//!
//! Turns a CSV dump of the observation table into a validated `Snapshot`.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Export-friendly headers**: the column names written by the collector
//!   database (`price`, `surprise`, `timestamp`, `scraped_at`) are accepted as
//!   aliases of the engine's field names
//! - **Reference dates**: an optional `as_of_date` column names the day a
//!   daily-snapshot value describes

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::StringRecord;

use crate::data::Snapshot;
use crate::domain::{Observation, SourceId};
use crate::error::EngineError;

/// Engine field name and the header names accepted for it, in priority order.
const COLUMNS: [(&str, &[&str]); 6] = [
    ("source", &["source", "source_id"]),
    ("value", &["value", "price"]),
    ("secondary_value", &["secondary_value", "surprise"]),
    ("event_label", &["event_label", "label", "timestamp"]),
    ("observed_at", &["observed_at", "scraped_at"]),
    ("reference_date", &["as_of_date", "reference_date"]),
];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the snapshot plus what was skipped.
#[derive(Debug, Clone)]
pub struct IngestedObservations {
    pub snapshot: Snapshot,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load an export from disk. `as_of` defaults to the latest `observed_at`.
pub fn load_observations(
    path: &Path,
    as_of: Option<DateTime<Utc>>,
) -> Result<IngestedObservations, EngineError> {
    let file = File::open(path).map_err(|e| {
        EngineError::Config(format!("failed to open CSV '{}': {e}", path.display()))
    })?;
    read_observations(file, as_of)
}

pub fn read_observations<R: Read>(
    input: R,
    as_of: Option<DateTime<Utc>>,
) -> Result<IngestedObservations, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    let columns = resolve_columns(&headers)?;

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header line; CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_row(&record, &columns));
        match parsed {
            Ok(obs) => observations.push(obs),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        tracing::warn!(
            skipped = row_errors.len(),
            first_line = row_errors[0].line,
            first_error = %row_errors[0].message,
            "Skipped invalid observation rows"
        );
    }

    let rows_used = observations.len();
    if rows_used == 0 {
        return Err(EngineError::insufficient("no valid observation rows in CSV"));
    }

    let snapshot = match as_of {
        Some(ts) => Snapshot::new(observations, ts),
        None => Snapshot::latest(observations),
    };
    tracing::info!(rows_read, rows_used, as_of = %snapshot.as_of(), "Ingested observations");

    Ok(IngestedObservations {
        snapshot,
        row_errors,
        rows_read,
        rows_used,
    })
}

/// Map each engine field to a column index.
fn resolve_columns(headers: &StringRecord) -> Result<HashMap<&'static str, usize>, EngineError> {
    let header_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect();

    let mut out = HashMap::new();
    for (field, aliases) in COLUMNS {
        if let Some(idx) = aliases.iter().find_map(|a| header_map.get(*a)) {
            out.insert(field, *idx);
        }
    }
    for required in ["source", "value", "observed_at"] {
        if !out.contains_key(required) {
            return Err(EngineError::Config(format!("missing required column: `{required}`")));
        }
    }
    Ok(out)
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet tools sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_row(record: &StringRecord, columns: &HashMap<&'static str, usize>) -> Result<Observation, String> {
    let source: SourceId = get_required(record, columns, "source")?
        .parse()
        .map_err(|e: EngineError| e.to_string())?;
    let raw_value = get_required(record, columns, "value")?;
    let value = parse_f64(raw_value).ok_or_else(|| format!("invalid value '{raw_value}'"))?;
    let secondary_value = match get_optional(record, columns, "secondary_value") {
        Some(s) => Some(parse_f64(s).ok_or_else(|| format!("invalid secondary value '{s}'"))?),
        None => None,
    };
    let event_label = get_optional(record, columns, "event_label").map(str::to_string);
    let observed_at = parse_timestamp(get_required(record, columns, "observed_at")?)?;
    let reference_date = match get_optional(record, columns, "reference_date") {
        Some(s) => Some(
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("invalid as_of_date '{s}'"))?,
        ),
        None => None,
    };

    Observation::new(source, value, secondary_value, event_label, observed_at)
        .map(|obs| obs.with_reference_date(reference_date))
        .map_err(|e| e.to_string())
}

fn get_required<'a>(
    record: &'a StringRecord,
    columns: &HashMap<&'static str, usize>,
    name: &str,
) -> Result<&'a str, String> {
    get_optional(record, columns, name).ok_or_else(|| format!("missing required value: `{name}`"))
}

fn get_optional<'a>(
    record: &'a StringRecord,
    columns: &HashMap<&'static str, usize>,
    name: &str,
) -> Option<&'a str> {
    let idx = columns.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_f64(s: &str) -> Option<f64> {
    let v = s.trim_start_matches('$').replace(',', "").parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// Parse a scrape timestamp. Offsets are honoured; naive values are UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    const OFFSET_FMTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%#z"];
    for fmt in OFFSET_FMTS {
        if let Ok(ts) = DateTime::parse_from_str(s, fmt) {
            return Ok(ts.with_timezone(&Utc));
        }
    }
    const NAIVE_FMTS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];
    for fmt in NAIVE_FMTS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts.and_utc());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ts) = d.and_hms_opt(0, 0, 0) {
            return Ok(ts.and_utc());
        }
    }
    Err(format!(
        "invalid timestamp '{s}'. Expected RFC 3339, YYYY-MM-DD HH:MM:SS[+offset], or YYYY-MM-DD."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn collector_export_headers_are_accepted() {
        let csv = "\u{feff}Source,fuel_type,Price,timestamp,region,surprise,scraped_at\n\
                   gasbuddy_fuel_insights,regular_gas,3.142,,US,,2025-08-01 14:05:00\n\
                   tradingeconomics_gasoline_stocks,gasoline_stocks_change,-1.2,2025-07-30,US,-2.5,2025-07-31T16:00:00Z\n";
        let ingest = read_observations(csv.as_bytes(), None).unwrap();
        assert_eq!(ingest.rows_used, 2);
        assert!(ingest.row_errors.is_empty());

        let obs = ingest.snapshot.observations();
        let stock = obs.iter().find(|o| o.source() == SourceId::EventStockSurprise).unwrap();
        assert_eq!(stock.secondary_value(), Some(-2.5));
        assert_eq!(stock.model_value(), -2.5);
        assert_eq!(stock.label_date(), NaiveDate::from_ymd_opt(2025, 7, 30));
        let live = obs.iter().find(|o| o.source() == SourceId::PrimaryRetailLive).unwrap();
        assert_eq!(live.observed_at(), Utc.with_ymd_and_hms(2025, 8, 1, 14, 5, 0).unwrap());
    }

    #[test]
    fn as_of_date_column_dates_snapshot_rows() {
        let csv = "source,price,timestamp,scraped_at,as_of_date\n\
                   aaa_gas_prices,3.181,,2025-08-26 03:01:00,2025-08-25\n\
                   aaa_gas_prices,3.175,,2025-08-25 09:00:00,\n\
                   aaa_gas_prices,3.170,,2025-08-24 09:00:00,25/08/2025\n";
        let ingest = read_observations(csv.as_bytes(), None).unwrap();
        assert_eq!(ingest.rows_used, 2);
        assert_eq!(ingest.row_errors.len(), 1);
        assert_eq!(ingest.row_errors[0].line, 4);
        assert!(ingest.row_errors[0].message.contains("as_of_date"));

        let obs = ingest.snapshot.observations();
        let late = obs.iter().find(|o| o.value() == 3.181).unwrap();
        assert_eq!(late.reference_date(), NaiveDate::from_ymd_opt(2025, 8, 25));
        let plain = obs.iter().find(|o| o.value() == 3.175).unwrap();
        assert_eq!(plain.reference_date(), None);

        let utc = chrono::FixedOffset::east_opt(0).unwrap();
        let daily = crate::panel::normalize_source(SourceId::PrimaryRetailDaily, obs, None, utc);
        assert_eq!(daily.get(NaiveDate::from_ymd_opt(2025, 8, 25).unwrap()), Some(3.181));
        assert_eq!(daily.get(NaiveDate::from_ymd_opt(2025, 8, 24).unwrap()), Some(3.175));
    }

    #[test]
    fn bad_rows_are_collected_not_fatal() {
        let csv = "source,value,observed_at\n\
                   driver_a_futures,2.41,2025-08-01T20:00:00Z\n\
                   unknown_feed,1.0,2025-08-01T20:00:00Z\n\
                   driver_a_futures,,2025-08-01T21:00:00Z\n\
                   driver_a_futures,NaN,2025-08-01T21:00:00Z\n\
                   driver_a_futures,2.42,yesterday\n";
        let ingest = read_observations(csv.as_bytes(), None).unwrap();
        assert_eq!(ingest.rows_read, 5);
        assert_eq!(ingest.rows_used, 1);
        let lines: Vec<usize> = ingest.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5, 6]);
    }

    #[test]
    fn missing_required_column_is_a_config_error() {
        let err = read_observations("source,value\nx,1\n".as_bytes(), None).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)), "got {err}");
    }

    #[test]
    fn as_of_cuts_later_rows() {
        let csv = "source,value,observed_at\n\
                   primary_retail_live,3.10,2025-08-01T12:00:00Z\n\
                   primary_retail_live,3.12,2025-08-03T12:00:00Z\n";
        let as_of = Utc.with_ymd_and_hms(2025, 8, 2, 0, 0, 0).unwrap();
        let ingest = read_observations(csv.as_bytes(), Some(as_of)).unwrap();
        assert_eq!(ingest.snapshot.len(), 1);
        assert_eq!(ingest.snapshot.as_of(), as_of);
    }

    #[test]
    fn timestamp_formats() {
        let want = Utc.with_ymd_and_hms(2025, 8, 1, 14, 5, 0).unwrap();
        assert_eq!(parse_timestamp("2025-08-01T14:05:00Z").unwrap(), want);
        assert_eq!(parse_timestamp("2025-08-01 10:05:00-04:00").unwrap(), want);
        assert_eq!(parse_timestamp("2025-08-01 14:05:00.000").unwrap(), want);
        assert!(parse_timestamp("08/01/2025").is_err());
    }
}
