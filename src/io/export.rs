//! Export forecast results.
//!
//! - JSON: the full `ForecastReport`, for the presentation layer
//! - CSV: one row per horizon day with the point forecast and the bands,
//!   easy to consume in spreadsheets or downstream scripts

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{ForecastReport, ForecastResult};
use crate::error::EngineError;

#[derive(Debug, Serialize)]
struct BandCsvRow {
    date: NaiveDate,
    point: f64,
    p5: f64,
    p25: f64,
    median: f64,
    p75: f64,
    p95: f64,
}

pub fn write_report_json(path: &Path, report: &ForecastReport) -> Result<(), EngineError> {
    let file = File::create(path).map_err(|e| {
        EngineError::Config(format!("failed to create export JSON '{}': {e}", path.display()))
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn read_report_json(path: &Path) -> Result<ForecastReport, EngineError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn write_bands_csv(path: &Path, result: &ForecastResult) -> Result<(), EngineError> {
    let mut writer = csv::Writer::from_path(path)?;
    for (band, point) in result.bands.iter().zip(&result.point) {
        writer.serialize(BandCsvRow {
            date: band.date,
            point: *point,
            p5: band.p5,
            p25: band.p25,
            median: band.median,
            p75: band.p75,
            p95: band.p95,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AnchorSummary, BandRow, Ensemble, ForecastMethod, ModelDiagnostics, ThresholdRow,
    };

    fn result() -> ForecastResult {
        let d0 = NaiveDate::from_ymd_opt(2025, 8, 28).unwrap();
        let d1 = d0.succ_opt().unwrap();
        let band = |date, m: f64| BandRow {
            date,
            p5: m - 0.02,
            p25: m - 0.01,
            median: m,
            p75: m + 0.01,
            p95: m + 0.02,
        };
        ForecastResult {
            method: ForecastMethod::Model,
            last_confirmed_date: d0.pred_opt().unwrap(),
            last_confirmed_value: 3.14,
            dates: vec![d0, d1],
            point: vec![3.15, 3.16],
            ensemble: Ensemble::default(),
            bands: vec![band(d0, 3.15), band(d1, 3.16)],
            anchor: AnchorSummary {
                date: d1,
                mean: 3.16,
                lower: 3.14,
                upper: 3.18,
                lower_percentile: 5.0,
                upper_percentile: 95.0,
            },
            thresholds: vec![ThresholdRow {
                threshold: 3.15,
                probability: 0.7,
            }],
            diagnostics: ModelDiagnostics {
                used_pulse_features: true,
                held_out_mae_baseline: Some(0.004),
                held_out_mae_augmented: Some(0.003),
                training_rows: 120,
                ..ModelDiagnostics::default()
            },
        }
    }

    #[test]
    fn json_report_round_trips_with_contract_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = ForecastReport::from(&result());
        write_report_json(&path, &report).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"pointForecast\""));
        assert!(raw.contains("\"heldOutMAE_baseline\""));
        assert!(raw.contains("\"usedPulseFeatures\": true"));
        assert_eq!(read_report_json(&path).unwrap(), report);
    }

    #[test]
    fn bands_csv_has_one_row_per_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bands.csv");
        write_bands_csv(&path, &result()).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines[0], "date,point,p5,p25,median,p75,p95");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("2025-08-28,3.15,"));
    }
}
