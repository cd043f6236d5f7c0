//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the pipeline code stays clean and testable
//! - output changes are localized

use crate::domain::{ForecastMethod, ForecastReport, ModelDiagnostics};
use crate::io::ingest::IngestedObservations;

/// Input summary: rows read, skipped and per-source counts.
pub fn format_ingest_summary(ingest: &IngestedObservations) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Input: rows={} used={} skipped={} | as-of {}\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len(),
        ingest.snapshot.as_of().format("%Y-%m-%d %H:%M UTC"),
    ));
    for (source, count) in ingest.snapshot.source_counts() {
        out.push_str(&format!("  {:<24} {count:>7}\n", source.as_str()));
    }
    for err in ingest.row_errors.iter().take(5) {
        out.push_str(&format!("  line {}: {}\n", err.line, err.message));
    }
    if ingest.row_errors.len() > 5 {
        out.push_str(&format!("  ... {} more row errors\n", ingest.row_errors.len() - 5));
    }
    out
}

/// Full forecast summary: method, point path with bands, anchor and thresholds.
pub fn format_forecast(report: &ForecastReport) -> String {
    let mut out = String::new();

    out.push_str("=== pf - retail gasoline forecast ===\n");
    match &report.method {
        ForecastMethod::Model => out.push_str("Method: model\n"),
        ForecastMethod::Naive { reason } => out.push_str(&format!("Method: naive fallback ({reason})\n")),
    }
    out.push_str(&format!(
        "Last confirmed: {} @ {:.3}\n\n",
        report.last_confirmed_date, report.last_confirmed_value
    ));

    out.push_str(
        format!(
            "{:<12} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
            "date", "point", "p5", "p25", "median", "p75", "p95"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!(
        "{:-<12} {:-<8} {:-<8} {:-<8} {:-<8} {:-<8} {:-<8}\n",
        "", "", "", "", "", "", ""
    ));
    for (band, (_, point)) in report.ensemble_bands.iter().zip(&report.point_forecast) {
        let marker = if band.date == report.anchor.date { " <- anchor" } else { "" };
        out.push_str(&format!(
            "{:<12} {:>8.3} {:>8.3} {:>8.3} {:>8.3} {:>8.3} {:>8.3}{marker}\n",
            band.date.to_string(),
            point,
            band.p5,
            band.p25,
            band.median,
            band.p75,
            band.p95
        ));
    }

    let a = &report.anchor;
    out.push_str(&format!(
        "\nAnchor {}: mean {:.3} | p{:.0} {:.3} | p{:.0} {:.3}\n",
        a.date, a.mean, a.lower_percentile, a.lower, a.upper_percentile, a.upper
    ));
    out.push_str("P(value > threshold):\n");
    for row in &report.threshold_table {
        out.push_str(&format!(
            "  > {:>6.2}  {:>5.1}%\n",
            row.threshold,
            row.probability * 100.0
        ));
    }

    if report.method == ForecastMethod::Model {
        out.push('\n');
        out.push_str(&format_diagnostics(&report.model_diagnostics));
    }

    out
}

pub fn format_diagnostics(d: &ModelDiagnostics) -> String {
    let mut out = String::new();
    out.push_str("Model diagnostics:\n");
    out.push_str(&format!(
        "- training rows: {} | residuals: {} | driver substitutions: {}\n",
        d.training_rows, d.residual_count, d.missing_driver_substitutions
    ));
    out.push_str(&format!(
        "- held-out MAE: baseline {} | with pulses {} | pulses used: {}\n",
        fmt_opt(d.held_out_mae_baseline),
        fmt_opt(d.held_out_mae_augmented),
        if d.used_pulse_features { "yes" } else { "no" }
    ));
    out.push_str("- coefficients (standardized):\n");
    for (name, c) in &d.coefficients {
        out.push_str(&format!("    {name:<16} {c:>+10.5}\n"));
    }
    out
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.5}")).unwrap_or_else(|| "n/a".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnchorSummary, BandRow, Ensemble, ForecastResult, ThresholdRow};
    use chrono::NaiveDate;

    #[test]
    fn forecast_table_marks_the_anchor() {
        let d = NaiveDate::from_ymd_opt(2025, 8, 31).unwrap();
        let result = ForecastResult {
            method: ForecastMethod::Naive {
                reason: "insufficient data: 3 rows".into(),
            },
            last_confirmed_date: d.pred_opt().unwrap(),
            last_confirmed_value: 3.1,
            dates: vec![d],
            point: vec![3.12],
            ensemble: Ensemble::default(),
            bands: vec![BandRow {
                date: d,
                p5: 3.1,
                p25: 3.11,
                median: 3.12,
                p75: 3.13,
                p95: 3.14,
            }],
            anchor: AnchorSummary {
                date: d,
                mean: 3.12,
                lower: 3.1,
                upper: 3.14,
                lower_percentile: 5.0,
                upper_percentile: 95.0,
            },
            thresholds: vec![ThresholdRow {
                threshold: 3.1,
                probability: 0.95,
            }],
            diagnostics: ModelDiagnostics::default(),
        };
        let text = format_forecast(&ForecastReport::from(&result));
        assert!(text.contains("naive fallback (insufficient data: 3 rows)"));
        assert!(text.contains("2025-08-31      3.120"));
        assert!(text.contains("<- anchor"));
        assert!(text.contains("95.0%"));
        assert!(!text.contains("Model diagnostics"));
    }

    #[test]
    fn diagnostics_show_gate_outcome_and_coefficients() {
        let d = ModelDiagnostics {
            used_pulse_features: false,
            held_out_mae_baseline: Some(0.0041),
            held_out_mae_augmented: None,
            training_rows: 118,
            residual_count: 118,
            missing_driver_substitutions: 2,
            coefficients: vec![("intercept".into(), 0.001), ("target_lag1".into(), -0.0123)],
        };
        let text = format_diagnostics(&d);
        assert!(text.contains("training rows: 118"));
        assert!(text.contains("driver substitutions: 2"));
        assert!(text.contains("baseline 0.00410 | with pulses n/a | pulses used: no"));
        assert!(text.contains("target_lag1        -0.01230"));
    }
}
