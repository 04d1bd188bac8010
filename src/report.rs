//! Recap export: CSV tables for spreadsheets and a JSON dump of the batch.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::classifier::{Verdict, VerdictRecord};
use crate::services::BatchReport;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

const UNAVAILABLE: &str = "-";

#[derive(Serialize)]
struct RecapRow<'a> {
    #[serde(rename = "No")]
    no: usize,
    #[serde(rename = "ID Ref")]
    customer_id: &'a str,
    #[serde(rename = "Customer")]
    customer_name: &'a str,
    #[serde(rename = "GSize")]
    nominal_size: u32,
    #[serde(rename = "Qmin")]
    rated_min: f64,
    #[serde(rename = "Qmax")]
    rated_max: f64,
    #[serde(rename = "Flow >= 150% Qmax (h)")]
    hours_over_150: usize,
    #[serde(rename = "Flow >= 120% Qmax (h)")]
    hours_over_120: usize,
    #[serde(rename = "Flow >= 100% Qmax (h)")]
    hours_over_100: usize,
    #[serde(rename = "Flow <= Qmin (h)")]
    hours_under: usize,
    #[serde(rename = "Operating Hours")]
    operating_hours: usize,
    #[serde(rename = "% Flow >= 150% Qmax")]
    pct_over_150: f64,
    #[serde(rename = "% Flow >= 120% Qmax")]
    pct_over_120: f64,
    #[serde(rename = "% Flow >= 100% Qmax")]
    pct_over_100: f64,
    #[serde(rename = "% Flow <= Qmin")]
    pct_under: f64,
    #[serde(rename = "Verdict")]
    verdict: Verdict,
    #[serde(rename = "Outlet Pressure")]
    outlet_pressure: String,
    #[serde(rename = "Spool Diameter")]
    spool_diameter: &'static str,
    #[serde(rename = "Previous Verdict")]
    previous_verdict: String,
    #[serde(rename = "Verdict Two Months Ago")]
    verdict_two_months_ago: String,
    // Filled in by hand after export
    #[serde(rename = "Meter Status")]
    meter_status: &'static str,
    #[serde(rename = "Adjustment Type")]
    adjustment_type: &'static str,
    #[serde(rename = "Adjustment Value")]
    adjustment_value: &'static str,
    #[serde(rename = "Remarks")]
    remarks: &'static str,
}

impl<'a> RecapRow<'a> {
    fn new(no: usize, r: &'a VerdictRecord) -> Self {
        let or_dash = |v: Option<Verdict>| {
            v.map(|v| v.to_string())
                .unwrap_or_else(|| UNAVAILABLE.to_string())
        };
        Self {
            no,
            customer_id: &r.customer_id,
            customer_name: &r.customer_name,
            nominal_size: r.nominal_size,
            rated_min: r.rated_min,
            rated_max: r.rated_max,
            hours_over_150: r.hours_over_150,
            hours_over_120: r.hours_over_120,
            hours_over_100: r.hours_over_100,
            hours_under: r.hours_under,
            operating_hours: r.operating_hours,
            pct_over_150: r.pct_over_150,
            pct_over_120: r.pct_over_120,
            pct_over_100: r.pct_over_100,
            pct_under: r.pct_under,
            verdict: r.verdict,
            outlet_pressure: r
                .outlet_pressure
                .map(|p| format!("{p:.2}"))
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
            spool_diameter: UNAVAILABLE,
            previous_verdict: or_dash(r.previous_verdict),
            verdict_two_months_ago: or_dash(r.verdict_two_months_ago),
            meter_status: UNAVAILABLE,
            adjustment_type: UNAVAILABLE,
            adjustment_value: UNAVAILABLE,
            remarks: UNAVAILABLE,
        }
    }
}

#[derive(Serialize)]
struct FailureRow<'a> {
    #[serde(rename = "Sheet")]
    sheet_name: &'a str,
    #[serde(rename = "ID Ref")]
    customer_id: &'a str,
    #[serde(rename = "Customer")]
    customer_name: &'a str,
    #[serde(rename = "Reason")]
    code: &'static str,
    #[serde(rename = "Detail")]
    detail: String,
}

/// Write one row per classified meter
pub fn write_recap_csv<W: Write>(report: &BatchReport, writer: W) -> Result<(), ReportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for (no, record) in report.records() {
        csv.serialize(RecapRow::new(no, record))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write one row per sheet that could not be classified
pub fn write_failures_csv<W: Write>(report: &BatchReport, writer: W) -> Result<(), ReportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for failure in report.failures() {
        csv.serialize(FailureRow {
            sheet_name: &failure.sheet_name,
            customer_id: failure.customer_id.as_deref().unwrap_or(""),
            customer_name: failure.customer_name.as_deref().unwrap_or(""),
            code: failure.reason.code(),
            detail: failure.reason.to_string(),
        })?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(report: &BatchReport, writer: W) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// Files written by [`export_to_dir`]
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub recap: PathBuf,
    pub failures: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

/// Write `recap_<period>.csv` (plus `recap_<period>_failures.csv` when any
/// sheet failed, and `recap_<period>.json` when requested) into `dir`
pub fn export_to_dir(
    report: &BatchReport,
    dir: &Path,
    with_json: bool,
) -> Result<ExportPaths, ReportError> {
    std::fs::create_dir_all(dir)?;
    let stem = format!("recap_{}", report.period.as_deref().unwrap_or("unnamed"));

    let recap = dir.join(format!("{stem}.csv"));
    write_recap_csv(report, BufWriter::new(File::create(&recap)?))?;

    let failures = if report.failed > 0 {
        let path = dir.join(format!("{stem}_failures.csv"));
        write_failures_csv(report, BufWriter::new(File::create(&path)?))?;
        Some(path)
    } else {
        None
    };

    let json = if with_json {
        let path = dir.join(format!("{stem}.json"));
        let mut writer = BufWriter::new(File::create(&path)?);
        write_json(report, &mut writer)?;
        writer.flush()?;
        Some(path)
    } else {
        None
    };

    info!(
        "Exported {} classified meters to {}",
        report.classified,
        recap.display()
    );
    Ok(ExportPaths {
        recap,
        failures,
        json,
    })
}
