use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classifier::{ClassificationFailure, FailureReason};
use crate::importers::column_mapping::{ColumnMapping, DetectorRegistry};
use crate::model::{FlowSample, MeterSheet, SampleSeries};
use crate::utils::clean_customer_name;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to open workbook: {0}")]
    WorkbookOpen(String),

    #[error("Workbook contains no sheets")]
    NoSheets,
}

/// Outcome of reading one worksheet
pub type SheetResult = Result<MeterSheet, ClassificationFailure>;

/// Cell coordinates of the per-customer sheet layout (0-based, absolute)
///
/// # Expected Sheet Structure:
/// ```text
/// Row 5  (4):  ...            | <customer id>
/// Row 6  (5):  Place Id: <customer name>
/// Row 9  (8):  ...            | <manufacturer>
/// Row 10 (9):  ...            | G<size>
/// Row 13 (12): column headers (Date/Time | Flow (m3/h) | Max. Flow (m3/h) | ...)
/// Row 14+:     hourly data
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub customer_id: (u32, u32),
    pub customer_name: (u32, u32),
    pub manufacturer: (u32, u32),
    pub size_designator: (u32, u32),
    pub header_row: u32,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            customer_id: (4, 1),
            customer_name: (5, 0),
            manufacturer: (8, 1),
            size_designator: (9, 1),
            header_row: 12,
        }
    }
}

/// Reads per-customer meter sheets from .xls/.xlsx workbooks
pub struct WorkbookImporter {
    layout: SheetLayout,
    detectors: DetectorRegistry,
}

impl WorkbookImporter {
    pub fn new(layout: SheetLayout, detectors: DetectorRegistry) -> Self {
        Self { layout, detectors }
    }

    /// Read every sheet of a workbook on disk
    ///
    /// This is synchronous, async callers should use spawn_blocking.
    pub fn import_path(&self, path: impl AsRef<Path>) -> Result<Vec<SheetResult>, ImportError> {
        let path = path.as_ref();
        info!("Opening workbook: {}", path.display());

        let mut workbook = match open_workbook_auto(path) {
            Ok(wb) => wb,
            Err(e) => return Err(ImportError::WorkbookOpen(e.to_string())),
        };
        self.import_workbook(&mut workbook)
    }

    /// Read every sheet of an uploaded workbook held in memory
    pub fn import_bytes(&self, bytes: Vec<u8>) -> Result<Vec<SheetResult>, ImportError> {
        debug!("Opening in-memory workbook ({} bytes)", bytes.len());

        let mut workbook = match open_workbook_auto_from_rs(Cursor::new(bytes)) {
            Ok(wb) => wb,
            Err(e) => return Err(ImportError::WorkbookOpen(e.to_string())),
        };
        self.import_workbook(&mut workbook)
    }

    fn import_workbook<RS: Read + Seek>(
        &self,
        workbook: &mut Sheets<RS>,
    ) -> Result<Vec<SheetResult>, ImportError> {
        let sheet_names = workbook.sheet_names().to_owned();
        if sheet_names.is_empty() {
            return Err(ImportError::NoSheets);
        }
        debug!("Found {} sheets", sheet_names.len());

        let results: Vec<SheetResult> = sheet_names
            .iter()
            .map(|sheet_name| match workbook.worksheet_range(sheet_name) {
                Ok(range) => self.parse_sheet(sheet_name, &range),
                Err(e) => {
                    warn!("Failed to read sheet {}: {}", sheet_name, e);
                    Err(ClassificationFailure {
                        sheet_name: sheet_name.clone(),
                        customer_id: None,
                        customer_name: None,
                        reason: FailureReason::MissingFlowData {
                            detail: format!("sheet could not be read: {e}"),
                        },
                    })
                }
            })
            .collect();

        info!(
            "Read {} sheets ({} with meter data)",
            results.len(),
            results.iter().filter(|r| r.is_ok()).count()
        );
        Ok(results)
    }

    /// Extract the header block and hourly samples of one sheet
    pub fn parse_sheet(&self, sheet_name: &str, range: &Range<Data>) -> SheetResult {
        let layout = &self.layout;

        let customer_id = cell_text(range, layout.customer_id).unwrap_or_else(|| {
            warn!("Sheet {} has no customer id", sheet_name);
            String::new()
        });
        let customer_name = cell_text(range, layout.customer_name).unwrap_or_default();
        let manufacturer = cell_text(range, layout.manufacturer);
        let size_designator = cell_text(range, layout.size_designator).unwrap_or_default();

        let missing_flow = |detail: String| ClassificationFailure {
            sheet_name: sheet_name.to_string(),
            customer_id: Some(customer_id.clone()),
            customer_name: Some(clean_customer_name(&customer_name)),
            reason: FailureReason::MissingFlowData { detail },
        };

        let Some((end_row, end_col)) = range.end() else {
            return Err(missing_flow("sheet is empty".to_string()));
        };
        if end_row <= layout.header_row {
            return Err(missing_flow(format!(
                "no data below header row {}",
                layout.header_row + 1
            )));
        }

        let headers: Vec<String> = (0..=end_col)
            .map(|col| cell_text(range, (layout.header_row, col)).unwrap_or_default())
            .collect();

        let mapping = self
            .detectors
            .resolve(manufacturer.as_deref(), &headers)
            .ok_or_else(|| {
                missing_flow(format!(
                    "no flow column in header row {}",
                    layout.header_row + 1
                ))
            })?;

        let series = self
            .parse_samples(sheet_name, range, &mapping, end_row)
            .map_err(missing_flow)?;
        debug!(
            "Sheet {}: customer {} ({}), size {:?}, {} samples",
            sheet_name,
            customer_id,
            customer_name,
            size_designator,
            series.len()
        );

        Ok(MeterSheet {
            sheet_name: sheet_name.to_string(),
            customer_id,
            customer_name,
            manufacturer,
            size_designator,
            series,
        })
    }

    fn parse_samples(
        &self,
        sheet_name: &str,
        range: &Range<Data>,
        mapping: &ColumnMapping,
        end_row: u32,
    ) -> Result<SampleSeries, String> {
        let optional = |row: u32, col: Option<usize>| {
            col.and_then(|c| cell_number(range, (row, c as u32)).ok().flatten())
        };

        let mut samples = Vec::new();
        let mut skipped = 0usize;

        for row in (self.layout.header_row + 1)..=end_row {
            let flow = match cell_number(range, (row, mapping.flow as u32)) {
                Ok(Some(flow)) => flow,
                Ok(None) => continue,
                Err(msg) => {
                    warn!("Sheet {} row {}: {}, skipping", sheet_name, row + 1, msg);
                    skipped += 1;
                    continue;
                }
            };

            samples.push(FlowSample {
                timestamp: mapping
                    .timestamp
                    .and_then(|c| cell_datetime(range, (row, c as u32))),
                flow,
                min_flow: optional(row, mapping.min_flow),
                max_flow: optional(row, mapping.max_flow),
                outlet_pressure: optional(row, mapping.outlet_pressure),
            });
        }

        if skipped > 0 {
            if samples.is_empty() {
                return Err(format!(
                    "no readable flow values ({skipped} unreadable rows)"
                ));
            }
            warn!(
                "Sheet {}: skipped {} rows with unreadable flow values",
                sheet_name, skipped
            );
        }
        Ok(SampleSeries::new(samples))
    }
}

impl Default for WorkbookImporter {
    fn default() -> Self {
        Self::new(SheetLayout::default(), DetectorRegistry::default())
    }
}

/// Cell rendered as trimmed text; integral numbers lose their ".0"
fn cell_text(range: &Range<Data>, pos: (u32, u32)) -> Option<String> {
    match range.get_value(pos)? {
        Data::String(s) | Data::DateTimeIso(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.fract() == 0.0 => Some(format!("{f:.0}")),
        Data::Float(f) => Some(f.to_string()),
        _ => None,
    }
}

/// Numeric cell value: `Ok(None)` for blanks, `Err` for unreadable content
fn cell_number(range: &Range<Data>, pos: (u32, u32)) -> Result<Option<f64>, String> {
    let value = match range.get_value(pos) {
        Some(Data::Float(f)) => *f,
        Some(Data::Int(i)) => *i as f64,
        Some(Data::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "-" {
                return Ok(None);
            }
            parse_decimal(trimmed).ok_or_else(|| format!("cannot parse number: {s}"))?
        }
        Some(Data::Empty) | None => return Ok(None),
        Some(other) => return Err(format!("expected number, got: {other:?}")),
    };

    if value.is_finite() {
        Ok(Some(value))
    } else {
        Err(format!("non-finite number: {value}"))
    }
}

/// Accepts "12.5" and the comma-decimal form "12,5"
fn parse_decimal(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().or_else(|| {
        if text.matches(',').count() == 1 && !text.contains('.') {
            text.replace(',', ".").parse::<f64>().ok()
        } else {
            None
        }
    })
}

const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
];

fn cell_datetime(range: &Range<Data>, pos: (u32, u32)) -> Option<NaiveDateTime> {
    match range.get_value(pos)? {
        Data::DateTime(dt) if (0.0..=MAX_EXCEL_SERIAL).contains(&dt.as_f64()) => {
            dt.as_datetime()
        }
        Data::Float(serial) => excel_serial_to_datetime(*serial),
        Data::Int(serial) => excel_serial_to_datetime(*serial as f64),
        Data::String(s) | Data::DateTimeIso(s) => {
            let s = s.trim();
            TIMESTAMP_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .or_else(|| s.parse::<NaiveDateTime>().ok())
        }
        _ => None,
    }
}

/// Largest serial Excel can display (9999-12-31)
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Convert an Excel serial (days since 1899-12-30, fraction = time of day)
///
/// Values outside Excel's date range (such as epoch milliseconds) yield `None`.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::try_seconds(seconds)?)
}
