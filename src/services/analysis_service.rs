use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::capacity::CapacityTable;
use crate::classifier::{BoundsMode, ClassificationFailure, FlowClassifier, VerdictRecord};
use crate::importers::{ImportError, SheetResult, WorkbookImporter};

/// One sheet's outcome, in workbook order
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchEntry {
    Classified {
        /// 1-based number among the classified meters
        no: usize,
        record: VerdictRecord,
    },
    Failed {
        failure: ClassificationFailure,
    },
}

/// Result of classifying every meter of one reporting period
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BatchReport {
    pub period: Option<String>,
    pub bounds_mode: BoundsMode,
    pub classified: usize,
    pub failed: usize,
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn records(&self) -> impl Iterator<Item = (usize, &VerdictRecord)> {
        self.entries.iter().filter_map(|entry| match entry {
            BatchEntry::Classified { no, record } => Some((*no, record)),
            BatchEntry::Failed { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &ClassificationFailure> {
        self.entries.iter().filter_map(|entry| match entry {
            BatchEntry::Failed { failure } => Some(failure),
            BatchEntry::Classified { .. } => None,
        })
    }
}

/// Runs the classifier over every sheet a data source produced
#[derive(Clone)]
pub struct AnalysisService {
    table: Arc<CapacityTable>,
    importer: Arc<WorkbookImporter>,
}

impl AnalysisService {
    pub fn new(table: Arc<CapacityTable>, importer: Arc<WorkbookImporter>) -> Self {
        Self { table, importer }
    }

    pub fn capacity_table(&self) -> &CapacityTable {
        &self.table
    }

    /// Classify a batch of sheets
    ///
    /// Sheets are processed sequentially and never abort the batch: every
    /// failure is kept in place next to the classified meters, and classified
    /// meters are numbered 1..K in the order encountered.
    #[instrument(skip(self, sheets), fields(sheets = sheets.len()))]
    pub fn analyze(
        &self,
        period: Option<&str>,
        mode: BoundsMode,
        sheets: Vec<SheetResult>,
    ) -> BatchReport {
        let classifier = FlowClassifier::new(&self.table, mode);
        let mut entries = Vec::with_capacity(sheets.len());
        let mut classified = 0;

        for sheet in sheets {
            let outcome = sheet.and_then(|sheet| classifier.classify(&sheet, period));
            match outcome {
                Ok(record) => {
                    classified += 1;
                    entries.push(BatchEntry::Classified {
                        no: classified,
                        record,
                    });
                }
                Err(failure) => {
                    warn!(
                        "Failed to classify sheet {}: {}",
                        failure.sheet_name, failure.reason
                    );
                    entries.push(BatchEntry::Failed { failure });
                }
            }
        }

        let failed = entries.len() - classified;
        info!(
            "Analysis complete for period {:?}: {} classified, {} failed",
            period, classified, failed
        );

        BatchReport {
            period: period.map(str::to_string),
            bounds_mode: mode,
            classified,
            failed,
            entries,
        }
    }

    /// Import a workbook from disk and classify its sheets
    pub fn analyze_path(
        &self,
        path: impl AsRef<Path>,
        period: Option<&str>,
        mode: BoundsMode,
    ) -> Result<BatchReport, ImportError> {
        let sheets = self.importer.import_path(path)?;
        Ok(self.analyze(period, mode, sheets))
    }

    /// Import an uploaded workbook and classify its sheets
    pub fn analyze_bytes(
        &self,
        bytes: Vec<u8>,
        period: Option<&str>,
        mode: BoundsMode,
    ) -> Result<BatchReport, ImportError> {
        let sheets = self.importer.import_bytes(bytes)?;
        Ok(self.analyze(period, mode, sheets))
    }
}

impl Default for AnalysisService {
    fn default() -> Self {
        Self::new(
            Arc::new(CapacityTable::standard()),
            Arc::new(WorkbookImporter::default()),
        )
    }
}
