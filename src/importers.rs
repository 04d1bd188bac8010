// ! Data-source side: reading meter sheets out of customer workbooks

pub mod column_mapping;
pub mod workbook_importer;

// Re-export commonly used items
pub use column_mapping::{ColumnDetector, ColumnMapping, DetectorRegistry, HeaderAliasDetector};
pub use workbook_importer::{ImportError, SheetLayout, SheetResult, WorkbookImporter};
