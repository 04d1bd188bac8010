// Tests for WorkbookImporter sheet parsing
// Sheets are built in memory with calamine ranges in the portal export layout

mod common;

use calamine::{Data, Range};
use chrono::{Datelike, Timelike};
use common::{portal_sheet, Row};
use gas_meter_analyzer::classifier::{BoundsMode, FailureReason, Verdict};
use gas_meter_analyzer::importers::{ImportError, SheetLayout, WorkbookImporter};
use gas_meter_analyzer::services::AnalysisService;

fn hourly_rows(flows: &[f64]) -> Vec<Row> {
    const STAMPS: [&str; 4] = [
        "2024-03-01 00:00:00",
        "2024-03-01 01:00:00",
        "2024-03-01 02:00:00",
        "2024-03-01 03:00:00",
    ];
    flows
        .iter()
        .enumerate()
        .map(|(i, &flow)| Row::flow(STAMPS[i % STAMPS.len()], flow))
        .collect()
}

#[test]
fn test_parse_header_block() {
    let range = portal_sheet(
        Data::Float(310045.0),
        "Place Id: PT Sumber Gas",
        Data::String("G25".to_string()),
        &hourly_rows(&[10.0, 12.0]),
    );

    let sheet = WorkbookImporter::default()
        .parse_sheet("Sheet1", &range)
        .unwrap();

    assert_eq!(sheet.sheet_name, "Sheet1");
    assert_eq!(sheet.customer_id, "310045");
    assert_eq!(sheet.customer_name, "Place Id: PT Sumber Gas");
    assert_eq!(sheet.manufacturer.as_deref(), Some("Portal Export"));
    assert_eq!(sheet.size_designator, "G25");
    assert_eq!(sheet.series.len(), 2);
}

#[test]
fn test_numeric_size_cell() {
    let range = portal_sheet(
        Data::String("A-1".to_string()),
        "Toko",
        Data::Float(16.0),
        &hourly_rows(&[1.0]),
    );
    let sheet = WorkbookImporter::default()
        .parse_sheet("Sheet1", &range)
        .unwrap();
    assert_eq!(sheet.size_designator, "16");
}

#[test]
fn test_samples_carry_timestamps_bounds_and_pressure() {
    let rows = vec![
        Row {
            timestamp: "2024-03-01 05:00:00",
            flow: Data::Float(12.5),
            max_flow: Some(40.0),
            min_flow: Some(0.8),
            pressure: Some(2.1),
        },
        Row {
            timestamp: "2024-03-01 06:00:00",
            flow: Data::String("13,5".to_string()),
            max_flow: Some(40.0),
            min_flow: Some(0.8),
            pressure: Some(2.3),
        },
    ];
    let range = portal_sheet(Data::Int(7), "Hotel", Data::String("G25".into()), &rows);

    let sheet = WorkbookImporter::default()
        .parse_sheet("Sheet1", &range)
        .unwrap();
    let samples = sheet.series.samples();

    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].flow, 12.5);
    assert_eq!(samples[1].flow, 13.5);
    assert_eq!(samples[0].max_flow, Some(40.0));
    assert_eq!(samples[0].min_flow, Some(0.8));
    let first = sheet.series.first_timestamp().unwrap();
    assert_eq!((first.day(), first.hour()), (1, 5));
    let mean = sheet.series.mean_outlet_pressure().unwrap();
    assert!((mean - 2.2).abs() < 1e-9);
}

#[test]
fn test_blank_and_unreadable_flow_cells_are_not_samples() {
    let rows = vec![
        Row::flow("2024-03-01 00:00:00", 10.0),
        Row {
            flow: Data::Empty,
            ..Row::flow("2024-03-01 01:00:00", 0.0)
        },
        Row {
            flow: Data::String("ERR".to_string()),
            ..Row::flow("2024-03-01 02:00:00", 0.0)
        },
        Row::flow("2024-03-01 03:00:00", 11.0),
    ];
    let range = portal_sheet(Data::Int(8), "Cafe", Data::String("G16".into()), &rows);

    let sheet = WorkbookImporter::default()
        .parse_sheet("Sheet1", &range)
        .unwrap();
    assert_eq!(sheet.series.len(), 2);
}

#[test]
fn test_unreadable_flow_column_is_missing_flow_data() {
    let rows: Vec<Row> = (0..5)
        .map(|_| Row {
            flow: Data::String("ERR".to_string()),
            ..Row::flow("2024-03-01 00:00:00", 0.0)
        })
        .collect();
    let range = portal_sheet(Data::Int(11), "Place Id: Laundry", Data::String("G16".into()), &rows);

    let sheets = vec![WorkbookImporter::default().parse_sheet("Sheet1", &range)];
    let report = AnalysisService::default().analyze(None, BoundsMode::CapacityTable, sheets);

    assert_eq!(report.classified, 0);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.customer_id.as_deref(), Some("11"));
    assert_eq!(failure.customer_name.as_deref(), Some("Laundry"));
    match &failure.reason {
        FailureReason::MissingFlowData { detail } => {
            assert!(detail.contains("no readable flow values"));
        }
        other => panic!("Expected MissingFlowData, got {other:?}"),
    }
}

#[test]
fn test_out_of_range_timestamp_is_unavailable() {
    let mut range = portal_sheet(
        Data::Int(12),
        "Warung",
        Data::String("G16".into()),
        &hourly_rows(&[10.0, 12.0]),
    );
    // Epoch milliseconds instead of an Excel serial
    range.set_value((13, 0), Data::Float(1_709_251_200_000.0));

    let sheet = WorkbookImporter::default()
        .parse_sheet("Sheet1", &range)
        .unwrap();
    let samples = sheet.series.samples();

    assert_eq!(samples.len(), 2);
    assert!(samples[0].timestamp.is_none());
    assert_eq!(samples[0].flow, 10.0);
    assert!(samples[1].timestamp.is_some());
}

#[test]
fn test_missing_flow_column() {
    let mut range = portal_sheet(
        Data::Int(9),
        "Bakery",
        Data::String("G16".into()),
        &hourly_rows(&[1.0]),
    );
    range.set_value((12, 1), Data::String("Volume (m3)".to_string()));

    let failure = WorkbookImporter::default()
        .parse_sheet("Sheet9", &range)
        .unwrap_err();

    assert_eq!(failure.sheet_name, "Sheet9");
    assert_eq!(failure.customer_id.as_deref(), Some("9"));
    assert!(matches!(
        failure.reason,
        FailureReason::MissingFlowData { .. }
    ));
}

#[test]
fn test_sheet_without_data_rows() {
    let range: Range<Data> = Range::new((0, 0), (10, 2));
    let failure = WorkbookImporter::default()
        .parse_sheet("Cover", &range)
        .unwrap_err();
    assert!(matches!(
        failure.reason,
        FailureReason::MissingFlowData { .. }
    ));
}

#[test]
fn test_custom_layout() {
    let layout = SheetLayout {
        header_row: 13,
        ..SheetLayout::default()
    };
    let mut range = portal_sheet(
        Data::Int(10),
        "Shifted",
        Data::String("G16".into()),
        &hourly_rows(&[1.0, 2.0, 3.0]),
    );
    // Move the header row down one line, first data row becomes the header
    range.set_value((13, 1), Data::String("Flow (m3/h)".to_string()));

    let importer = WorkbookImporter::new(layout, Default::default());
    let sheet = importer.parse_sheet("Sheet1", &range).unwrap();
    assert_eq!(sheet.series.len(), 2);
}

#[test]
fn test_workbook_not_found() {
    let result = WorkbookImporter::default().import_path("/nonexistent/path/to/file.xlsx");
    assert!(matches!(result, Err(ImportError::WorkbookOpen(_))));
}

#[test]
fn test_unreadable_bytes() {
    let result = WorkbookImporter::default().import_bytes(b"not a workbook".to_vec());
    assert!(matches!(result, Err(ImportError::WorkbookOpen(_))));
}

#[test]
fn test_imported_sheets_through_analysis() {
    let importer = WorkbookImporter::default();

    let mut over = vec![20.0; 97];
    over.extend([40.0, 40.0, 40.0]);
    let overrange = portal_sheet(
        Data::Int(1),
        "Place Id: Over",
        Data::String("G16".into()),
        &hourly_rows(&over),
    );
    let unknown = portal_sheet(
        Data::Int(2),
        "Place Id: Unknown",
        Data::String("G33".into()),
        &hourly_rows(&[1.0, 2.0]),
    );
    let normal = portal_sheet(
        Data::Int(3),
        "Place Id: Normal",
        Data::String("G16".into()),
        &hourly_rows(&[10.0, 12.0, 14.0]),
    );

    let sheets = vec![
        importer.parse_sheet("A", &overrange),
        importer.parse_sheet("B", &unknown),
        importer.parse_sheet("C", &normal),
    ];
    let report = AnalysisService::default().analyze(Some("2024-03"), BoundsMode::CapacityTable, sheets);

    assert_eq!(report.classified, 2);
    assert_eq!(report.failed, 1);

    let records: Vec<_> = report.records().collect();
    assert_eq!(records[0].0, 1);
    assert_eq!(records[0].1.customer_name, "Over");
    assert_eq!(records[0].1.verdict, Verdict::Overrange);
    assert_eq!(records[1].0, 2);
    assert_eq!(records[1].1.sheet_name, "C");
    assert_eq!(records[1].1.verdict, Verdict::Normal);

    let failure = report.failures().next().unwrap();
    assert_eq!(failure.sheet_name, "B");
    assert_eq!(
        failure.reason,
        FailureReason::UnknownMeterSize { nominal_size: 33 }
    );
}

const SAMPLE_WORKBOOK: &str = "sample-data-files/meter_recap_2024-03.xlsx";

#[test]
fn test_import_sample_workbook() {
    let results = WorkbookImporter::default()
        .import_path(SAMPLE_WORKBOOK)
        .unwrap();

    assert_eq!(results.len(), 3);
    let names: Vec<&str> = results
        .iter()
        .map(|r| match r {
            Ok(sheet) => sheet.sheet_name.as_str(),
            Err(failure) => failure.sheet_name.as_str(),
        })
        .collect();
    assert_eq!(names, ["Over", "Unknown", "Normal"]);

    let over = results[0].as_ref().unwrap();
    assert_eq!(over.customer_id, "1001");
    assert_eq!(over.customer_name, "Place Id: Hotel Over");
    assert_eq!(over.size_designator, "G16");
    assert_eq!(over.series.len(), 100);

    let first = over.series.first_timestamp().unwrap();
    assert_eq!((first.year(), first.month(), first.day(), first.hour()), (2024, 3, 1, 0));
    let last = over.series.last_timestamp().unwrap();
    assert_eq!((last.day(), last.hour()), (5, 3));
    assert_eq!(over.series.mean_outlet_pressure(), Some(2.0));
}

#[test]
fn test_analyze_sample_workbook_from_path() {
    let report = AnalysisService::default()
        .analyze_path(SAMPLE_WORKBOOK, Some("2024-03"), BoundsMode::CapacityTable)
        .unwrap();

    assert_eq!(report.period.as_deref(), Some("2024-03"));
    assert_eq!(report.classified, 2);
    assert_eq!(report.failed, 1);

    let records: Vec<_> = report.records().collect();
    assert_eq!(records[0].0, 1);
    assert_eq!(records[0].1.sheet_name, "Over");
    assert_eq!(records[0].1.customer_name, "Hotel Over");
    assert_eq!(records[0].1.hours_over_150, 3);
    assert_eq!(records[0].1.verdict, Verdict::Overrange);
    assert_eq!(records[1].0, 2);
    assert_eq!(records[1].1.sheet_name, "Normal");
    assert_eq!(records[1].1.verdict, Verdict::Normal);

    let failure = report.failures().next().unwrap();
    assert_eq!(failure.sheet_name, "Unknown");
    assert_eq!(failure.customer_name.as_deref(), Some("Pabrik Unknown"));
    assert_eq!(
        failure.reason,
        FailureReason::UnknownMeterSize { nominal_size: 33 }
    );
}

#[test]
fn test_import_sample_workbook_from_bytes() {
    let bytes = std::fs::read(SAMPLE_WORKBOOK).unwrap();
    let from_bytes = AnalysisService::default()
        .analyze_bytes(bytes, Some("2024-03"), BoundsMode::CapacityTable)
        .unwrap();
    let from_path = AnalysisService::default()
        .analyze_path(SAMPLE_WORKBOOK, Some("2024-03"), BoundsMode::CapacityTable)
        .unwrap();

    assert_eq!(from_bytes, from_path);
}
