// Shared fixtures for integration tests
#![allow(dead_code)]

use calamine::{Data, Range};
use gas_meter_analyzer::model::{MeterSheet, SampleSeries};

/// Meter sheet with bare flow samples
pub fn meter_sheet(sheet_name: &str, customer_id: &str, size: &str, flows: &[f64]) -> MeterSheet {
    MeterSheet {
        sheet_name: sheet_name.to_string(),
        customer_id: customer_id.to_string(),
        customer_name: format!("Place Id: Customer {customer_id}"),
        manufacturer: None,
        size_designator: size.to_string(),
        series: SampleSeries::from_flows(flows.iter().copied()),
    }
}

/// `n` copies of `flow`
pub fn repeat(flow: f64, n: usize) -> Vec<f64> {
    vec![flow; n]
}

/// One data row of a synthetic sheet: flow, optional max/min bounds, optional pressure
pub struct Row {
    pub timestamp: &'static str,
    pub flow: Data,
    pub max_flow: Option<f64>,
    pub min_flow: Option<f64>,
    pub pressure: Option<f64>,
}

impl Row {
    pub fn flow(timestamp: &'static str, flow: f64) -> Self {
        Self {
            timestamp,
            flow: Data::Float(flow),
            max_flow: None,
            min_flow: None,
            pressure: None,
        }
    }
}

/// Build a worksheet in the portal export layout
///
/// Header block in rows 5-10, column headers on row 13, data from row 14.
pub fn portal_sheet(customer_id: Data, customer_name: &str, size: Data, rows: &[Row]) -> Range<Data> {
    let last_row = 12 + rows.len().max(1) as u32;
    let mut range = Range::new((0, 0), (last_row, 4));

    range.set_value((4, 0), Data::String("ID Ref".to_string()));
    range.set_value((4, 1), customer_id);
    range.set_value((5, 0), Data::String(customer_name.to_string()));
    range.set_value((8, 0), Data::String("Manufacturer".to_string()));
    range.set_value((8, 1), Data::String("Portal Export".to_string()));
    range.set_value((9, 0), Data::String("GSize".to_string()));
    range.set_value((9, 1), size);

    for (col, header) in [
        "Date/Time",
        "Flow (m3/h)",
        "Max. Flow (m3/h)",
        "Min. Flow (m3/h)",
        "Pressure (bar)",
    ]
    .iter()
    .enumerate()
    {
        range.set_value((12, col as u32), Data::String(header.to_string()));
    }

    for (i, row) in rows.iter().enumerate() {
        let r = 13 + i as u32;
        range.set_value((r, 0), Data::String(row.timestamp.to_string()));
        range.set_value((r, 1), row.flow.clone());
        if let Some(max) = row.max_flow {
            range.set_value((r, 2), Data::Float(max));
        }
        if let Some(min) = row.min_flow {
            range.set_value((r, 3), Data::Float(min));
        }
        if let Some(p) = row.pressure {
            range.set_value((r, 4), Data::Float(p));
        }
    }

    range
}
