use chrono::NaiveDateTime;
use serde::Serialize;

use crate::capacity::RatedBounds;

/// One metered hour read from a customer sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowSample {
    pub timestamp: Option<NaiveDateTime>,
    pub flow: f64,
    /// Instrument-supplied rated bounds for this hour, when the sheet has them
    pub min_flow: Option<f64>,
    pub max_flow: Option<f64>,
    pub outlet_pressure: Option<f64>,
}

impl FlowSample {
    pub fn new(flow: f64) -> Self {
        Self {
            timestamp: None,
            flow,
            min_flow: None,
            max_flow: None,
            outlet_pressure: None,
        }
    }

    pub fn with_bounds(flow: f64, min_flow: f64, max_flow: f64) -> Self {
        Self {
            min_flow: Some(min_flow),
            max_flow: Some(max_flow),
            ..Self::new(flow)
        }
    }
}

/// A meter's samples for one reporting period, in sheet order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleSeries {
    samples: Vec<FlowSample>,
}

impl SampleSeries {
    pub fn new(samples: Vec<FlowSample>) -> Self {
        Self { samples }
    }

    /// Series of bare flow values with no timestamps or per-sample bounds
    pub fn from_flows(flows: impl IntoIterator<Item = f64>) -> Self {
        Self::new(flows.into_iter().map(FlowSample::new).collect())
    }

    pub fn samples(&self) -> &[FlowSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.samples.iter().filter_map(|s| s.timestamp).min()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.samples.iter().filter_map(|s| s.timestamp).max()
    }

    /// Mean outlet pressure over the samples that carry one.
    ///
    /// `None` when no sample has a pressure reading.
    pub fn mean_outlet_pressure(&self) -> Option<f64> {
        let (sum, count) = self
            .samples
            .iter()
            .filter_map(|s| s.outlet_pressure)
            .fold((0.0, 0usize), |(sum, count), p| (sum + p, count + 1));

        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }
}

/// Everything the data source extracted from one worksheet
#[derive(Debug, Clone, PartialEq)]
pub struct MeterSheet {
    pub sheet_name: String,
    pub customer_id: String,
    pub customer_name: String,
    /// Free-text manufacturer field, used only for column detection
    pub manufacturer: Option<String>,
    /// Raw size designator as written on the sheet (e.g. "G16")
    pub size_designator: String,
    pub series: SampleSeries,
}

/// A meter installation with its size resolved against the capacity table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterSpec {
    pub customer_id: String,
    pub customer_name: String,
    pub nominal_size: u32,
    pub rated: RatedBounds,
}
