//! Flow classification engine.
//!
//! Counts how many metered hours fall into each over-range band and below the
//! rated minimum, turns those counts into percentages of operating hours, and
//! resolves a monthly verdict from eight composite conditions.
//!
//! Every comparison uses the unrounded percentages; rounding to two decimals
//! only happens when the [`VerdictRecord`] is built for reporting.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use utoipa::ToSchema;

use crate::capacity::{CapacityTable, RatedBounds};
use crate::model::{MeterSheet, MeterSpec, SampleSeries};
use crate::utils::{clean_customer_name, parse_nominal_size, round2};

/// Band multipliers applied to Qmax
pub const BAND_150: f64 = 1.5;
pub const BAND_120: f64 = 1.2;
pub const BAND_100: f64 = 1.0;

/// Percentage thresholds (inclusive)
pub const PCT_150_THRESHOLD: f64 = 1.0;
pub const PCT_120_THRESHOLD: f64 = 10.0;
pub const PCT_100_THRESHOLD: f64 = 15.0;
pub const PCT_UNDER_THRESHOLD: f64 = 10.0;

/// Minimum operating hours for the composite conditions
pub const MIN_HOURS_PAIRED: usize = 50;
pub const MIN_HOURS_ALL_BANDS: usize = 30;

/// Why a single meter could not be classified
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("Meter size G{nominal_size} is not in the capacity table")]
    UnknownMeterSize { nominal_size: u32 },

    #[error("No flow samples in the reporting period")]
    EmptySeries,

    #[error("Missing flow data: {detail}")]
    MissingFlowData { detail: String },

    #[error("Cannot parse meter size from {raw:?}")]
    InvalidSizeFormat { raw: String },

    #[error("Sample {index} has missing or invalid rated bounds")]
    InvalidSampleBounds { index: usize },
}

impl FailureReason {
    /// Stable identifier used in exports
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::UnknownMeterSize { .. } => "UnknownMeterSize",
            FailureReason::EmptySeries => "EmptySeries",
            FailureReason::MissingFlowData { .. } => "MissingFlowData",
            FailureReason::InvalidSizeFormat { .. } => "InvalidSizeFormat",
            FailureReason::InvalidSampleBounds { .. } => "InvalidSampleBounds",
        }
    }
}

/// A per-meter failure together with whatever identity the sheet yielded
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, ToSchema)]
#[error("sheet {sheet_name}: {reason}")]
pub struct ClassificationFailure {
    pub sheet_name: String,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub reason: FailureReason,
}

impl ClassificationFailure {
    pub fn for_sheet(sheet: &MeterSheet, reason: FailureReason) -> Self {
        Self {
            sheet_name: sheet.sheet_name.clone(),
            customer_id: Some(sheet.customer_id.clone()),
            customer_name: Some(clean_customer_name(&sheet.customer_name)),
            reason,
        }
    }
}

/// Monthly operating verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Verdict {
    Normal,
    Overrange,
    Underrange,
}

impl Verdict {
    /// First matching rule wins: over-range, then under-range, else normal
    pub fn resolve(conditions: &ConditionSet) -> Self {
        if conditions.c1 || conditions.c4 || conditions.c5 || conditions.c6 || conditions.c7 {
            Verdict::Overrange
        } else if conditions.c8 {
            Verdict::Underrange
        } else {
            Verdict::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Normal => "Normal",
            Verdict::Overrange => "Overrange",
            Verdict::Underrange => "Underrange",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the counting step takes Qmin/Qmax from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum BoundsMode {
    /// Constant bounds from the capacity table
    #[default]
    #[serde(rename = "table")]
    CapacityTable,
    /// Bounds recorded by the instrument on every sample
    PerSample,
}

impl FromStr for BoundsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" | "capacity-table" => Ok(BoundsMode::CapacityTable),
            "per-sample" | "sample" => Ok(BoundsMode::PerSample),
            other => Err(format!(
                "unknown bounds mode '{other}' (expected 'table' or 'per-sample')"
            )),
        }
    }
}

/// Rated bounds applied to each sample during counting
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBounds {
    Constant(RatedBounds),
    PerSample(Vec<RatedBounds>),
}

impl SampleBounds {
    /// Collect and validate the instrument bounds of every sample
    pub fn per_sample(series: &SampleSeries) -> Result<Self, FailureReason> {
        series
            .samples()
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                sample
                    .min_flow
                    .zip(sample.max_flow)
                    .and_then(|(min, max)| RatedBounds::new(min, max))
                    .ok_or(FailureReason::InvalidSampleBounds { index })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(SampleBounds::PerSample)
    }

    pub fn bounds_for(&self, index: usize) -> Option<RatedBounds> {
        match self {
            SampleBounds::Constant(bounds) => Some(*bounds),
            SampleBounds::PerSample(bounds) => bounds.get(index).copied(),
        }
    }
}

/// Operating hours per band; the three over-range bands are disjoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
pub struct ThresholdCounts {
    pub over_150: usize,
    pub over_120: usize,
    pub over_100: usize,
    pub under: usize,
    pub total: usize,
}

impl ThresholdCounts {
    pub fn count(series: &SampleSeries, bounds: &SampleBounds) -> Result<Self, FailureReason> {
        let mut counts = ThresholdCounts {
            total: series.len(),
            ..Default::default()
        };

        for (index, sample) in series.samples().iter().enumerate() {
            let rated = bounds
                .bounds_for(index)
                .ok_or(FailureReason::InvalidSampleBounds { index })?;
            let flow = sample.flow;

            if flow >= BAND_150 * rated.max {
                counts.over_150 += 1;
            } else if flow >= BAND_120 * rated.max {
                counts.over_120 += 1;
            } else if flow >= BAND_100 * rated.max {
                counts.over_100 += 1;
            }

            if flow <= rated.min {
                counts.under += 1;
            }
        }

        Ok(counts)
    }
}

/// Band counts as a share of operating hours, unrounded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Percentages {
    pub pct_150: f64,
    pub pct_120: f64,
    pub pct_100: f64,
    pub pct_under: f64,
}

impl Percentages {
    pub fn from_counts(counts: &ThresholdCounts) -> Result<Self, FailureReason> {
        if counts.total == 0 {
            return Err(FailureReason::EmptySeries);
        }
        let share = |n: usize| n as f64 * 100.0 / counts.total as f64;

        Ok(Self {
            pct_150: share(counts.over_150),
            pct_120: share(counts.over_120),
            pct_100: share(counts.over_100),
            pct_under: share(counts.under),
        })
    }

    pub fn rounded(&self) -> Self {
        Self {
            pct_150: round2(self.pct_150),
            pct_120: round2(self.pct_120),
            pct_100: round2(self.pct_100),
            pct_under: round2(self.pct_under),
        }
    }
}

/// The eight composite conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
pub struct ConditionSet {
    /// pct_150 >= 1
    pub c1: bool,
    /// pct_120 >= 10
    pub c2: bool,
    /// pct_100 >= 15
    pub c3: bool,
    /// hours >= 50 and (C1 or C3)
    pub c4: bool,
    /// hours >= 50 and (C2 or C3)
    pub c5: bool,
    /// hours >= 50 and (C1 or C2)
    pub c6: bool,
    /// hours >= 30 and C1 and C2 and C3
    pub c7: bool,
    /// pct_under >= 10
    pub c8: bool,
}

impl ConditionSet {
    pub fn evaluate(pct: &Percentages, total_hours: usize) -> Self {
        let c1 = pct.pct_150 >= PCT_150_THRESHOLD;
        let c2 = pct.pct_120 >= PCT_120_THRESHOLD;
        let c3 = pct.pct_100 >= PCT_100_THRESHOLD;
        let paired = total_hours >= MIN_HOURS_PAIRED;

        Self {
            c1,
            c2,
            c3,
            c4: paired && (c1 || c3),
            c5: paired && (c2 || c3),
            c6: paired && (c1 || c2),
            c7: total_hours >= MIN_HOURS_ALL_BANDS && c1 && c2 && c3,
            c8: pct.pct_under >= PCT_UNDER_THRESHOLD,
        }
    }
}

/// Result of steps 1-4 for one series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub counts: ThresholdCounts,
    pub percentages: Percentages,
    pub conditions: ConditionSet,
    pub verdict: Verdict,
}

/// Run the counting, percentage, condition and verdict steps on one series
pub fn classify_series(
    series: &SampleSeries,
    bounds: &SampleBounds,
) -> Result<Classification, FailureReason> {
    if series.is_empty() {
        return Err(FailureReason::EmptySeries);
    }

    let counts = ThresholdCounts::count(series, bounds)?;
    let percentages = Percentages::from_counts(&counts)?;
    let conditions = ConditionSet::evaluate(&percentages, counts.total);
    let verdict = Verdict::resolve(&conditions);

    Ok(Classification {
        counts,
        percentages,
        conditions,
        verdict,
    })
}

/// Final output row for one classified meter
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct VerdictRecord {
    pub sheet_name: String,
    pub period: Option<String>,
    pub customer_id: String,
    pub customer_name: String,
    pub nominal_size: u32,
    pub rated_min: f64,
    pub rated_max: f64,
    pub bounds_mode: BoundsMode,
    pub hours_over_150: usize,
    pub hours_over_120: usize,
    pub hours_over_100: usize,
    pub hours_under: usize,
    pub operating_hours: usize,
    /// Rounded to two decimals
    pub pct_over_150: f64,
    pub pct_over_120: f64,
    pub pct_over_100: f64,
    pub pct_under: f64,
    pub conditions: ConditionSet,
    pub verdict: Verdict,
    pub first_sample_at: Option<NaiveDateTime>,
    pub last_sample_at: Option<NaiveDateTime>,
    /// Mean outlet pressure, `None` when the sheet has no pressure column
    pub outlet_pressure: Option<f64>,
    pub previous_verdict: Option<Verdict>,
    pub verdict_two_months_ago: Option<Verdict>,
}

impl VerdictRecord {
    fn build(
        sheet: &MeterSheet,
        spec: &MeterSpec,
        mode: BoundsMode,
        period: Option<&str>,
        result: &Classification,
    ) -> Self {
        let pct = result.percentages.rounded();
        Self {
            sheet_name: sheet.sheet_name.clone(),
            period: period.map(str::to_string),
            customer_id: spec.customer_id.clone(),
            customer_name: spec.customer_name.clone(),
            nominal_size: spec.nominal_size,
            rated_min: spec.rated.min,
            rated_max: spec.rated.max,
            bounds_mode: mode,
            hours_over_150: result.counts.over_150,
            hours_over_120: result.counts.over_120,
            hours_over_100: result.counts.over_100,
            hours_under: result.counts.under,
            operating_hours: result.counts.total,
            pct_over_150: pct.pct_150,
            pct_over_120: pct.pct_120,
            pct_over_100: pct.pct_100,
            pct_under: pct.pct_under,
            conditions: result.conditions,
            verdict: result.verdict,
            first_sample_at: sheet.series.first_timestamp(),
            last_sample_at: sheet.series.last_timestamp(),
            outlet_pressure: sheet.series.mean_outlet_pressure().map(round2),
            previous_verdict: None,
            verdict_two_months_ago: None,
        }
    }

    /// Copy of this record carrying the verdicts of the two prior periods
    pub fn with_history(
        self,
        previous_verdict: Option<Verdict>,
        verdict_two_months_ago: Option<Verdict>,
    ) -> Self {
        Self {
            previous_verdict,
            verdict_two_months_ago,
            ..self
        }
    }
}

/// Classifies meter sheets against a shared capacity table
#[derive(Debug, Clone, Copy)]
pub struct FlowClassifier<'a> {
    table: &'a CapacityTable,
    mode: BoundsMode,
}

impl<'a> FlowClassifier<'a> {
    pub fn new(table: &'a CapacityTable, mode: BoundsMode) -> Self {
        Self { table, mode }
    }

    pub fn mode(&self) -> BoundsMode {
        self.mode
    }

    /// Resolve the sheet's size designator and rated bounds
    pub fn resolve_spec(&self, sheet: &MeterSheet) -> Result<MeterSpec, FailureReason> {
        let nominal_size = parse_nominal_size(&sheet.size_designator)?;
        let rated = self
            .table
            .lookup(nominal_size)
            .ok_or(FailureReason::UnknownMeterSize { nominal_size })?;

        Ok(MeterSpec {
            customer_id: sheet.customer_id.clone(),
            customer_name: clean_customer_name(&sheet.customer_name),
            nominal_size,
            rated,
        })
    }

    pub fn classify(
        &self,
        sheet: &MeterSheet,
        period: Option<&str>,
    ) -> Result<VerdictRecord, ClassificationFailure> {
        let fail = |reason| ClassificationFailure::for_sheet(sheet, reason);

        let spec = self.resolve_spec(sheet).map_err(fail)?;
        if sheet.series.is_empty() {
            return Err(fail(FailureReason::EmptySeries));
        }

        let bounds = match self.mode {
            BoundsMode::CapacityTable => SampleBounds::Constant(spec.rated),
            BoundsMode::PerSample => SampleBounds::per_sample(&sheet.series).map_err(fail)?,
        };

        let result = classify_series(&sheet.series, &bounds).map_err(fail)?;
        debug!(
            "Sheet {} (G{}): {} hours, 150%={} 120%={} 100%={} under={} -> {}",
            sheet.sheet_name,
            spec.nominal_size,
            result.counts.total,
            result.counts.over_150,
            result.counts.over_120,
            result.counts.over_100,
            result.counts.under,
            result.verdict
        );

        Ok(VerdictRecord::build(sheet, &spec, self.mode, period, &result))
    }
}
