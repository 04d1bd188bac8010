//! Carries verdicts of earlier reporting periods into the current recap.

use std::collections::HashMap;
use tracing::debug;

use crate::classifier::Verdict;
use crate::services::analysis_service::{BatchEntry, BatchReport};

fn verdicts_by_customer(report: Option<&BatchReport>) -> HashMap<&str, Verdict> {
    report
        .map(|r| {
            r.records()
                .filter(|(_, record)| !record.customer_id.is_empty())
                .map(|(_, record)| (record.customer_id.as_str(), record.verdict))
                .collect()
        })
        .unwrap_or_default()
}

/// Attach last month's and the month before's verdict to every classified meter
///
/// Meters are matched on customer id. Records are rebuilt, entries keep their
/// order and numbering.
pub fn apply_history(
    current: BatchReport,
    previous: Option<&BatchReport>,
    before_previous: Option<&BatchReport>,
) -> BatchReport {
    let last_month = verdicts_by_customer(previous);
    let two_months_ago = verdicts_by_customer(before_previous);
    debug!(
        "Applying history: {} meters last period, {} meters the period before",
        last_month.len(),
        two_months_ago.len()
    );

    let entries = current
        .entries
        .into_iter()
        .map(|entry| match entry {
            BatchEntry::Classified { no, record } => {
                let id = record.customer_id.as_str();
                let prev = last_month.get(id).copied();
                let prev2 = two_months_ago.get(id).copied();
                BatchEntry::Classified {
                    no,
                    record: record.with_history(prev, prev2),
                }
            }
            failed => failed,
        })
        .collect();

    BatchReport { entries, ..current }
}
