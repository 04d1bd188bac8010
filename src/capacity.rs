//! Rated flow capacity per nominal meter size.
//!
//! The table is process-wide configuration: built once, shared by reference
//! with the classifier and the API, never mutated after construction.

use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Rated minimum/maximum flow (m3/h) of a meter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct RatedBounds {
    pub min: f64,
    pub max: f64,
}

impl RatedBounds {
    /// Build bounds, rejecting non-positive or inverted ranges.
    pub fn new(min: f64, max: f64) -> Option<Self> {
        if min > 0.0 && max > 0.0 && min < max && min.is_finite() && max.is_finite() {
            Some(Self { min, max })
        } else {
            None
        }
    }
}

/// G-size rating plate values: size -> (Qmin, Qmax)
const STANDARD_CAPACITIES: [(u32, f64, f64); 12] = [
    (16, 0.5, 25.0),
    (25, 0.8, 40.0),
    (40, 8.0, 65.0),
    (65, 10.0, 100.0),
    (100, 16.0, 160.0),
    (160, 13.0, 250.0),
    (250, 20.0, 400.0),
    (400, 32.0, 650.0),
    (650, 50.0, 1000.0),
    (1000, 80.0, 1600.0),
    (1600, 125.0, 2500.0),
    (2500, 200.0, 4000.0),
];

/// One row of the capacity table, as exposed by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CapacityEntry {
    pub nominal_size: u32,
    pub rated_min: f64,
    pub rated_max: f64,
}

#[derive(Debug, Clone)]
pub struct CapacityTable {
    entries: BTreeMap<u32, RatedBounds>,
}

impl CapacityTable {
    /// The fixed G-size table used for every run
    pub fn standard() -> Self {
        let entries = STANDARD_CAPACITIES
            .iter()
            .map(|&(size, min, max)| (size, RatedBounds { min, max }))
            .collect();
        Self { entries }
    }

    /// Rated bounds for a nominal size, `None` when the size is not rated.
    pub fn lookup(&self, nominal_size: u32) -> Option<RatedBounds> {
        self.entries.get(&nominal_size).copied()
    }

    pub fn entries(&self) -> Vec<CapacityEntry> {
        self.entries
            .iter()
            .map(|(size, bounds)| CapacityEntry {
                nominal_size: *size,
                rated_min: bounds.min,
                rated_max: bounds.max,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CapacityTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_sizes() {
        let table = CapacityTable::standard();
        assert_eq!(table.lookup(16), Some(RatedBounds { min: 0.5, max: 25.0 }));
        assert_eq!(table.lookup(65), Some(RatedBounds { min: 10.0, max: 100.0 }));
        assert_eq!(
            table.lookup(2500),
            Some(RatedBounds {
                min: 200.0,
                max: 4000.0
            })
        );
    }

    #[test]
    fn test_lookup_unknown_size() {
        let table = CapacityTable::standard();
        assert_eq!(table.lookup(33), None);
        assert_eq!(table.lookup(0), None);
    }

    #[test]
    fn test_every_entry_is_a_valid_range() {
        let table = CapacityTable::standard();
        assert_eq!(table.len(), 12);
        for entry in table.entries() {
            assert!(
                RatedBounds::new(entry.rated_min, entry.rated_max).is_some(),
                "G{} has an invalid range",
                entry.nominal_size
            );
        }
    }

    #[test]
    fn test_entries_sorted_by_size() {
        let sizes: Vec<u32> = CapacityTable::standard()
            .entries()
            .iter()
            .map(|e| e.nominal_size)
            .collect();
        let mut sorted = sizes.clone();
        sorted.sort();
        assert_eq!(sizes, sorted);
    }

    #[test]
    fn test_rated_bounds_rejects_inverted_range() {
        assert!(RatedBounds::new(10.0, 5.0).is_none());
        assert!(RatedBounds::new(0.0, 5.0).is_none());
        assert!(RatedBounds::new(5.0, 5.0).is_none());
        assert!(RatedBounds::new(f64::NAN, 5.0).is_none());
    }
}
