//! Column detection for meter data tables.
//!
//! Different instrument exports label the same quantities differently. A
//! [`ColumnDetector`] looks at the header row (and optionally the free-text
//! manufacturer field) and resolves a [`ColumnMapping`] once per sheet.

use tracing::debug;

/// Column indices of the data table, resolved once per sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMapping {
    pub flow: usize,
    pub max_flow: Option<usize>,
    pub min_flow: Option<usize>,
    pub outlet_pressure: Option<usize>,
    pub timestamp: Option<usize>,
}

pub trait ColumnDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this detector is specific to the given manufacturer text
    fn matches_manufacturer(&self, manufacturer: &str) -> bool;

    fn detect(&self, headers: &[String]) -> Option<ColumnMapping>;
}

/// Detector driven by lists of accepted header labels
#[derive(Debug, Clone)]
pub struct HeaderAliasDetector {
    name: &'static str,
    manufacturer_hints: &'static [&'static str],
    flow: &'static [&'static str],
    max_flow: &'static [&'static str],
    min_flow: &'static [&'static str],
    outlet_pressure: &'static [&'static str],
    timestamp: &'static [&'static str],
}

impl HeaderAliasDetector {
    /// Portal export layout ("Flow (m3/h)", "Max. Flow (m3/h)", ...)
    pub fn standard() -> Self {
        Self {
            name: "standard",
            manufacturer_hints: &[],
            flow: &["flow (m3/h)", "flow"],
            max_flow: &["max. flow (m3/h)", "max flow (m3/h)", "max. flow"],
            min_flow: &["min. flow (m3/h)", "min flow (m3/h)", "min. flow"],
            outlet_pressure: &["pressure (bar)", "outlet pressure (bar)", "pressure"],
            timestamp: &["date/time", "datetime", "timestamp", "date"],
        }
    }

    /// Volume correctors reporting flow at base conditions ("Qb (m3/h)")
    pub fn base_conditions() -> Self {
        Self {
            name: "base-conditions",
            manufacturer_hints: &["evc", "corrector"],
            flow: &["qb (m3/h)", "qb"],
            max_flow: &["qb max (m3/h)", "qbmax (m3/h)", "qb max"],
            min_flow: &["qb min (m3/h)", "qbmin (m3/h)", "qb min"],
            outlet_pressure: &["pout (bar)", "p out (bar)", "pout"],
            timestamp: &["timestamp", "date/time", "date"],
        }
    }

    fn position(headers: &[String], aliases: &[&str]) -> Option<usize> {
        headers.iter().position(|header| {
            let header = header.trim().to_lowercase();
            aliases.iter().any(|alias| header == *alias)
        })
    }
}

impl ColumnDetector for HeaderAliasDetector {
    fn name(&self) -> &str {
        self.name
    }

    fn matches_manufacturer(&self, manufacturer: &str) -> bool {
        let manufacturer = manufacturer.to_lowercase();
        self.manufacturer_hints
            .iter()
            .any(|hint| manufacturer.contains(hint))
    }

    fn detect(&self, headers: &[String]) -> Option<ColumnMapping> {
        let flow = Self::position(headers, self.flow)?;
        Some(ColumnMapping {
            flow,
            max_flow: Self::position(headers, self.max_flow),
            min_flow: Self::position(headers, self.min_flow),
            outlet_pressure: Self::position(headers, self.outlet_pressure),
            timestamp: Self::position(headers, self.timestamp),
        })
    }
}

/// Ordered set of detectors consulted for every sheet
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn ColumnDetector>>,
}

impl DetectorRegistry {
    pub fn new(detectors: Vec<Box<dyn ColumnDetector>>) -> Self {
        Self { detectors }
    }

    /// Resolve the mapping for one sheet
    ///
    /// Detectors whose manufacturer hint matches are tried first, then every
    /// detector in registration order.
    pub fn resolve(&self, manufacturer: Option<&str>, headers: &[String]) -> Option<ColumnMapping> {
        let preferred = self
            .detectors
            .iter()
            .filter(|d| manufacturer.is_some_and(|m| d.matches_manufacturer(m)));

        for detector in preferred.chain(self.detectors.iter()) {
            if let Some(mapping) = detector.detect(headers) {
                debug!("Columns resolved by '{}' detector: {:?}", detector.name(), mapping);
                return Some(mapping);
            }
        }
        None
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new(vec![
            Box::new(HeaderAliasDetector::standard()),
            Box::new(HeaderAliasDetector::base_conditions()),
        ])
    }
}
