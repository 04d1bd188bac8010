//! Shared parsing helpers for values read from customer sheets
use regex::Regex;
use std::sync::OnceLock;

use crate::classifier::FailureReason;

fn size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^g?\s*(\d+)$").expect("valid size pattern"))
}

fn place_id_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^\s*place\s+id\s*:").expect("valid prefix pattern"))
}

/// Parse a nominal meter size from its "G<number>" designator
///
/// The `G` prefix is optional and case-insensitive; surrounding whitespace is
/// ignored. The size must be a positive integer.
///
/// # Examples
///
/// ```
/// use gas_meter_analyzer::utils::parse_nominal_size;
///
/// assert_eq!(parse_nominal_size("G16").unwrap(), 16);
/// assert_eq!(parse_nominal_size("g 250").unwrap(), 250);
/// assert_eq!(parse_nominal_size("65").unwrap(), 65);
/// assert!(parse_nominal_size("G-16").is_err());
/// ```
pub fn parse_nominal_size(raw: &str) -> Result<u32, FailureReason> {
    let invalid = || FailureReason::InvalidSizeFormat {
        raw: raw.to_string(),
    };

    let captures = size_pattern().captures(raw.trim()).ok_or_else(invalid)?;
    let size = captures[1].parse::<u32>().map_err(|_| invalid())?;

    if size == 0 {
        return Err(invalid());
    }
    Ok(size)
}

/// Strip the "Place Id:" label the portal export puts in front of customer names
///
/// ```
/// use gas_meter_analyzer::utils::clean_customer_name;
///
/// assert_eq!(clean_customer_name("Place Id: PT Sumber Makmur "), "PT Sumber Makmur");
/// assert_eq!(clean_customer_name("Hotel Melati"), "Hotel Melati");
/// ```
pub fn clean_customer_name(raw: &str) -> String {
    place_id_prefix().replace(raw, "").trim().to_string()
}

/// Round half away from zero to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
