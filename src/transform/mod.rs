//! Pure reshaping of raw vendor records into typed [`Table`](crate::table::Table)s.
//! Everything here is deterministic: the extraction instant is an input, and
//! malformed or missing fields fall back to declared defaults instead of
//! failing the run.

pub mod analytics;
pub mod mailchimp;

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime};
use once_cell::sync::Lazy;
use serde_json::Value as JsonValue;

/// Country code -> display name for the member geography column. Codes not
/// listed fall back to the code itself.
static COUNTRY_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("UA", "Ukraine"),
        ("RU", "Russia"),
        ("US", "United States"),
        ("GB", "United Kingdom"),
        ("DE", "Germany"),
        ("FR", "France"),
    ])
});

/// Vendor country spellings normalized for reporting.
static COUNTRY_REPLACEMENTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([("Russian Federation", "Russia"), ("United States", "USA")])
});

pub(crate) fn country_display_name(code: &str) -> String {
    COUNTRY_NAMES
        .get(code)
        .map(|n| n.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Trim, title-case and normalize an analytics country dimension value.
pub(crate) fn clean_country(raw: &str) -> String {
    let titled = title_case(raw.trim());
    match COUNTRY_REPLACEMENTS.get(titled.as_str()) {
        Some(replacement) => replacement.to_string(),
        None => titled,
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            // leave short all-caps tokens (ISO country codes) untouched
            if word.len() <= 3 && word.chars().all(|c| c.is_ascii_uppercase()) {
                return word.to_string();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// String field at a JSON pointer path.
pub(crate) fn json_str(rec: &JsonValue, ptr: &str) -> Option<String> {
    rec.pointer(ptr)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Integer field at a JSON pointer path. Vendors are inconsistent about
/// numeric typing, so numeric strings count too.
pub(crate) fn json_i64(rec: &JsonValue, ptr: &str) -> Option<i64> {
    match rec.pointer(ptr)? {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Float field at a JSON pointer path, with the same string leniency.
pub(crate) fn json_f64(rec: &JsonValue, ptr: &str) -> Option<f64> {
    match rec.pointer(ptr)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a vendor timestamp into naive UTC. RFC 3339 first (what both APIs
/// emit), then a plain `YYYY-MM-DD HH:MM:SS` fallback.
pub(crate) fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()
}

/// Ratio with the documented zero-denominator sentinel of `0.0`.
pub(crate) fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_country_title_cases_and_replaces() {
        assert_eq!(clean_country("  russian federation "), "Russia");
        assert_eq!(clean_country("united states"), "USA");
        assert_eq!(clean_country("BRAZIL"), "Brazil");
        assert_eq!(clean_country("new zealand"), "New Zealand");
        // ISO codes pass through untouched
        assert_eq!(clean_country("BR"), "BR");
    }

    #[test]
    fn test_country_display_name_fallback() {
        assert_eq!(country_display_name("UA"), "Ukraine");
        assert_eq!(country_display_name("BR"), "BR");
    }

    #[test]
    fn test_json_numbers_accept_strings() {
        let rec = json!({"stats": {"member_count": "42", "open_rate": "0.25"}});
        assert_eq!(json_i64(&rec, "/stats/member_count"), Some(42));
        assert_eq!(json_f64(&rec, "/stats/open_rate"), Some(0.25));
        assert_eq!(json_i64(&rec, "/stats/missing"), None);
    }

    #[test]
    fn test_parse_datetime_formats() {
        let rfc = parse_datetime("2024-03-01T10:30:00+02:00").unwrap();
        assert_eq!(rfc.to_string(), "2024-03-01 08:30:00");
        let plain = parse_datetime("2024-03-01 10:30:00").unwrap();
        assert_eq!(plain.to_string(), "2024-03-01 10:30:00");
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn test_ratio_sentinel() {
        assert_eq!(ratio_or_zero(1.0, 4.0), 0.25);
        assert_eq!(ratio_or_zero(5.0, 0.0), 0.0);
        assert_eq!(ratio_or_zero(0.0, 0.0), 0.0);
    }
}
