use std::{str::FromStr, time::Duration};

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parse a millisecond count into a [`Duration`]. Returns `None` for missing or malformed values.
pub fn parse_millis(value: Option<String>) -> Option<Duration> {
    value.and_then(|v| u64::from_str(v.trim()).ok()).map(Duration::from_millis)
}
