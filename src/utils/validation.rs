//! Input validation primitives.
//!
//! - Non-empty checks for required settings
//! - Boolean-like string conversion

use crate::error::{Error, Result};

/// Require a setting to be present and non-empty after trimming.
///
/// A missing or blank value is reported as a missing configuration key.
pub fn require_setting<'a>(value: Option<&'a str>, key: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::config_missing_key(key, None)),
    }
}

/// Require a collection setting to be non-empty.
pub fn require_non_empty_vec<'a, T>(vec: &'a [T], key: &str) -> Result<&'a [T]> {
    if vec.is_empty() {
        Err(Error::config_missing_key(key, None))
    } else {
        Ok(vec)
    }
}

/// Convert a boolean-like string.
///
/// Accepts `true/yes/t/y/1` and `false/no/f/n/0`, case-insensitively.
pub fn to_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "t" | "y" | "1" => Some(true),
        "false" | "no" | "f" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Convert a boolean-like setting, failing with a configuration error
/// that names the key.
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    to_bool(value).ok_or_else(|| {
        Error::config_invalid_value(
            key,
            Some(value.to_string()),
            format!("Value '{}' cannot be converted to bool", value),
        )
    })
}
