//! Parsing helpers shared by the environment and YAML loaders.

use std::str::FromStr;

use serde_json::Value;

/// Read an environment variable, treating blank values as unset.
pub(super) fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read and parse an environment variable.
///
/// Returns `Ok(None)` when the variable is unset and an error naming the
/// variable when it does not parse.
pub(super) fn parse_env<T>(key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {key}: {e}")),
        None => Ok(None),
    }
}

/// Parse a boolean flag such as `true`, `1`, `yes` or `off`.
pub(super) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean environment variable.
pub(super) fn parse_env_bool(key: &str) -> Result<Option<bool>, String> {
    match env_var(key) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid value for {key}: expected a boolean, got '{raw}'")),
        None => Ok(None),
    }
}

/// Parse a JSON document from a configuration value.
pub(super) fn parse_json(key: &str, raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("Invalid JSON for {key}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool(" YES "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    #[serial]
    fn test_parse_env_blank_is_unset() {
        unsafe {
            std::env::set_var("WAAV_RELAY_TEST_BLANK", "   ");
        }
        assert_eq!(parse_env::<u64>("WAAV_RELAY_TEST_BLANK").unwrap(), None);
        unsafe {
            std::env::remove_var("WAAV_RELAY_TEST_BLANK");
        }
    }

    #[test]
    #[serial]
    fn test_parse_env_error_names_variable() {
        unsafe {
            std::env::set_var("WAAV_RELAY_TEST_NUM", "ten");
        }
        let err = parse_env::<u64>("WAAV_RELAY_TEST_NUM").unwrap_err();
        assert!(err.contains("WAAV_RELAY_TEST_NUM"));
        unsafe {
            std::env::remove_var("WAAV_RELAY_TEST_NUM");
        }
    }

    #[test]
    fn test_parse_json() {
        assert!(parse_json("X", r#"{"type":"response.cancel"}"#).is_ok());
        assert!(parse_json("X", "{oops").unwrap_err().contains("X"));
    }
}
