//! Environment-driven configuration helpers.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config value(s): {}", keys.join(", "))]
    Missing { keys: Vec<String> },
}

/// Reads the named environment variables, failing with every missing name
/// at once so startup errors are actionable.
pub fn require_env(keys: &[&str]) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut values = BTreeMap::new();
    let mut missing = Vec::new();
    for key in keys {
        match std::env::var(key) {
            Ok(value) if !value.is_empty() => {
                values.insert((*key).to_string(), value);
            }
            _ => missing.push((*key).to_string()),
        }
    }
    if missing.is_empty() {
        Ok(values)
    } else {
        Err(ConfigError::Missing { keys: missing })
    }
}

/// Reads an optional environment variable with a fallback.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

/// Reads an optional parseable environment variable with a fallback.
pub fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_are_reported_together() {
        let err = require_env(&["CHERETA_TEST_NOPE_A", "CHERETA_TEST_NOPE_B"]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("CHERETA_TEST_NOPE_A"));
        assert!(message.contains("CHERETA_TEST_NOPE_B"));
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(env_or("CHERETA_TEST_NOPE_C", "fallback"), "fallback");
        assert_eq!(env_parse_or("CHERETA_TEST_NOPE_D", 50u32), 50);
    }
}
