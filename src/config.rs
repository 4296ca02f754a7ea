//! Mode settings: the value held as process-wide (or per-context) defaults.
//!
//! Settings can be built in code, read from environment variables, or, with
//! the `config` feature, deserialized from JSON.

use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{InstantiatorError, InstantiatorResult};
use crate::mode::Mode;

/// Environment variable prefix used by [`ModeSettings::from_env`].
pub const DEFAULT_ENV_PREFIX: &str = "INSTANTIATOR";

/// Default mode and fallback flag captured by newly constructed instantiators.
///
/// # Examples
///
/// ```rust
/// use instantiator::{ModeSettings, Mode};
///
/// let settings = ModeSettings::default();
/// assert_eq!(settings.mode, Mode::DEFAULT);
/// assert!(settings.fallback);
///
/// let test = ModeSettings::new("test", false);
/// assert_eq!(test.mode.as_str(), "test");
/// assert!(!test.fallback);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ModeSettings {
    /// Mode used when an instantiator is built without an explicit one
    pub mode: Mode,
    /// Whether unresolved modes retry under `"default"`
    pub fallback: bool,
}

impl ModeSettings {
    pub fn new(mode: impl Into<Mode>, fallback: bool) -> Self {
        Self {
            mode: mode.into(),
            fallback,
        }
    }

    /// Reads `INSTANTIATOR_MODE` and `INSTANTIATOR_FALLBACK`.
    pub fn from_env() -> InstantiatorResult<Self> {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Reads `<PREFIX>_MODE` and `<PREFIX>_FALLBACK`; unset variables keep
    /// their defaults.
    pub fn from_env_with_prefix(prefix: &str) -> InstantiatorResult<Self> {
        let prefix = prefix.to_uppercase();
        let mut settings = Self::default();

        let mode_key = format!("{}_MODE", prefix);
        if let Ok(mode) = env::var(&mode_key) {
            settings.mode = Mode::from(mode);
        }

        let fallback_key = format!("{}_FALLBACK", prefix);
        if let Ok(raw) = env::var(&fallback_key) {
            settings.fallback = parse_flag(&raw)
                .ok_or_else(|| InstantiatorError::InvalidSetting(fallback_key, raw))?;
        }

        Ok(settings)
    }

    /// Parses settings from JSON; missing fields take their defaults.
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> InstantiatorResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| InstantiatorError::InvalidSetting("json".to_string(), e.to_string()))
    }
}

impl Default for ModeSettings {
    fn default() -> Self {
        Self {
            mode: Mode::DEFAULT,
            fallback: true,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("No"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_flag(""), None);
    }

    #[test]
    fn test_from_env_with_prefix() {
        // Unique prefix so parallel tests never share variables
        env::set_var("INSTTEST_ENV_A_MODE", "test");
        env::set_var("INSTTEST_ENV_A_FALLBACK", "off");

        let settings = ModeSettings::from_env_with_prefix("insttest_env_a").unwrap();
        assert_eq!(settings.mode.as_str(), "test");
        assert!(!settings.fallback);

        env::remove_var("INSTTEST_ENV_A_MODE");
        env::remove_var("INSTTEST_ENV_A_FALLBACK");
    }

    #[test]
    fn test_from_env_unset_keeps_defaults() {
        let settings = ModeSettings::from_env_with_prefix("INSTTEST_ENV_UNSET").unwrap();
        assert_eq!(settings, ModeSettings::default());
    }

    #[test]
    fn test_from_env_invalid_fallback() {
        env::set_var("INSTTEST_ENV_B_FALLBACK", "sometimes");

        let err = ModeSettings::from_env_with_prefix("INSTTEST_ENV_B").unwrap_err();
        match err {
            InstantiatorError::InvalidSetting(key, value) => {
                assert_eq!(key, "INSTTEST_ENV_B_FALLBACK");
                assert_eq!(value, "sometimes");
            }
            other => panic!("unexpected error: {other}"),
        }

        env::remove_var("INSTTEST_ENV_B_FALLBACK");
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_json_str() {
        let settings = ModeSettings::from_json_str(r#"{"mode": "test"}"#).unwrap();
        assert_eq!(settings.mode.as_str(), "test");
        assert!(settings.fallback);

        let settings = ModeSettings::from_json_str(r#"{"mode": "ci", "fallback": false}"#).unwrap();
        assert_eq!(settings, ModeSettings::new("ci", false));

        assert!(ModeSettings::from_json_str("{ not json").is_err());
    }
}
