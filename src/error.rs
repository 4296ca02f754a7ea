//! Error types for construction resolution.

use std::fmt;
use std::sync::Arc;

use crate::mode::Mode;

/// Boxed error returned by fallible construction rules.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Instantiator errors
///
/// Represents the conditions that can occur while registering construction
/// rules, resolving a mode to a rule, or running the rule itself.
///
/// # Examples
///
/// ```rust
/// use instantiator::{InstantiatorError, Mode};
///
/// let missing = InstantiatorError::ModeNotRegistered("app::DatabaseFactory", Mode::from("staging"));
/// assert_eq!(
///     missing.to_string(),
///     "Mode 'staging' is not registered for app::DatabaseFactory"
/// );
/// ```
#[derive(Debug, Clone)]
pub enum InstantiatorError {
    /// No rule for the requested mode, and no usable fallback
    ModeNotRegistered(&'static str, Mode),
    /// A registration step tried to register a rule under the empty mode
    EmptyMode(&'static str),
    /// Registry storage held an unexpected type
    TypeMismatch(&'static str),
    /// A fallible construction rule returned an error (kept as the source)
    Construction(&'static str, Mode, Arc<dyn std::error::Error + Send + Sync + 'static>),
    /// A registration step reported a failure
    Registration(&'static str, String),
    /// A configuration value could not be parsed (setting, raw value)
    InvalidSetting(String, String),
}

impl InstantiatorError {
    /// Name of the declaring type the error concerns, if any.
    pub fn declaring_type(&self) -> Option<&'static str> {
        match self {
            InstantiatorError::ModeNotRegistered(name, _)
            | InstantiatorError::EmptyMode(name)
            | InstantiatorError::TypeMismatch(name)
            | InstantiatorError::Construction(name, _, _)
            | InstantiatorError::Registration(name, _) => Some(*name),
            InstantiatorError::InvalidSetting(_, _) => None,
        }
    }

    /// True for the "requested mode has no rule" failure.
    pub fn is_mode_not_registered(&self) -> bool {
        matches!(self, InstantiatorError::ModeNotRegistered(_, _))
    }
}

impl fmt::Display for InstantiatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstantiatorError::ModeNotRegistered(name, mode) => {
                write!(f, "Mode '{}' is not registered for {}", mode, name)
            }
            InstantiatorError::EmptyMode(name) => {
                write!(f, "Empty mode registered for {}", name)
            }
            InstantiatorError::TypeMismatch(name) => write!(f, "Type mismatch for: {}", name),
            InstantiatorError::Construction(name, mode, source) => {
                write!(f, "Construction of {} in mode '{}' failed: {}", name, mode, source)
            }
            InstantiatorError::Registration(name, msg) => {
                write!(f, "Registration of {} failed: {}", name, msg)
            }
            InstantiatorError::InvalidSetting(setting, value) => {
                write!(f, "Invalid value '{}' for setting {}", value, setting)
            }
        }
    }
}

impl std::error::Error for InstantiatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InstantiatorError::Construction(_, _, source) => Some(&**source),
            _ => None,
        }
    }
}

/// Result type for instantiator operations
pub type InstantiatorResult<T> = Result<T, InstantiatorError>;
