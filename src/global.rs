//! Process-wide default mode and fallback flag.
//!
//! These functions read and write the settings of [`Context::global`]. Values
//! are captured by instantiators at construction time, so a change applies to
//! instantiators built afterwards only.
//!
//! # Examples
//!
//! ```
//! use instantiator::global;
//!
//! assert_eq!(global::global_mode().as_str(), "default");
//! assert!(global::global_fallback());
//!
//! global::set_global_mode("test");
//! global::set_global_fallback(false);
//! assert_eq!(global::global_mode().as_str(), "test");
//! assert!(!global::global_fallback());
//! ```

use crate::config::ModeSettings;
use crate::context::Context;
use crate::mode::Mode;

/// Sets the mode captured by instantiators built without an explicit one.
pub fn set_global_mode(mode: impl Into<Mode>) {
    Context::global().set_mode(mode);
}

/// Current global mode; `"default"` unless changed.
pub fn global_mode() -> Mode {
    Context::global().mode()
}

pub fn set_global_fallback(fallback: bool) {
    Context::global().set_fallback(fallback);
}

/// Current global fallback flag; `true` unless changed.
pub fn global_fallback() -> bool {
    Context::global().fallback()
}

pub fn global_settings() -> ModeSettings {
    Context::global().settings()
}
