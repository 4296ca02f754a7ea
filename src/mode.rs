//! Mode identifiers.

use std::borrow::{Borrow, Cow};
use std::fmt;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Runtime-selectable construction variant, e.g. `"default"` or `"test"`.
///
/// Modes are plain identifiers; whether a mode is usable for a declaring type
/// is decided only by whether that type registered a rule for it. The reserved
/// mode [`Mode::DEFAULT`] is the fallback target.
///
/// # Examples
///
/// ```rust
/// use instantiator::Mode;
///
/// let test = Mode::from("test");
/// assert_eq!(test.as_str(), "test");
/// assert!(!test.is_default());
/// assert!(Mode::default().is_default());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(transparent))]
pub struct Mode(Cow<'static, str>);

impl Mode {
    /// The reserved fallback mode, `"default"`.
    pub const DEFAULT: Mode = Mode(Cow::Borrowed("default"));

    /// Creates a mode from any string-like value.
    ///
    /// ```
    /// use instantiator::Mode;
    ///
    /// let ci = Mode::new(format!("ci-{}", 7));
    /// assert_eq!(ci.as_str(), "ci-7");
    /// assert_eq!(Mode::new("default"), Mode::DEFAULT);
    /// ```
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Mode(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the reserved `"default"` mode.
    pub fn is_default(&self) -> bool {
        self.as_str() == Self::DEFAULT.as_str()
    }

    /// Empty modes are accepted as settings but rejected at registration.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Mode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Mode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Mode {
    fn from(name: &'static str) -> Self {
        Mode(Cow::Borrowed(name))
    }
}

impl From<String> for Mode {
    fn from(name: String) -> Self {
        Mode(Cow::Owned(name))
    }
}

impl From<&Mode> for Mode {
    fn from(mode: &Mode) -> Self {
        mode.clone()
    }
}

impl PartialEq<str> for Mode {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Mode {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
