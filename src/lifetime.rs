//! Rule lifetime definitions.

/// Lifetimes controlling instance caching behavior
///
/// Every construction rule is registered with exactly one lifetime. The
/// lifetime decides whether a resolution runs the rule or reuses an earlier
/// result.
///
/// # Examples
///
/// ```rust
/// use instantiator::Lifetime;
///
/// assert!(Lifetime::Singleton.is_cached());
/// assert!(!Lifetime::Transient.is_cached());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum Lifetime {
    /// New instance per resolution, never cached
    ///
    /// Every resolution invokes the rule with the arguments it was given and
    /// returns the fresh result.
    Transient,
    /// Single instance per `(declaring type, mode)`, cached for the process
    ///
    /// The first resolution builds the instance from its arguments; every
    /// later resolution returns that instance and ignores its own arguments.
    /// The cache belongs to the registry entry, never to an instantiator, so
    /// all instantiators of one declaring type share it.
    Singleton,
}

impl Lifetime {
    /// True when resolutions reuse a cached instance.
    pub fn is_cached(self) -> bool {
        matches!(self, Lifetime::Singleton)
    }
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifetime::Transient => f.write_str("transient"),
            Lifetime::Singleton => f.write_str("singleton"),
        }
    }
}
