//! Identity keys for declaring types and their rules.

use std::any::TypeId;
use std::fmt;

use crate::mode::Mode;

/// Stable identity of a declaring type.
///
/// Equality and hashing use the `TypeId` alone; the type name is carried for
/// diagnostics and error messages.
///
/// # Examples
///
/// ```rust
/// use instantiator::TypeTag;
///
/// struct DatabaseFactory;
///
/// let tag = TypeTag::of::<DatabaseFactory>();
/// assert_eq!(tag, TypeTag::of::<DatabaseFactory>());
/// assert!(tag.display_name().ends_with("DatabaseFactory"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Builds a tag from its parts; `name` is informational only.
    pub fn new(id: TypeId, name: &'static str) -> Self {
        Self { id, name }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Get the type name for display
    pub fn display_name(&self) -> &'static str {
        self.name
    }
}

// Hot path: TypeId-only comparison
impl PartialEq for TypeTag {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl std::hash::Hash for TypeTag {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// `(declaring type, mode)` key of a registry entry and of its singleton slot.
///
/// # Examples
///
/// ```rust
/// use instantiator::{RuleKey, TypeTag, Mode};
///
/// struct Cache;
/// let key = RuleKey::new(TypeTag::of::<Cache>(), Mode::from("test"));
/// assert_eq!(key.mode().as_str(), "test");
/// assert!(key.to_string().ends_with("Cache[test]"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    declaring: TypeTag,
    mode: Mode,
}

impl RuleKey {
    pub fn new(declaring: TypeTag, mode: Mode) -> Self {
        Self { declaring, mode }
    }

    pub fn declaring(&self) -> TypeTag {
        self.declaring
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn display_name(&self) -> &'static str {
        self.declaring.display_name()
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.declaring, self.mode)
    }
}

// Helper function for creating declaring-type tags
#[inline(always)]
pub fn tag_of<T: ?Sized + 'static>() -> TypeTag {
    TypeTag::of::<T>()
}
