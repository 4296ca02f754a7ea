//! Rule descriptors for introspection and diagnostics.

use crate::key::RuleKey;
use crate::lifetime::Lifetime;
use crate::mode::Mode;

/// Rule descriptor for introspection and diagnostics
///
/// Describes one registered `(declaring type, mode)` rule: its lifetime and
/// whether a singleton instance is currently cached for it.
///
/// # Use Cases
///
/// - **Debugging**: Inspect which modes each declaring type supports
/// - **Validation**: Ensure the modes a deployment needs are registered
/// - **Health checks**: Report cached singletons at startup
///
/// # Examples
///
/// ```rust
/// use instantiator::{Context, Declaration, Instantiator, InstantiatorResult, Lifetime, Registrar};
/// use std::sync::Arc;
///
/// struct Greeting;
///
/// impl Declaration for Greeting {
///     type Product = String;
///     type Args = ();
///
///     fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
///         registrar
///             .instance("default", |_| Arc::new("hello".to_string()))
///             .singleton("test", |_| Arc::new("hello from test".to_string()));
///         Ok(())
///     }
/// }
///
/// let context = Context::new();
/// let _ = Instantiator::<Greeting>::in_context(&context).unwrap();
///
/// let descriptors = context.descriptors();
/// assert_eq!(descriptors.len(), 2);
///
/// let test = descriptors.iter().find(|d| d.mode().as_str() == "test").unwrap();
/// assert_eq!(test.lifetime, Lifetime::Singleton);
/// assert!(!test.cached);
/// assert!(test.type_name().ends_with("Greeting"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDescriptor {
    /// Declaring type and mode of the rule
    pub key: RuleKey,
    /// Rule lifetime
    pub lifetime: Lifetime,
    /// Whether a singleton instance is cached right now
    pub cached: bool,
}

impl RuleDescriptor {
    /// Get the declaring type name
    pub fn type_name(&self) -> &'static str {
        self.key.display_name()
    }

    pub fn mode(&self) -> &Mode {
        self.key.mode()
    }

    /// True for the reserved `"default"` rule, the fallback target.
    pub fn is_default(&self) -> bool {
        self.key.mode().is_default()
    }
}
