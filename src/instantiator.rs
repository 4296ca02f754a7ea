//! The instantiator base: local mode/fallback state bound to a declaring
//! type's registry.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::Context;
use crate::error::InstantiatorResult;
use crate::mode::Mode;
use crate::registration::Registrar;
use crate::registry::FactoryRegistry;

/// A declaring type: names a product contract, the arguments its rules take,
/// and the registration step that maps modes to rules.
///
/// The registration step runs exactly once per declaring type and context,
/// on the first construction of an [`Instantiator`] for it.
///
/// # Examples
///
/// ```rust
/// use instantiator::{Declaration, Instantiator, InstantiatorResult, Registrar};
/// use std::sync::Arc;
///
/// trait Database: Send + Sync {
///     fn name(&self) -> String;
/// }
///
/// struct Postgres(String);
/// impl Database for Postgres {
///     fn name(&self) -> String { format!("postgres:{}", self.0) }
/// }
///
/// struct InMemory;
/// impl Database for InMemory {
///     fn name(&self) -> String { "memory".to_string() }
/// }
///
/// struct DatabaseFactory;
///
/// impl Declaration for DatabaseFactory {
///     type Product = dyn Database;
///     type Args = String;
///
///     fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
///         registrar
///             .instance("default", |url| Arc::new(Postgres(url)) as Arc<dyn Database>)
///             .singleton("test", |_| Arc::new(InMemory) as Arc<dyn Database>);
///         Ok(())
///     }
/// }
///
/// let db = Instantiator::<DatabaseFactory>::with_mode("test")
///     .unwrap()
///     .get_instance("ignored".to_string())
///     .unwrap();
/// assert_eq!(db.name(), "memory");
/// ```
pub trait Declaration: Sized + 'static {
    /// The contract every rule produces; usually a `dyn Trait`.
    type Product: ?Sized + Send + Sync + 'static;
    /// The fixed argument list every rule receives.
    type Args: 'static;

    /// Maps the supported modes to construction rules.
    fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()>;

    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Resolution handle for one declaring type.
///
/// Holds a local mode and fallback flag, captured at construction from
/// explicit values or from the context's current settings, and a reference to
/// the declaring type's shared [`FactoryRegistry`]. Changing the context's
/// settings later does not affect existing instantiators; the setters below
/// change only this handle.
///
/// Concrete instantiators are usually newtypes exposing a typed accessor:
///
/// ```rust
/// use instantiator::{Declaration, Instantiator, InstantiatorResult, Registrar};
/// use std::sync::Arc;
///
/// pub struct Connection { pub url: String }
///
/// struct ConnectionDecl;
/// impl Declaration for ConnectionDecl {
///     type Product = Connection;
///     type Args = String;
///
///     fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
///         registrar.instance("default", |url| Arc::new(Connection { url }));
///         Ok(())
///     }
/// }
///
/// pub struct Connections(Instantiator<ConnectionDecl>);
///
/// impl Connections {
///     pub fn new() -> InstantiatorResult<Self> {
///         Ok(Self(Instantiator::new()?))
///     }
///
///     pub fn connection(&self, url: &str) -> InstantiatorResult<Arc<Connection>> {
///         self.0.get_instance(url.to_string())
///     }
/// }
///
/// let conn = Connections::new().unwrap().connection("postgres://db").unwrap();
/// assert_eq!(conn.url, "postgres://db");
/// ```
pub struct Instantiator<D: Declaration> {
    mode: Mode,
    fallback: bool,
    registry: Arc<FactoryRegistry<D>>,
}

impl<D: Declaration> Instantiator<D> {
    /// Builds against the global context using its current settings.
    pub fn new() -> InstantiatorResult<Self> {
        Self::builder().build()
    }

    /// Builds against the global context with an explicit mode.
    pub fn with_mode(mode: impl Into<Mode>) -> InstantiatorResult<Self> {
        Self::builder().mode(mode).build()
    }

    /// Builds against the global context; `None` takes the current global value.
    pub fn with_settings(mode: Option<Mode>, fallback: Option<bool>) -> InstantiatorResult<Self> {
        InstantiatorBuilder {
            context: None,
            mode,
            fallback,
            _declaring: PhantomData,
        }
        .build()
    }

    /// Builds against `context` using its current settings.
    pub fn in_context(context: &Arc<Context>) -> InstantiatorResult<Self> {
        Self::builder().context(Arc::clone(context)).build()
    }

    pub fn builder() -> InstantiatorBuilder<D> {
        InstantiatorBuilder::new()
    }

    /// Resolves this handle's mode to an instance.
    ///
    /// The only path by which rules are invoked. Fails with
    /// [`ModeNotRegistered`](crate::InstantiatorError::ModeNotRegistered)
    /// when neither the mode nor an allowed `"default"` fallback has a rule.
    #[inline]
    pub fn get_instance(&self, args: D::Args) -> InstantiatorResult<Arc<D::Product>> {
        self.registry.resolve(&self.mode, self.fallback, args)
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn set_mode(&mut self, mode: impl Into<Mode>) {
        self.mode = mode.into();
    }

    pub fn fallback(&self) -> bool {
        self.fallback
    }

    pub fn set_fallback(&mut self, fallback: bool) {
        self.fallback = fallback;
    }

    /// Mode whose rule would serve `get_instance`, if any.
    pub fn served_mode(&self) -> Option<Mode> {
        self.registry.served_mode(&self.mode, self.fallback)
    }

    /// The shared registry of the declaring type.
    pub fn registry(&self) -> &Arc<FactoryRegistry<D>> {
        &self.registry
    }
}

impl<D: Declaration> Clone for Instantiator<D> {
    fn clone(&self) -> Self {
        Self {
            mode: self.mode.clone(),
            fallback: self.fallback,
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<D: Declaration> fmt::Debug for Instantiator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instantiator")
            .field("declaring", &D::name())
            .field("mode", &self.mode)
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// Builder for [`Instantiator`]; unset options come from the context.
///
/// # Examples
///
/// ```rust
/// use instantiator::{Context, Declaration, Instantiator, InstantiatorResult, ModeSettings, Registrar};
/// use std::sync::Arc;
///
/// struct Clock;
/// impl Declaration for Clock {
///     type Product = u64;
///     type Args = ();
///     fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
///         registrar
///             .instance("default", |_| Arc::new(1_700_000_000))
///             .instance("test", |_| Arc::new(0));
///         Ok(())
///     }
/// }
///
/// let context = Context::with_settings(ModeSettings::new("test", false));
/// let clock = Instantiator::<Clock>::builder()
///     .context(context)
///     .fallback(true)
///     .build()
///     .unwrap();
///
/// assert_eq!(clock.mode().as_str(), "test");
/// assert!(clock.fallback());
/// assert_eq!(*clock.get_instance(()).unwrap(), 0);
/// ```
pub struct InstantiatorBuilder<D: Declaration> {
    context: Option<Arc<Context>>,
    mode: Option<Mode>,
    fallback: Option<bool>,
    _declaring: PhantomData<fn() -> D>,
}

impl<D: Declaration> InstantiatorBuilder<D> {
    pub fn new() -> Self {
        Self {
            context: None,
            mode: None,
            fallback: None,
            _declaring: PhantomData,
        }
    }

    /// Resolve against `context` instead of the global one.
    pub fn context(mut self, context: Arc<Context>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn mode(mut self, mode: impl Into<Mode>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn fallback(mut self, fallback: bool) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Captures the local mode/fallback and runs the declaring type's
    /// registration step if it has not run yet in this context.
    ///
    /// A failing registration step is returned unchanged.
    pub fn build(self) -> InstantiatorResult<Instantiator<D>> {
        let context = match self.context {
            Some(context) => context,
            None => Arc::clone(Context::global()),
        };
        let settings = context.settings();
        let registry = context.registry::<D>()?;

        Ok(Instantiator {
            mode: self.mode.unwrap_or(settings.mode),
            fallback: self.fallback.unwrap_or(settings.fallback),
            registry,
        })
    }
}

impl<D: Declaration> Default for InstantiatorBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}
