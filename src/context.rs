//! Context objects: settings, registries and observers shared by the
//! instantiators built against them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

use crate::config::ModeSettings;
use crate::descriptors::RuleDescriptor;
use crate::error::{InstantiatorError, InstantiatorResult};
use crate::instantiator::{Declaration, Instantiator};
use crate::key::TypeTag;
use crate::mode::Mode;
use crate::observer::{InstantiatorObserver, Observers};
use crate::registry::{ErasedRegistry, FactoryRegistry};

// Created on first access in a thread-safe manner.
static GLOBAL_CONTEXT: Lazy<Arc<Context>> = Lazy::new(|| Context::with_settings(ModeSettings::default()));

/// Holds the default mode settings, one [`FactoryRegistry`] per declaring
/// type, and the registered observers.
///
/// Most applications use the process-wide [`Context::global`]. Isolated
/// contexts are useful for tests and for subsystems that must not share
/// singletons or settings with the rest of the process; each context runs a
/// declaring type's registration step separately.
///
/// # Examples
///
/// ```rust
/// use instantiator::{Context, Declaration, Instantiator, InstantiatorResult, ModeSettings, Registrar};
/// use std::sync::Arc;
///
/// struct Storage;
/// impl Declaration for Storage {
///     type Product = str;
///     type Args = ();
///     fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
///         registrar
///             .instance("default", |_| Arc::from("disk"))
///             .instance("test", |_| Arc::from("tmpfs"));
///         Ok(())
///     }
/// }
///
/// let context = Context::with_settings(ModeSettings::new("test", true));
/// let storage = context.instantiator::<Storage>().unwrap();
/// assert_eq!(&*storage.get_instance(()).unwrap(), "tmpfs");
///
/// // Later changes only affect instantiators built afterwards.
/// context.set_mode("default");
/// assert_eq!(&*storage.get_instance(()).unwrap(), "tmpfs");
/// assert_eq!(&*context.instantiator::<Storage>().unwrap().get_instance(()).unwrap(), "disk");
/// ```
pub struct Context {
    settings: RwLock<ModeSettings>,
    registries: Mutex<HashMap<TypeTag, Arc<dyn ErasedRegistry>>>,
    observers: Arc<Observers>,
}

impl Context {
    /// Creates an isolated context with default settings.
    pub fn new() -> Arc<Self> {
        Self::with_settings(ModeSettings::default())
    }

    /// Creates an isolated context with explicit settings.
    pub fn with_settings(settings: ModeSettings) -> Arc<Self> {
        Arc::new(Self {
            settings: RwLock::new(settings),
            registries: Mutex::new(HashMap::new()),
            observers: Arc::new(Observers::new()),
        })
    }

    /// The process-wide context, created lazily with default settings.
    pub fn global() -> &'static Arc<Context> {
        &GLOBAL_CONTEXT
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> ModeSettings {
        self.settings.read().clone()
    }

    pub fn replace_settings(&self, settings: ModeSettings) {
        *self.settings.write() = settings;
    }

    pub fn mode(&self) -> Mode {
        self.settings.read().mode.clone()
    }

    pub fn set_mode(&self, mode: impl Into<Mode>) {
        self.settings.write().mode = mode.into();
    }

    pub fn fallback(&self) -> bool {
        self.settings.read().fallback
    }

    pub fn set_fallback(&self, fallback: bool) {
        self.settings.write().fallback = fallback;
    }

    /// Registry for `D`, created on first request. `D::register` runs before
    /// this returns unless it already succeeded in this context.
    pub fn registry<D: Declaration>(&self) -> InstantiatorResult<Arc<FactoryRegistry<D>>> {
        let tag = TypeTag::of::<D>();
        let erased = {
            let mut registries = self.registries.lock();
            Arc::clone(registries.entry(tag).or_insert_with(|| {
                Arc::new(FactoryRegistry::<D>::new(Arc::clone(&self.observers)))
                    as Arc<dyn ErasedRegistry>
            }))
        };

        let registry = erased
            .as_any()
            .downcast::<FactoryRegistry<D>>()
            .map_err(|_| InstantiatorError::TypeMismatch(tag.display_name()))?;

        // Outside the map lock so registration steps may build other types.
        registry.ensure_registered()?;
        Ok(registry)
    }

    /// Builds an instantiator for `D` against this context.
    pub fn instantiator<D: Declaration>(self: &Arc<Self>) -> InstantiatorResult<Instantiator<D>> {
        Instantiator::in_context(self)
    }

    /// Declaring types whose registration step has completed.
    pub fn declared_types(&self) -> Vec<TypeTag> {
        let mut tags: Vec<TypeTag> = self
            .registries()
            .into_iter()
            .filter(|registry| registry.is_registered())
            .map(|registry| registry.tag())
            .collect();
        tags.sort_by_key(|tag| tag.display_name());
        tags
    }

    /// Every registered rule, sorted by declaring type name then mode.
    pub fn descriptors(&self) -> Vec<RuleDescriptor> {
        let mut descriptors: Vec<RuleDescriptor> = self
            .registries()
            .into_iter()
            .flat_map(|registry| registry.descriptors())
            .collect();
        descriptors.sort_by(|a, b| {
            a.type_name()
                .cmp(b.type_name())
                .then_with(|| a.mode().cmp(b.mode()))
        });
        descriptors
    }

    pub fn add_observer(&self, observer: Arc<dyn InstantiatorObserver>) {
        self.observers.add(observer);
    }

    pub(crate) fn registries(&self) -> Vec<Arc<dyn ErasedRegistry>> {
        self.registries.lock().values().cloned().collect()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("settings", &self.settings())
            .field("declared_types", &self.declared_types())
            .finish()
    }
}
