//! Per-declaring-type factory registries.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::descriptors::RuleDescriptor;
use crate::error::{BoxError, InstantiatorError, InstantiatorResult};
use crate::instantiator::Declaration;
use crate::key::{RuleKey, TypeTag};
use crate::lifetime::Lifetime;
use crate::mode::Mode;
use crate::observer::Observers;
use crate::registration::{DeclaredRule, Registrar, Rule};

/// Registered rule plus its singleton slot.
///
/// The slot lives and dies with the entry: replacing the rule for a mode
/// drops the entry and with it any cached instance.
struct RuleEntry<P: ?Sized, A> {
    rule: Rule<P, A>,
    lifetime: Lifetime,
    slot: OnceCell<Arc<P>>,
}

impl<P: ?Sized + 'static, A: 'static> RuleEntry<P, A> {
    fn new(rule: Rule<P, A>, lifetime: Lifetime) -> Self {
        Self {
            rule,
            lifetime,
            slot: OnceCell::new(),
        }
    }

    fn produce(&self, args: A) -> Result<Arc<P>, BoxError> {
        match self.lifetime {
            Lifetime::Transient => self.rule.build(args),
            // Exactly one initializer runs; concurrent callers block and then
            // observe the stored value. Errors leave the slot empty.
            Lifetime::Singleton => self
                .slot
                .get_or_try_init(|| self.rule.build(args))
                .map(Arc::clone),
        }
    }

    fn is_cached(&self) -> bool {
        self.slot.get().is_some()
    }
}

type Entry<D> = Arc<RuleEntry<<D as Declaration>::Product, <D as Declaration>::Args>>;

/// Mapping `mode -> construction rule` for one declaring type, with the
/// singleton caches of its rules.
///
/// Registries are created by a [`Context`](crate::Context) on first use of the
/// declaring type and live as long as the context. The declaring type's
/// registration step populates the registry exactly once; [`register`]
/// remains available afterwards for targeted overrides.
///
/// [`register`]: FactoryRegistry::register
pub struct FactoryRegistry<D: Declaration> {
    tag: TypeTag,
    rules: RwLock<HashMap<Mode, Entry<D>>>,
    registered: OnceCell<()>,
    observers: Arc<Observers>,
    _declaring: PhantomData<fn() -> D>,
}

impl<D: Declaration> FactoryRegistry<D> {
    pub(crate) fn new(observers: Arc<Observers>) -> Self {
        Self {
            tag: TypeTag::of::<D>(),
            rules: RwLock::new(HashMap::new()),
            registered: OnceCell::new(),
            observers,
            _declaring: PhantomData,
        }
    }

    /// Runs `D::register` unless a previous run already succeeded.
    ///
    /// Concurrent first constructions block until the winning run finishes.
    /// A failed run commits nothing and is retried by the next construction.
    pub(crate) fn ensure_registered(&self) -> InstantiatorResult<()> {
        self.registered
            .get_or_try_init(|| {
                let mut registrar = Registrar::<D>::new();
                D::register(&mut registrar)?;
                let staged = registrar.finish()?;

                let mut modes = Vec::with_capacity(staged.len());
                for entry in staged {
                    modes.push(entry.mode.clone());
                    self.insert(entry.mode, entry.rule, entry.lifetime);
                }
                modes.sort();
                modes.dedup();

                tracing::debug!(declaring = %self.tag, ?modes, "registration committed");
                self.observers.registered(self.tag, &modes);
                Ok(())
            })
            .map(|_| ())
    }

    /// Inserts or overwrites the rule for `mode`.
    ///
    /// Overwriting drops the previous rule together with its cached singleton,
    /// so later resolutions never see an instance built by a replaced rule.
    pub fn register(
        &self,
        mode: impl Into<Mode>,
        rule: DeclaredRule<D>,
        lifetime: Lifetime,
    ) -> InstantiatorResult<()> {
        let mode = mode.into();
        if mode.is_empty() {
            return Err(InstantiatorError::EmptyMode(self.tag.display_name()));
        }
        self.insert(mode, rule, lifetime);
        Ok(())
    }

    fn insert(&self, mode: Mode, rule: DeclaredRule<D>, lifetime: Lifetime) {
        let entry = Arc::new(RuleEntry::new(rule, lifetime));
        let previous = self.rules.write().insert(mode.clone(), entry);

        if let Some(previous) = previous {
            let key = RuleKey::new(self.tag, mode);
            tracing::warn!(
                key = %key,
                previous = %previous.lifetime,
                current = %lifetime,
                dropped_cached = previous.is_cached(),
                "rule replaced for an already registered mode"
            );
            self.observers.rule_replaced(&key);
        }
    }

    /// Resolves `mode` to an instance.
    ///
    /// Uses the rule for `mode` when present; otherwise, with `fallback` set
    /// and `mode` not already `"default"`, the rule for `"default"`; otherwise
    /// fails with [`InstantiatorError::ModeNotRegistered`]. Transient rules
    /// run on every call; singleton rules run once per `(declaring type, mode)`
    /// and later calls ignore `args`.
    pub fn resolve(
        &self,
        mode: &Mode,
        fallback: bool,
        args: D::Args,
    ) -> InstantiatorResult<Arc<D::Product>> {
        let Some((served, entry)) = self.lookup(mode, fallback) else {
            tracing::warn!(declaring = %self.tag, requested = %mode, fallback, "mode not registered");
            self.observers.unresolved(self.tag, mode);
            return Err(InstantiatorError::ModeNotRegistered(
                self.tag.display_name(),
                mode.clone(),
            ));
        };

        if served != *mode {
            tracing::debug!(declaring = %self.tag, requested = %mode, "falling back to default mode");
            self.observers.fell_back(self.tag, mode);
        }

        let key = RuleKey::new(self.tag, served);
        let observed = self.observers.has_observers();
        if observed {
            self.observers.resolving(&key);
        }

        // The map lock is already released; rules may resolve other types.
        let start = Instant::now();
        match entry.produce(args) {
            Ok(instance) => {
                let duration = start.elapsed();
                tracing::trace!(key = %key, lifetime = %entry.lifetime, ?duration, "resolved");
                if observed {
                    self.observers.resolved(&key, entry.lifetime, duration);
                }
                Ok(instance)
            }
            Err(source) => {
                let message = source.to_string();
                tracing::warn!(key = %key, error = %message, "construction rule failed");
                self.observers.construction_failed(&key, &message);
                Err(InstantiatorError::Construction(
                    self.tag.display_name(),
                    key.mode().clone(),
                    Arc::from(source),
                ))
            }
        }
    }

    fn lookup(&self, mode: &Mode, fallback: bool) -> Option<(Mode, Entry<D>)> {
        let rules = self.rules.read();
        if let Some(entry) = rules.get(mode) {
            return Some((mode.clone(), Arc::clone(entry)));
        }
        if fallback && !mode.is_default() {
            return rules
                .get(&Mode::DEFAULT)
                .map(|entry| (Mode::DEFAULT, Arc::clone(entry)));
        }
        None
    }

    /// Mode whose rule would serve a request, without constructing anything.
    pub fn served_mode(&self, mode: &Mode, fallback: bool) -> Option<Mode> {
        self.lookup(mode, fallback).map(|(served, _)| served)
    }

    pub fn contains(&self, mode: &Mode) -> bool {
        self.rules.read().contains_key(mode)
    }

    /// Registered modes, sorted.
    pub fn modes(&self) -> Vec<Mode> {
        let mut modes: Vec<Mode> = self.rules.read().keys().cloned().collect();
        modes.sort();
        modes
    }

    pub fn lifetime_of(&self, mode: &Mode) -> Option<Lifetime> {
        self.rules.read().get(mode).map(|entry| entry.lifetime)
    }

    /// True when a singleton instance is cached for exactly `mode`.
    pub fn is_cached(&self, mode: &Mode) -> bool {
        self.rules
            .read()
            .get(mode)
            .map(|entry| entry.is_cached())
            .unwrap_or(false)
    }

    /// True once the registration step has completed successfully.
    pub fn is_registered(&self) -> bool {
        self.registered.get().is_some()
    }

    /// Drops every cached singleton; rules stay registered.
    pub fn clear_singletons(&self) {
        let mut rules = self.rules.write();
        for entry in rules.values_mut() {
            if entry.lifetime.is_cached() {
                *entry = Arc::new(RuleEntry::new(entry.rule.clone(), entry.lifetime));
            }
        }
        tracing::debug!(declaring = %self.tag, "singleton caches cleared");
    }

    pub fn declaring(&self) -> TypeTag {
        self.tag
    }

    /// Descriptors for every registered rule, sorted by mode.
    pub fn descriptors(&self) -> Vec<RuleDescriptor> {
        let rules = self.rules.read();
        let mut descriptors: Vec<RuleDescriptor> = rules
            .iter()
            .map(|(mode, entry)| RuleDescriptor {
                key: RuleKey::new(self.tag, mode.clone()),
                lifetime: entry.lifetime,
                cached: entry.is_cached(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.key.mode().cmp(b.key.mode()));
        descriptors
    }
}

impl<D: Declaration> fmt::Debug for FactoryRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("declaring", &self.tag)
            .field("modes", &self.modes())
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// Type-erased view of a registry, stored by [`Context`](crate::Context).
pub(crate) trait ErasedRegistry: Send + Sync {
    fn tag(&self) -> TypeTag;
    fn served_mode(&self, mode: &Mode, fallback: bool) -> Option<Mode>;
    fn descriptors(&self) -> Vec<RuleDescriptor>;
    fn is_registered(&self) -> bool;
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<D: Declaration> ErasedRegistry for FactoryRegistry<D> {
    fn tag(&self) -> TypeTag {
        self.tag
    }

    fn served_mode(&self, mode: &Mode, fallback: bool) -> Option<Mode> {
        FactoryRegistry::served_mode(self, mode, fallback)
    }

    fn descriptors(&self) -> Vec<RuleDescriptor> {
        FactoryRegistry::descriptors(self)
    }

    fn is_registered(&self) -> bool {
        FactoryRegistry::is_registered(self)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
