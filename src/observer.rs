//! Diagnostic observers for construction resolution.
//!
//! Observers see registration and resolution events for every declaring type
//! in a [`Context`](crate::Context). The library itself always emits `tracing`
//! events; observers exist for callers that want the same events as values,
//! e.g. to collect metrics or to assert on them in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::key::{RuleKey, TypeTag};
use crate::lifetime::Lifetime;
use crate::mode::Mode;

/// Observer trait for registration and resolution events.
///
/// Observer calls are made synchronously on the resolving thread. Keep
/// implementations lightweight.
///
/// # Examples
///
/// ```
/// use instantiator::{Context, InstantiatorObserver, RuleKey, Lifetime};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct PrintObserver;
///
/// impl InstantiatorObserver for PrintObserver {
///     fn resolving(&self, key: &RuleKey) {
///         println!("Resolving: {}", key);
///     }
///
///     fn resolved(&self, key: &RuleKey, lifetime: Lifetime, duration: Duration) {
///         println!("Resolved {} ({}) in {:?}", key, lifetime, duration);
///     }
/// }
///
/// let context = Context::new();
/// context.add_observer(Arc::new(PrintObserver));
/// ```
pub trait InstantiatorObserver: Send + Sync {
    /// Called before the rule serving `key` is invoked (or its cache read).
    ///
    /// `key` carries the mode that serves the request, which differs from the
    /// requested mode after a fallback.
    fn resolving(&self, key: &RuleKey);

    /// Called when a resolution produced an instance.
    fn resolved(&self, key: &RuleKey, lifetime: Lifetime, duration: Duration);

    /// Called when `requested` had no rule and `"default"` served instead.
    fn fell_back(&self, _declaring: TypeTag, _requested: &Mode) {}

    /// Called when a resolution failed with `ModeNotRegistered`.
    fn unresolved(&self, _declaring: TypeTag, _requested: &Mode) {}

    /// Called when a fallible rule returned an error.
    fn construction_failed(&self, _key: &RuleKey, _message: &str) {}

    /// Called when a rule overwrote an existing rule for the same mode.
    fn rule_replaced(&self, _key: &RuleKey) {}

    /// Called once a declaring type's registration step has been committed.
    fn registered(&self, _declaring: TypeTag, _modes: &[Mode]) {}
}

/// Container for registered observers, shared by a context and its registries.
#[derive(Default)]
pub(crate) struct Observers {
    observers: RwLock<Vec<Arc<dyn InstantiatorObserver>>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, observer: Arc<dyn InstantiatorObserver>) {
        self.observers.write().push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.read().is_empty()
    }

    // Snapshot so observer callbacks never run under the lock
    fn each(&self, f: impl Fn(&dyn InstantiatorObserver)) {
        let observers = self.observers.read().clone();
        for observer in &observers {
            f(observer.as_ref());
        }
    }

    pub(crate) fn resolving(&self, key: &RuleKey) {
        self.each(|o| o.resolving(key));
    }

    pub(crate) fn resolved(&self, key: &RuleKey, lifetime: Lifetime, duration: Duration) {
        self.each(|o| o.resolved(key, lifetime, duration));
    }

    pub(crate) fn fell_back(&self, declaring: TypeTag, requested: &Mode) {
        self.each(|o| o.fell_back(declaring, requested));
    }

    pub(crate) fn unresolved(&self, declaring: TypeTag, requested: &Mode) {
        self.each(|o| o.unresolved(declaring, requested));
    }

    pub(crate) fn construction_failed(&self, key: &RuleKey, message: &str) {
        self.each(|o| o.construction_failed(key, message));
    }

    pub(crate) fn rule_replaced(&self, key: &RuleKey) {
        self.each(|o| o.rule_replaced(key));
    }

    pub(crate) fn registered(&self, declaring: TypeTag, modes: &[Mode]) {
        self.each(|o| o.registered(declaring, modes));
    }
}

/// Built-in observer that re-emits every event through `tracing` at `INFO`.
///
/// The library's own events are at `TRACE`/`DEBUG`/`WARN`; this observer is
/// useful when a deployment wants resolution activity visible at the usual
/// log level under a recognizable prefix.
///
/// # Examples
///
/// ```
/// use instantiator::{Context, LoggingObserver};
/// use std::sync::Arc;
///
/// let context = Context::new();
/// context.add_observer(Arc::new(LoggingObserver::with_prefix("db-factory")));
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self {
            prefix: "instantiator".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl InstantiatorObserver for LoggingObserver {
    fn resolving(&self, key: &RuleKey) {
        tracing::info!(prefix = %self.prefix, key = %key, "resolving");
    }

    fn resolved(&self, key: &RuleKey, lifetime: Lifetime, duration: Duration) {
        tracing::info!(prefix = %self.prefix, key = %key, %lifetime, ?duration, "resolved");
    }

    fn fell_back(&self, declaring: TypeTag, requested: &Mode) {
        tracing::info!(prefix = %self.prefix, %declaring, %requested, "falling back to default mode");
    }

    fn unresolved(&self, declaring: TypeTag, requested: &Mode) {
        tracing::error!(prefix = %self.prefix, %declaring, %requested, "mode not registered");
    }

    fn construction_failed(&self, key: &RuleKey, message: &str) {
        tracing::error!(prefix = %self.prefix, key = %key, error = message, "construction failed");
    }

    fn rule_replaced(&self, key: &RuleKey) {
        tracing::info!(prefix = %self.prefix, key = %key, "rule replaced");
    }

    fn registered(&self, declaring: TypeTag, modes: &[Mode]) {
        tracing::info!(prefix = %self.prefix, %declaring, ?modes, "registered");
    }
}

/// Observer that counts events.
#[derive(Debug, Default)]
pub struct MetricsObserver {
    resolutions: AtomicU64,
    total_resolution_nanos: AtomicU64,
    fallbacks: AtomicU64,
    failures: AtomicU64,
    replacements: AtomicU64,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful resolutions observed.
    pub fn resolution_count(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Resolutions served by `"default"` after the requested mode was missing.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Unresolved modes plus failed constructions.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn replacement_count(&self) -> u64 {
        self.replacements.load(Ordering::Relaxed)
    }

    pub fn total_resolution_time(&self) -> Duration {
        Duration::from_nanos(self.total_resolution_nanos.load(Ordering::Relaxed))
    }

    pub fn average_resolution_time(&self) -> Option<Duration> {
        let count = self.resolution_count();
        if count == 0 {
            return None;
        }
        let total_ns = self.total_resolution_nanos.load(Ordering::Relaxed);
        Some(Duration::from_nanos(total_ns / count))
    }

    /// Resets all counters.
    pub fn reset(&self) {
        self.resolutions.store(0, Ordering::Relaxed);
        self.total_resolution_nanos.store(0, Ordering::Relaxed);
        self.fallbacks.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.replacements.store(0, Ordering::Relaxed);
    }
}

impl InstantiatorObserver for MetricsObserver {
    fn resolving(&self, _key: &RuleKey) {}

    fn resolved(&self, _key: &RuleKey, _lifetime: Lifetime, duration: Duration) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        self.total_resolution_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    fn fell_back(&self, _declaring: TypeTag, _requested: &Mode) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    fn unresolved(&self, _declaring: TypeTag, _requested: &Mode) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn construction_failed(&self, _key: &RuleKey, _message: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn rule_replaced(&self, _key: &RuleKey) {
        self.replacements.fetch_add(1, Ordering::Relaxed);
    }
}
