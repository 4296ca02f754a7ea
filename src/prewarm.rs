//! Startup validation and pre-warming.
//!
//! Missing modes normally surface only when a resolution fails at runtime.
//! [`StartupCheck`] moves that failure to startup: given the modes a
//! deployment intends to use, it checks every declaring type registered in a
//! context under each of them, and can eagerly construct selected types so
//! their singletons are built before traffic arrives.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::Context;
use crate::error::{InstantiatorError, InstantiatorResult};
use crate::instantiator::{Declaration, Instantiator};
use crate::key::TypeTag;
use crate::mode::Mode;

type PrewarmFn = Box<dyn Fn(&Arc<Context>, &Mode, bool) -> InstantiatorResult<()> + Send + Sync>;

struct Prewarm {
    declaring: TypeTag,
    run: PrewarmFn,
}

/// Kind of check a [`ReadinessResult`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Rule lookup only; nothing constructed
    Lookup,
    /// Full resolution through the declaring type's rule
    Prewarm,
}

/// Outcome for one declaring type under one mode.
#[derive(Debug, Clone)]
pub struct ReadinessResult {
    pub declaring: TypeTag,
    /// The mode that was checked
    pub mode: Mode,
    pub kind: CheckKind,
    /// Mode whose rule serves the request, when one does
    pub served_by: Option<Mode>,
    pub error: Option<InstantiatorError>,
    pub duration: Duration,
}

impl ReadinessResult {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// True when the request is served by `"default"` instead of its own mode.
    pub fn fell_back(&self) -> bool {
        matches!(&self.served_by, Some(served) if *served != self.mode)
    }
}

/// Results of a [`StartupCheck`] run.
#[derive(Debug, Clone)]
pub struct ReadinessReport {
    results: Vec<ReadinessResult>,
    /// Wall time of the whole run
    pub total_duration: Duration,
}

impl ReadinessReport {
    pub fn all_ready(&self) -> bool {
        self.results.iter().all(ReadinessResult::success)
    }

    pub fn results(&self) -> &[ReadinessResult] {
        &self.results
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReadinessResult> {
        self.results.iter().filter(|r| !r.success())
    }

    /// The report when everything passed, otherwise the first failure.
    pub fn into_result(self) -> InstantiatorResult<Self> {
        match self.results.iter().find_map(|r| r.error.clone()) {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Startup validation over a context.
///
/// # Examples
///
/// ```
/// use instantiator::{Context, Declaration, InstantiatorResult, Registrar, StartupCheck};
/// use std::sync::Arc;
///
/// struct Mailer;
/// impl Declaration for Mailer {
///     type Product = String;
///     type Args = ();
///     fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
///         registrar.instance("test", |_| Arc::new("outbox".to_string()));
///         Ok(())
///     }
/// }
///
/// let context = Context::new();
/// let report = StartupCheck::new(&context)
///     .modes(["test", "production"])
///     .declare::<Mailer>()
///     .unwrap()
///     .run();
///
/// // "production" has no rule and no "default" to fall back to.
/// assert!(!report.all_ready());
/// assert_eq!(report.failures().count(), 1);
/// ```
pub struct StartupCheck {
    context: Arc<Context>,
    modes: Vec<Mode>,
    fallback: Option<bool>,
    prewarms: Vec<Prewarm>,
}

impl StartupCheck {
    pub fn new(context: &Arc<Context>) -> Self {
        Self {
            context: Arc::clone(context),
            modes: Vec::new(),
            fallback: None,
            prewarms: Vec::new(),
        }
    }

    /// Check over the global context.
    ///
    /// ```
    /// use instantiator::{global, Declaration, InstantiatorResult, Registrar, StartupCheck};
    /// use std::sync::Arc;
    ///
    /// struct Clock;
    /// impl Declaration for Clock {
    ///     type Product = u64;
    ///     type Args = ();
    ///     fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
    ///         registrar.instance("default", |_| Arc::new(0));
    ///         Ok(())
    ///     }
    /// }
    ///
    /// global::set_global_mode("test");
    /// let report = StartupCheck::global().declare::<Clock>().unwrap().run();
    ///
    /// assert!(report.all_ready());
    /// assert_eq!(report.results().len(), 1);
    /// assert_eq!(report.results()[0].mode, "test");
    /// ```
    pub fn global() -> Self {
        Self::new(Context::global())
    }

    /// Modes to check. Without any, the context's current mode is checked.
    pub fn modes<I, M>(mut self, modes: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Mode>,
    {
        for mode in modes {
            self = self.mode(mode);
        }
        self
    }

    pub fn mode(mut self, mode: impl Into<Mode>) -> Self {
        let mode = mode.into();
        if !self.modes.contains(&mode) {
            self.modes.push(mode);
        }
        self
    }

    /// Fallback flag to check with; defaults to the context's flag at run time.
    pub fn fallback(mut self, fallback: bool) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Runs `D`'s registration step so `D` is covered by the check.
    pub fn declare<D: Declaration>(self) -> InstantiatorResult<Self> {
        self.context.registry::<D>()?;
        Ok(self)
    }

    /// Eagerly resolves `D` under every checked mode with arguments from
    /// `args`. Singletons built here stay cached.
    pub fn prewarm<D, F>(mut self, args: F) -> Self
    where
        D: Declaration,
        F: Fn() -> D::Args + Send + Sync + 'static,
    {
        self.prewarms.push(Prewarm {
            declaring: TypeTag::of::<D>(),
            run: Box::new(move |context: &Arc<Context>, mode: &Mode, fallback: bool| {
                let instantiator = Instantiator::<D>::builder()
                    .context(Arc::clone(context))
                    .mode(mode.clone())
                    .fallback(fallback)
                    .build()?;
                instantiator.get_instance(args()).map(|_| ())
            }),
        });
        self
    }

    /// Runs all checks, one result per declaring type and mode.
    ///
    /// Prewarmed types are reported by their prewarm result only; every other
    /// registered type gets a lookup result.
    pub fn run(&self) -> ReadinessReport {
        let start = Instant::now();
        let fallback = self.fallback.unwrap_or_else(|| self.context.fallback());
        let modes = if self.modes.is_empty() {
            vec![self.context.mode()]
        } else {
            self.modes.clone()
        };

        let mut results = Vec::new();

        for prewarm in &self.prewarms {
            for mode in &modes {
                let check_start = Instant::now();
                let outcome = (prewarm.run)(&self.context, mode, fallback);
                let served_by = self
                    .context
                    .registries()
                    .into_iter()
                    .find(|registry| registry.tag() == prewarm.declaring)
                    .and_then(|registry| registry.served_mode(mode, fallback));
                results.push(ReadinessResult {
                    declaring: prewarm.declaring,
                    mode: mode.clone(),
                    kind: CheckKind::Prewarm,
                    served_by,
                    error: outcome.err(),
                    duration: check_start.elapsed(),
                });
            }
        }

        let mut registries = self.context.registries();
        // Prewarmed types already have a result per mode.
        registries.retain(|registry| {
            registry.is_registered()
                && !self.prewarms.iter().any(|p| p.declaring == registry.tag())
        });
        registries.sort_by_key(|registry| registry.tag().display_name());

        for registry in &registries {
            for mode in &modes {
                let check_start = Instant::now();
                let served_by = registry.served_mode(mode, fallback);
                let error = match served_by {
                    Some(_) => None,
                    None => Some(InstantiatorError::ModeNotRegistered(
                        registry.tag().display_name(),
                        mode.clone(),
                    )),
                };
                results.push(ReadinessResult {
                    declaring: registry.tag(),
                    mode: mode.clone(),
                    kind: CheckKind::Lookup,
                    served_by,
                    error,
                    duration: check_start.elapsed(),
                });
            }
        }

        let report = ReadinessReport {
            results,
            total_duration: start.elapsed(),
        };

        for failure in report.failures() {
            if let Some(err) = &failure.error {
                tracing::warn!(
                    declaring = %failure.declaring,
                    mode = %failure.mode,
                    kind = ?failure.kind,
                    error = %err,
                    "startup check failed"
                );
            }
        }
        tracing::info!(
            checks = report.results.len(),
            failures = report.failures().count(),
            duration = ?report.total_duration,
            "startup check finished"
        );

        report
    }
}

impl std::fmt::Debug for StartupCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartupCheck")
            .field("modes", &self.modes)
            .field("fallback", &self.fallback)
            .field("prewarms", &self.prewarms.len())
            .finish()
    }
}
