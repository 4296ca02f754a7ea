//! Construction rules and the registrar handed to registration steps.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{BoxError, InstantiatorError, InstantiatorResult};
use crate::instantiator::Declaration;
use crate::key::TypeTag;
use crate::lifetime::Lifetime;
use crate::mode::Mode;

type BuildFn<P, A> = dyn Fn(A) -> Result<Arc<P>, BoxError> + Send + Sync;

/// A construction rule: turns the declaring type's arguments into an instance
/// of its product.
///
/// Rules are cheap to clone and can be collected into `mode -> rule` maps for
/// [`Registrar::instance_map`] and [`Registrar::singleton_map`].
///
/// # Examples
///
/// ```rust
/// use instantiator::Rule;
/// use std::sync::Arc;
///
/// let plain: Rule<String, u32> = Rule::new(|n| Arc::new(format!("conn-{}", n)));
///
/// let checked: Rule<String, u32> = Rule::fallible(|n| {
///     if n == 0 {
///         return Err("pool size must be positive");
///     }
///     Ok(Arc::new(format!("pool-{}", n)))
/// });
/// # let _ = (plain, checked);
/// ```
pub struct Rule<P: ?Sized, A> {
    build: Arc<BuildFn<P, A>>,
}

impl<P: ?Sized + 'static, A: 'static> Rule<P, A> {
    /// Wraps an infallible construction closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(A) -> Arc<P> + Send + Sync + 'static,
    {
        Self {
            build: Arc::new(move |args: A| -> Result<Arc<P>, BoxError> { Ok(f(args)) }),
        }
    }

    /// Wraps a closure whose error is surfaced as the source of
    /// [`InstantiatorError::Construction`].
    ///
    /// The closure's error is kept as is: reach it through
    /// [`std::error::Error::source`] and `downcast_ref::<E>()`.
    pub fn fallible<F, E>(f: F) -> Self
    where
        F: Fn(A) -> Result<Arc<P>, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self {
            build: Arc::new(move |args: A| -> Result<Arc<P>, BoxError> {
                f(args).map_err(Into::into)
            }),
        }
    }

    #[inline]
    pub(crate) fn build(&self, args: A) -> Result<Arc<P>, BoxError> {
        (self.build)(args)
    }
}

impl<P: ?Sized, A> Clone for Rule<P, A> {
    fn clone(&self) -> Self {
        Self {
            build: Arc::clone(&self.build),
        }
    }
}

impl<P: ?Sized, A> fmt::Debug for Rule<P, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("product", &std::any::type_name::<P>())
            .finish()
    }
}

/// Rule type for a declaring type `D`.
pub type DeclaredRule<D> = Rule<<D as Declaration>::Product, <D as Declaration>::Args>;

pub(crate) struct StagedRule<D: Declaration> {
    pub(crate) mode: Mode,
    pub(crate) rule: DeclaredRule<D>,
    pub(crate) lifetime: Lifetime,
}

/// Collects the rules a declaring type supports.
///
/// A `Registrar` only exists while [`Declaration::register`] runs. Rules are
/// staged and committed to the declaring type's registry together once the
/// step returns `Ok`; a failing step commits nothing.
///
/// Registering the same mode twice keeps the last rule.
pub struct Registrar<D: Declaration> {
    declaring: TypeTag,
    staged: Vec<StagedRule<D>>,
    error: Option<InstantiatorError>,
    _declaring: PhantomData<fn() -> D>,
}

impl<D: Declaration> Registrar<D> {
    pub(crate) fn new() -> Self {
        Self {
            declaring: TypeTag::of::<D>(),
            staged: Vec::new(),
            error: None,
            _declaring: PhantomData,
        }
    }

    /// The declaring type being registered.
    pub fn declaring(&self) -> TypeTag {
        self.declaring
    }

    /// Registers a transient rule: every resolution builds a new instance.
    pub fn instance<M, F>(&mut self, mode: M, f: F) -> &mut Self
    where
        M: Into<Mode>,
        F: Fn(D::Args) -> Arc<D::Product> + Send + Sync + 'static,
    {
        self.stage(mode.into(), Rule::new(f), Lifetime::Transient)
    }

    /// Registers a singleton rule: built on first resolution, then reused.
    pub fn singleton<M, F>(&mut self, mode: M, f: F) -> &mut Self
    where
        M: Into<Mode>,
        F: Fn(D::Args) -> Arc<D::Product> + Send + Sync + 'static,
    {
        self.stage(mode.into(), Rule::new(f), Lifetime::Singleton)
    }

    /// Bulk-registers every `mode -> rule` entry as transient.
    pub fn instance_map<I, M>(&mut self, rules: I) -> &mut Self
    where
        I: IntoIterator<Item = (M, DeclaredRule<D>)>,
        M: Into<Mode>,
    {
        for (mode, rule) in rules {
            self.stage(mode.into(), rule, Lifetime::Transient);
        }
        self
    }

    /// Bulk-registers every `mode -> rule` entry as singleton.
    pub fn singleton_map<I, M>(&mut self, rules: I) -> &mut Self
    where
        I: IntoIterator<Item = (M, DeclaredRule<D>)>,
        M: Into<Mode>,
    {
        for (mode, rule) in rules {
            self.stage(mode.into(), rule, Lifetime::Singleton);
        }
        self
    }

    /// Modes staged so far, in registration order (duplicates included).
    pub fn staged_modes(&self) -> Vec<Mode> {
        self.staged.iter().map(|s| s.mode.clone()).collect()
    }

    fn stage(&mut self, mode: Mode, rule: DeclaredRule<D>, lifetime: Lifetime) -> &mut Self {
        if mode.is_empty() {
            if self.error.is_none() {
                self.error = Some(InstantiatorError::EmptyMode(self.declaring.display_name()));
            }
            return self;
        }
        self.staged.push(StagedRule { mode, rule, lifetime });
        self
    }

    /// Staged rules, or the first staging error.
    pub(crate) fn finish(self) -> InstantiatorResult<Vec<StagedRule<D>>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.staged),
        }
    }
}

impl<D: Declaration> fmt::Debug for Registrar<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registrar")
            .field("declaring", &self.declaring)
            .field("staged", &self.staged_modes())
            .finish()
    }
}
