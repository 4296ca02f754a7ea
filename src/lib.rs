//! # instantiator
//!
//! Mode-based object construction: a declaring type maps runtime-selectable
//! modes (`"default"`, `"test"`, `"staging"`, ...) to construction rules, and
//! instantiators resolve their mode to an instance at runtime.
//!
//! ## Features
//!
//! - **Mode selection**: Per-instantiator mode, captured from the context when omitted
//! - **Fallback**: Unregistered modes optionally resolve through `"default"`
//! - **Lifetimes**: Transient rules build per call, singletons once per `(type, mode)`
//! - **Exactly-once registration**: A declaring type's rules are registered on first use
//! - **Startup checks**: Validate and pre-warm every mode a deployment needs
//!
//! ## Quick Start
//!
//! ```rust
//! use instantiator::{Declaration, Instantiator, InstantiatorResult, Registrar};
//! use std::sync::Arc;
//!
//! trait Mailer: Send + Sync {
//!     fn send(&self, to: &str) -> String;
//! }
//!
//! struct Smtp;
//! impl Mailer for Smtp {
//!     fn send(&self, to: &str) -> String { format!("smtp -> {}", to) }
//! }
//!
//! struct Outbox;
//! impl Mailer for Outbox {
//!     fn send(&self, to: &str) -> String { format!("outbox -> {}", to) }
//! }
//!
//! struct MailerFactory;
//!
//! impl Declaration for MailerFactory {
//!     type Product = dyn Mailer;
//!     type Args = ();
//!
//!     fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
//!         registrar
//!             .instance("default", |_| Arc::new(Smtp) as Arc<dyn Mailer>)
//!             .singleton("test", |_| Arc::new(Outbox) as Arc<dyn Mailer>);
//!         Ok(())
//!     }
//! }
//!
//! let mailer = Instantiator::<MailerFactory>::with_mode("test").unwrap();
//! assert_eq!(mailer.get_instance(()).unwrap().send("ops"), "outbox -> ops");
//!
//! // "staging" has no rule of its own and falls back to "default".
//! let mailer = Instantiator::<MailerFactory>::with_mode("staging").unwrap();
//! assert_eq!(mailer.get_instance(()).unwrap().send("ops"), "smtp -> ops");
//! ```
//!
//! ## Lifetimes
//!
//! - **Transient**: Every resolution runs the rule and returns a new instance
//! - **Singleton**: The first resolution runs the rule; later ones return the
//!   cached instance and ignore their arguments
//!
//! ## Contexts
//!
//! Settings and registries live in a [`Context`]. The free functions in
//! [`global`] and the plain constructors of [`Instantiator`] use the
//! process-wide [`Context::global`]; isolated contexts keep tests and
//! subsystems apart.
//!
//! ```rust
//! use instantiator::{Context, Declaration, InstantiatorResult, ModeSettings, Registrar};
//! use std::sync::Arc;
//!
//! struct Region;
//! impl Declaration for Region {
//!     type Product = str;
//!     type Args = ();
//!     fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
//!         registrar.instance("default", |_| Arc::from("eu-west-1"));
//!         Ok(())
//!     }
//! }
//!
//! let context = Context::with_settings(ModeSettings::new("staging", false));
//! let region = context.instantiator::<Region>().unwrap();
//! assert!(region.get_instance(()).unwrap_err().is_mode_not_registered());
//! ```

pub mod config;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod global;
pub mod instantiator;
pub mod key;
pub mod lifetime;
pub mod mode;
pub mod observer;
pub mod prewarm;
pub mod registration;
pub mod registry;

pub use config::{ModeSettings, DEFAULT_ENV_PREFIX};
pub use context::Context;
pub use descriptors::RuleDescriptor;
pub use error::{BoxError, InstantiatorError, InstantiatorResult};
pub use global::{global_fallback, global_mode, global_settings, set_global_fallback, set_global_mode};
pub use instantiator::{Declaration, Instantiator, InstantiatorBuilder};
pub use key::{tag_of, RuleKey, TypeTag};
pub use lifetime::Lifetime;
pub use mode::Mode;
pub use observer::{InstantiatorObserver, LoggingObserver, MetricsObserver};
pub use prewarm::{CheckKind, ReadinessReport, ReadinessResult, StartupCheck};
pub use registration::{DeclaredRule, Registrar, Rule};
pub use registry::FactoryRegistry;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    trait Database: Send + Sync {
        fn id(&self) -> usize;
        fn kind(&self) -> &'static str;
    }

    struct DatabaseA(usize);
    impl Database for DatabaseA {
        fn id(&self) -> usize {
            self.0
        }
        fn kind(&self) -> &'static str {
            "a"
        }
    }

    struct DatabaseB(usize);
    impl Database for DatabaseB {
        fn id(&self) -> usize {
            self.0
        }
        fn kind(&self) -> &'static str {
            "b"
        }
    }

    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

    struct X;

    impl Declaration for X {
        type Product = dyn Database;
        type Args = ();

        fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
            registrar
                .instance("default", |_| {
                    Arc::new(DatabaseA(NEXT_ID.fetch_add(1, Ordering::SeqCst))) as Arc<dyn Database>
                })
                .singleton("test", |_| {
                    Arc::new(DatabaseB(NEXT_ID.fetch_add(1, Ordering::SeqCst))) as Arc<dyn Database>
                });
            Ok(())
        }
    }

    fn x(context: &Arc<Context>, mode: Option<&'static str>, fallback: Option<bool>) -> Instantiator<X> {
        let mut builder = Instantiator::<X>::builder().context(Arc::clone(context));
        if let Some(mode) = mode {
            builder = builder.mode(mode);
        }
        if let Some(fallback) = fallback {
            builder = builder.fallback(fallback);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_default_transient_builds_fresh_instances() {
        let context = Context::new();
        let x = x(&context, None, None);

        let first = x.get_instance(()).unwrap();
        let second = x.get_instance(()).unwrap();
        assert_eq!(first.kind(), "a");
        assert_eq!(second.kind(), "a");
        assert_ne!(first.id(), second.id());
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_test_mode_singleton_is_shared() {
        let context = Context::new();
        let first = x(&context, Some("test"), Some(true)).get_instance(()).unwrap();
        let second = x(&context, Some("test"), Some(true)).get_instance(()).unwrap();
        assert_eq!(first.kind(), "b");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unknown_mode_falls_back_to_default() {
        let context = Context::new();
        let staging = x(&context, Some("staging"), Some(true));
        assert_eq!(staging.get_instance(()).unwrap().kind(), "a");
        assert_eq!(staging.served_mode(), Some(Mode::DEFAULT));
    }

    #[test]
    fn test_unknown_mode_without_fallback_fails() {
        let context = Context::new();
        let staging = x(&context, Some("staging"), Some(false));

        match staging.get_instance(()) {
            Err(InstantiatorError::ModeNotRegistered(name, mode)) => {
                assert!(name.ends_with("X"));
                assert_eq!(mode, "staging");
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(db) => panic!("resolved to {} without a rule", db.kind()),
        }
    }
}
