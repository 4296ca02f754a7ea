use instantiator::{
    Context, Declaration, Instantiator, InstantiatorError, InstantiatorResult, Lifetime, Mode,
    ModeSettings, Registrar, Rule,
};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

trait Database: Send + Sync {
    fn url(&self) -> &str;
    fn kind(&self) -> &'static str;
}

struct Postgres {
    url: String,
}

impl Database for Postgres {
    fn url(&self) -> &str {
        &self.url
    }
    fn kind(&self) -> &'static str {
        "postgres"
    }
}

struct InMemory {
    url: String,
}

impl Database for InMemory {
    fn url(&self) -> &str {
        &self.url
    }
    fn kind(&self) -> &'static str {
        "memory"
    }
}

struct DatabaseFactory;

impl Declaration for DatabaseFactory {
    type Product = dyn Database;
    type Args = String;

    fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
        registrar
            .instance("default", |url| Arc::new(Postgres { url }) as Arc<dyn Database>)
            .singleton("test", |url| Arc::new(InMemory { url }) as Arc<dyn Database>);
        Ok(())
    }
}

/// Typed accessor in the shape concrete instantiators take.
struct Databases(Instantiator<DatabaseFactory>);

impl Databases {
    fn new(context: &Arc<Context>, mode: Option<&'static str>, fallback: Option<bool>) -> Self {
        let mut builder = Instantiator::<DatabaseFactory>::builder().context(Arc::clone(context));
        if let Some(mode) = mode {
            builder = builder.mode(mode);
        }
        if let Some(fallback) = fallback {
            builder = builder.fallback(fallback);
        }
        Self(builder.build().unwrap())
    }

    fn database(&self, url: &str) -> InstantiatorResult<Arc<dyn Database>> {
        self.0.get_instance(url.to_string())
    }
}

#[test]
fn test_default_mode_builds_transient_instances() {
    let context = Context::new();
    let databases = Databases::new(&context, None, None);

    let a = databases.database("postgres://a").unwrap();
    let b = databases.database("postgres://a").unwrap();

    assert_eq!(a.kind(), "postgres");
    assert_eq!(b.kind(), "postgres");
    assert!(!Arc::ptr_eq(&a, &b)); // Fresh instance per call
}

#[test]
fn test_singleton_ignores_later_arguments() {
    let context = Context::new();
    let first = Databases::new(&context, Some("test"), Some(true));
    let second = Databases::new(&context, Some("test"), Some(false));

    let a = first.database("mem://one").unwrap();
    let b = first.database("mem://two").unwrap();
    let c = second.database("mem://three").unwrap();

    assert_eq!(a.kind(), "memory");
    assert_eq!(a.url(), "mem://one");
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c)); // Shared across instantiators
}

#[test]
fn test_fallback_serves_default_rule() {
    let context = Context::new();
    let staging = Databases::new(&context, Some("staging"), Some(true));

    let db = staging.database("postgres://staging").unwrap();
    assert_eq!(db.kind(), "postgres");
    assert_eq!(db.url(), "postgres://staging");
}

#[test]
fn test_no_fallback_reports_mode_not_registered() {
    let context = Context::new();
    let staging = Databases::new(&context, Some("staging"), Some(false));

    let err = match staging.database("postgres://staging") {
        Err(err) => err,
        Ok(db) => panic!("resolved to {} without a rule", db.kind()),
    };
    assert!(err.is_mode_not_registered());
    match err {
        InstantiatorError::ModeNotRegistered(name, mode) => {
            assert!(name.ends_with("DatabaseFactory"));
            assert_eq!(mode, "staging");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_default_without_fallback_still_resolves() {
    let context = Context::new();
    let databases = Databases::new(&context, Some("default"), Some(false));
    assert_eq!(databases.database("postgres://x").unwrap().kind(), "postgres");
}

#[test]
fn test_local_setters_do_not_touch_context() {
    let context = Context::new();
    let mut instantiator = context.instantiator::<DatabaseFactory>().unwrap();

    instantiator.set_mode("staging");
    instantiator.set_fallback(false);
    assert_eq!(instantiator.mode(), &Mode::from("staging"));
    assert!(!instantiator.fallback());
    assert_eq!(instantiator.served_mode(), None);

    assert_eq!(context.mode(), Mode::DEFAULT);
    assert!(context.fallback());

    instantiator.set_mode("test");
    assert_eq!(instantiator.served_mode(), Some(Mode::from("test")));
}

#[test]
fn test_construction_captures_context_settings() {
    let context = Context::with_settings(ModeSettings::new("test", false));
    let captured = context.instantiator::<DatabaseFactory>().unwrap();
    let explicit = Instantiator::<DatabaseFactory>::builder()
        .context(Arc::clone(&context))
        .mode("staging")
        .build()
        .unwrap();

    context.set_mode("default");
    context.set_fallback(true);

    assert_eq!(captured.mode().as_str(), "test");
    assert!(!captured.fallback());
    assert_eq!(captured.get_instance("mem://".into()).unwrap().kind(), "memory");

    // Explicit mode kept, fallback captured from the context at build time.
    assert_eq!(explicit.mode().as_str(), "staging");
    assert!(!explicit.fallback());
    assert!(explicit.get_instance("x".into()).is_err());

    let later = context.instantiator::<DatabaseFactory>().unwrap();
    assert_eq!(later.mode(), &Mode::DEFAULT);
    assert!(later.fallback());
}

static REGISTRATIONS: AtomicUsize = AtomicUsize::new(0);

struct CountedFactory;

impl Declaration for CountedFactory {
    type Product = usize;
    type Args = usize;

    fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
        REGISTRATIONS.fetch_add(1, Ordering::SeqCst);
        registrar
            .instance("default", |n| Arc::new(n))
            .singleton("test", |n| Arc::new(n * 2));
        Ok(())
    }
}

#[test]
fn test_registration_runs_once_per_context() {
    let context = Context::new();
    let before = REGISTRATIONS.load(Ordering::SeqCst);

    let first = context.instantiator::<CountedFactory>().unwrap();
    let mut test = first.clone();
    test.set_mode("test");
    let cached = test.get_instance(21).unwrap();

    for _ in 0..5 {
        let again = Instantiator::<CountedFactory>::builder()
            .context(Arc::clone(&context))
            .mode("test")
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(&cached, &again.get_instance(1).unwrap()));
    }

    assert_eq!(REGISTRATIONS.load(Ordering::SeqCst) - before, 1);
    assert_eq!(*cached, 42);
    assert!(first.registry().is_cached(&Mode::from("test")));
}

#[test]
fn test_isolated_contexts_do_not_share_singletons() {
    let left = Context::new();
    let right = Context::new();

    let a = Databases::new(&left, Some("test"), None).database("mem://left").unwrap();
    let b = Databases::new(&right, Some("test"), None).database("mem://right").unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a.url(), "mem://left");
    assert_eq!(b.url(), "mem://right");
}

static FLAKY_ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

struct FlakyRegistration;

impl Declaration for FlakyRegistration {
    type Product = str;
    type Args = ();

    fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
        registrar.instance("default", |_| Arc::from("ready"));
        if FLAKY_ATTEMPTS.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(InstantiatorError::Registration(Self::name(), "secrets unavailable".into()));
        }
        Ok(())
    }
}

#[test]
fn test_failed_registration_propagates_and_retries() {
    let context = Context::new();

    let err = context.instantiator::<FlakyRegistration>().unwrap_err();
    match err {
        InstantiatorError::Registration(_, msg) => assert_eq!(msg, "secrets unavailable"),
        other => panic!("unexpected error: {}", other),
    }
    assert!(context.descriptors().is_empty());

    let instantiator = context.instantiator::<FlakyRegistration>().unwrap();
    assert_eq!(&*instantiator.get_instance(()).unwrap(), "ready");
    assert_eq!(FLAKY_ATTEMPTS.load(Ordering::SeqCst), 2);
}

#[derive(Debug)]
struct PoolError(u32);

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool size {} out of range", self.0)
    }
}

impl std::error::Error for PoolError {}

struct PoolFactory;

impl Declaration for PoolFactory {
    type Product = Vec<u32>;
    type Args = u32;

    fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
        let checked: Rule<Vec<u32>, u32> = Rule::fallible(|size: u32| {
            if size == 0 {
                return Err(PoolError(size));
            }
            Ok(Arc::new((0..size).collect()))
        });
        registrar.singleton_map([("default", checked)]);
        Ok(())
    }
}

#[test]
fn test_rule_error_is_kept_as_source() {
    use std::error::Error;

    let context = Context::new();
    let pools = context.instantiator::<PoolFactory>().unwrap();

    let err = pools.get_instance(0).unwrap_err();
    assert!(matches!(err, InstantiatorError::Construction(_, ref mode, _) if mode.is_default()));
    let source = err.source().unwrap();
    assert_eq!(source.to_string(), "pool size 0 out of range");
    assert!(source.downcast_ref::<PoolError>().is_some());

    // A failed singleton construction caches nothing.
    assert!(!pools.registry().is_cached(&Mode::DEFAULT));
    let pool = pools.get_instance(3).unwrap();
    assert_eq!(*pool, vec![0, 1, 2]);
    assert!(Arc::ptr_eq(&pool, &pools.get_instance(0).unwrap()));
}

struct DuplicateModes;

impl Declaration for DuplicateModes {
    type Product = &'static str;
    type Args = ();

    fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
        registrar
            .singleton("default", |_| Arc::new("first"))
            .instance("default", |_| Arc::new("second"));
        Ok(())
    }
}

#[test]
fn test_duplicate_mode_last_write_wins() {
    let context = Context::new();
    let instantiator = context.instantiator::<DuplicateModes>().unwrap();

    assert_eq!(*instantiator.get_instance(()).unwrap(), "second");
    assert_eq!(
        instantiator.registry().lifetime_of(&Mode::DEFAULT),
        Some(Lifetime::Transient)
    );
    assert_eq!(instantiator.registry().modes(), vec![Mode::DEFAULT]);
}

#[test]
fn test_override_after_registration_drops_cached_singleton() {
    let context = Context::new();
    let test = Databases::new(&context, Some("test"), Some(true));
    let stale = test.database("mem://old").unwrap();

    test.0
        .registry()
        .register(
            "test",
            Rule::new(|url: String| Arc::new(Postgres { url }) as Arc<dyn Database>),
            Lifetime::Singleton,
        )
        .unwrap();

    let fresh = test.database("postgres://new").unwrap();
    assert_eq!(fresh.kind(), "postgres");
    assert!(!Arc::ptr_eq(&stale, &fresh));
    // Unaffected modes keep working as before.
    assert_eq!(Databases::new(&context, None, None).database("p://").unwrap().kind(), "postgres");
}

struct EmptyModeDeclaration;

impl Declaration for EmptyModeDeclaration {
    type Product = u8;
    type Args = ();

    fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
        registrar.instance("", |_| Arc::new(0)).instance("default", |_| Arc::new(1));
        Ok(())
    }
}

#[test]
fn test_empty_mode_fails_registration() {
    let context = Context::new();
    let err = context.instantiator::<EmptyModeDeclaration>().unwrap_err();
    assert!(matches!(err, InstantiatorError::EmptyMode(name) if name.ends_with("EmptyModeDeclaration")));
    assert!(context.declared_types().is_empty());
}

struct Settings;

impl Declaration for Settings {
    type Product = String;
    type Args = ();

    fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
        registrar
            .instance("default", |_| Arc::new("prod.toml".to_string()))
            .instance("test", |_| Arc::new("test.toml".to_string()));
        Ok(())
    }
}

struct Service;

impl Declaration for Service {
    type Product = String;
    type Args = Arc<Context>;

    fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
        registrar.instance_map(
            ["default", "test"].into_iter().map(|mode| {
                let rule = Rule::fallible(move |context: Arc<Context>| -> InstantiatorResult<Arc<String>> {
                    let settings = Instantiator::<Settings>::builder()
                        .context(context)
                        .mode(mode)
                        .build()?
                        .get_instance(())?;
                    Ok(Arc::new(format!("service({})", settings)))
                });
                (mode, rule)
            }),
        );
        Ok(())
    }
}

#[test]
fn test_rules_may_resolve_other_declaring_types() {
    let context = Context::new();
    let services = Instantiator::<Service>::builder()
        .context(Arc::clone(&context))
        .mode("test")
        .build()
        .unwrap();

    assert_eq!(*services.get_instance(Arc::clone(&context)).unwrap(), "service(test.toml)");
    assert_eq!(context.declared_types().len(), 2);
}
