#![no_main]

use instantiator::{Context, Declaration, Instantiator, InstantiatorResult, Lifetime, Mode, Registrar, Rule};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

struct Target;

impl Declaration for Target {
    type Product = u8;
    type Args = u8;

    fn register(registrar: &mut Registrar<Self>) -> InstantiatorResult<()> {
        registrar
            .instance("default", |n| Arc::new(n))
            .singleton("test", |n| Arc::new(n.wrapping_add(1)));
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let context = Context::new();
    let fallback = data[0] % 2 == 0;
    let overrides = data[0] % 4 >= 2;
    let mode = String::from_utf8_lossy(&data[2..]).into_owned();

    let instantiator = match Instantiator::<Target>::builder()
        .context(Arc::clone(&context))
        .mode(mode.clone())
        .fallback(fallback)
        .build()
    {
        Ok(instantiator) => instantiator,
        Err(_) => return,
    };

    if overrides {
        let registered = instantiator
            .registry()
            .register(mode.clone(), Rule::new(|n: u8| Arc::new(n ^ 0xff)), Lifetime::Transient);
        assert_eq!(registered.is_err(), mode.is_empty());
    }

    let requested = Mode::from(mode.clone());
    let expected = instantiator.registry().served_mode(&requested, fallback);

    match instantiator.get_instance(data[1]) {
        Ok(value) => {
            let served = expected.expect("resolution succeeded without a serving mode");
            if overrides && !mode.is_empty() {
                assert_eq!(served, requested);
                assert_eq!(*value, data[1] ^ 0xff);
            } else if served.is_default() {
                assert_eq!(*value, data[1]);
            }
        }
        Err(err) => {
            assert!(err.is_mode_not_registered());
            assert!(expected.is_none());
            // "default" is always registered, so only a disabled fallback can miss.
            assert!(!fallback);
        }
    }
});
