//! Logging bootstrap.
//!
//! The crate logs through the `log` facade; embedders that already install a
//! logger can ignore this module entirely. `init` wires up `env_logger` with
//! an `info` default and is safe to call more than once.

use std::sync::Once;

static INIT: Once = Once::new();

pub fn init() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .try_init();
    });
}
