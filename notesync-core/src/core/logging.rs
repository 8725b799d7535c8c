//! Log backend setup.
//!
//! The library logs through the `log` facade only. Hosts that want output can
//! call [`init_logging`] once at startup; `RUST_LOG` overrides the default
//! `info` filter.

use env_logger::{Builder, Env};

/// Installs `env_logger` as the global logger.
///
/// Calling it again is harmless, which lets every test call it.
pub fn init_logging() {
    let result = Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
    if result.is_ok() {
        log::debug!("logging initialised");
    }
}
