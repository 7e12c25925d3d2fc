//! Logger setup for native and browser builds.

use crate::config::LogLevel;

/// Initialise the global logger.
///
/// Native builds log through `env_logger`; `RUST_LOG` overrides `level`.
/// Browser builds log to the developer console and report panics there.
/// Calling this more than once is harmless.
#[cfg(not(target_arch = "wasm32"))]
pub fn init(level: LogLevel) {
    let result = env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
    if result.is_err() {
        log::debug!("Logger already initialised");
    }
}

#[cfg(target_arch = "wasm32")]
pub fn init(level: LogLevel) {
    console_error_panic_hook::set_once();
    let level = level.to_level_filter().to_level().unwrap_or(log::Level::Error);
    if console_log::init_with_level(level).is_err() {
        log::debug!("Logger already initialised");
    }
}
