//! Logger bring-up for binaries embedding the engine.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the global logger once.
///
/// Respects `RUST_LOG`; defaults to info-level output otherwise. Repeated
/// calls are ignored. Intended usage is early in `main`.
pub fn init_logging() {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }
        builder.init();
        log::debug!("logging initialized");
    });
}
