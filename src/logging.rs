//! Tracing subscriber setup for the console binary.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global subscriber at `INFO` unless `RUST_LOG` says otherwise.
pub fn init() {
    init_with_level(Level::INFO);
}

/// Installs the global subscriber with `level` as the default for this crate.
///
/// Directives from `RUST_LOG` are honoured on top. Calling this more than once
/// is harmless; only the first call takes effect.
pub fn init_with_level(level: Level) {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("fcm_admin_console={}", level).parse() {
        filter = filter.add_directive(directive);
    }
    if let Ok(directive) = format!("tower_http={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    let result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_line_number(true))
        .with(filter)
        .try_init();

    if result.is_ok() {
        tracing::info!(%level, "logging initialized");
    }
}
