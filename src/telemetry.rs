use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the fmt tracing subscriber (if one is not already active).
///
/// `RUST_LOG` wins when present. Otherwise the level is `debug` with `debug`
/// set and `info` without it; debug mode also prints source file and line.
/// Calling this function multiple times is harmless.
pub fn init_tracing(debug: bool) {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let fallback = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .with_file(debug)
        .with_line_number(debug)
        .try_init();

    let _ = TRACING_INIT.set(());
}
