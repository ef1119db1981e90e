use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging for the bot.
///
/// Default level is `info`, or `warn` when `quiet` is set. `RUST_LOG`
/// overrides either.
pub fn init(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
