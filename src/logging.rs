use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

use crate::config::{LogFormat, LoggingConfig};

/// Crates that are noisy at `info` and below: sqlx logs every statement.
const QUIET_TARGETS: &[&str] = &["sqlx=warn", "hyper=warn"];

/// Filter used when `RUST_LOG` is not set.
pub fn default_directives(level: &str) -> String {
    let mut directives = vec![level.to_string(), "tower_http=debug".to_string()];
    directives.extend(QUIET_TARGETS.iter().map(|d| d.to_string()));
    directives.join(",")
}

/// Install the global subscriber once per process.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.level)));

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()?,
        LogFormat::Pretty => registry.with(fmt::layer().compact()).try_init()?,
    }

    tracing::debug!(level = %config.level, format = ?config.format, "Logging ready");
    Ok(())
}
