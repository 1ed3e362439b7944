use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Filter directives are read from this variable first, then `RUST_LOG`.
pub const LOG_ENV: &str = "TEMPOCAST_LOG";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging() -> Result<(), SetGlobalDefaultError> {
    let formatting_layer = fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .compact();

    let subscriber = Registry::default().with(env_filter()).with(formatting_layer);

    tracing::subscriber::set_global_default(subscriber)
}
