//! Structured logging setup for the kernel engine.
//!
//! Centralized `tracing` configuration; kernels emit `debug!`/`warn!` events
//! at dispatch and validation points and rely on the host application to
//! install a subscriber, typically through [`init_logging`].

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset (e.g. `"info"`).
    pub default_filter: String,
    /// Include worker thread names in events.
    pub with_thread_names: bool,
    /// Emit JSON instead of human-readable lines.
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            with_thread_names: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Set the fallback filter directive.
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    /// Include worker thread names in events. Useful when diagnosing
    /// parallel shard failures.
    pub fn with_thread_names(mut self, enable: bool) -> Self {
        self.with_thread_names = enable;
        self
    }

    /// Emit JSON lines for log aggregation.
    pub fn with_json_format(mut self, enable: bool) -> Self {
        self.json_format = enable;
        self
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured default filter. Call once at startup.
pub fn init_logging(config: LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_thread_names(config.with_thread_names);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    } else {
        let fmt_layer = fmt::layer().with_thread_names(config.with_thread_names);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }
}

/// Install the global tracing subscriber with default settings.
pub fn init_default_logging() {
    init_logging(LoggingConfig::default());
}
