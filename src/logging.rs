//! # Structured Logging Module
//!
//! Environment-aware structured logging for the bridge. Host bindings that
//! already installed a global subscriber keep theirs; initialization then
//! becomes a no-op.

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::BridgeConfig;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging(config: &BridgeConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = config
            .log_level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment));

        // JSON in production, human-readable elsewhere.
        let json = environment == "production";
        let subscriber = tracing_subscriber::registry()
            .with((!json).then(|| {
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_level(true)
                    .with_filter(EnvFilter::new(log_level.clone()))
            }))
            .with(json.then(|| {
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(log_level.clone()))
            }));

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            log_level = %log_level,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
pub fn get_environment() -> String {
    std::env::var("RUNTIME_BRIDGE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
pub fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for session-level bridge operations
pub fn log_bridge_operation(
    operation: &str,
    handler_id: Option<i64>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        handler_id = handler_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "BRIDGE_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("staging"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = BridgeConfig::default();
        init_structured_logging(&config);
        init_structured_logging(&config);
        log_bridge_operation("test", Some(1), "ok", None);
    }
}
