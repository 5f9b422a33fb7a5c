//! Observability infrastructure for Estate.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors shared by all Estate
//! components.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `estate_deploy=debug`)
///
/// # Example
///
/// ```rust
/// use estate_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for store operations with standard fields.
#[must_use]
pub fn store_span(operation: &str, table: &str, account: &str) -> Span {
    tracing::info_span!(
        "store",
        op = operation,
        table = table,
        account = account,
    )
}

/// Creates a span for deployment operations.
#[must_use]
pub fn deploy_span(operation: &str, deployment_id: &str, environment: &str) -> Span {
    tracing::info_span!(
        "deploy",
        op = operation,
        deployment_id = deployment_id,
        environment = environment,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Pretty);
    }

    #[test]
    fn span_helpers_create_spans() {
        let span = store_span("scan", "DeploymentHistory", "123456789012");
        let _guard = span.enter();
        tracing::info!("test message in span");

        let span = deploy_span("accept", "d-1", "pr1");
        let _guard = span.enter();
    }
}
