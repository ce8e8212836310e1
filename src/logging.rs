//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to both console and files
//! for debugging boundary captures, module loads and preload activity.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let log_dir = PathBuf::from("log");
        if let Err(e) = fs::create_dir_all(&log_dir) {
            // Console-only logging is still useful when the directory can't be created
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(&log_level))
                .try_init();
            tracing::warn!(error = %e, "Log directory unavailable, file logging disabled");
            return;
        }

        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_filename = format!("{environment}.{pid}.{timestamp}.log");
        let log_path = log_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&log_dir, log_filename);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(true)
                    .with_filter(EnvFilter::new(&log_level)),
            )
            .with(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(&log_level)),
            );

        // A host application may already own the global subscriber
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_path.display(),
            "Structured logging initialized"
        );

        // The writer must outlive every span, so the guard is never dropped
        std::mem::forget(guard);
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("RESILIENCE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for failure boundary operations
pub fn log_boundary_operation(
    operation: &str,
    boundary: &str,
    failure_id: Option<&str>,
    retry_count: u32,
    status: &str,
) {
    tracing::info!(
        operation = %operation,
        boundary = %boundary,
        failure_id = failure_id,
        retry_count = retry_count,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "BOUNDARY_OPERATION"
    );
}

/// Log structured data for module loader operations
pub fn log_module_operation(operation: &str, module_id: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        module_id = %module_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "MODULE_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
