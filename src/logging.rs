//! 日志初始化：控制台与文件两路输出，各自独立的级别过滤。
//!
//! Logging setup and small helpers for request/response summaries.
//!
//! [`init`] installs the global `tracing` subscriber once at process start.
//! Components that report soft failures take an explicit [`tracing::Span`]
//! from their caller instead of reaching for a shared logger.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing::{debug, enabled, info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::registry::ModelFamily;
use crate::{Error, ErrorContext, Result};

/// Default cut-off for payload dumps.
pub const MAX_LOGGED_PAYLOAD: usize = 500;

/// Install console (and optional file) output.
///
/// `RUST_LOG`, when set, replaces the configured console filter.
pub fn init(cfg: &LoggingConfig) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cfg.effective_console_level()))
        .map_err(|e| filter_error("logging.console_level", e))?;
    let console = fmt::layer().with_target(false).with_filter(console_filter);

    let file_layer = match &cfg.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let filter = EnvFilter::try_new(cfg.effective_file_level())
                .map_err(|e| filter_error("logging.file_level", e))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to install logger: {}", e),
                ErrorContext::new().with_source("logging"),
            )
        })?;

    info!(
        console = cfg.effective_console_level(),
        file = cfg.file.as_deref().unwrap_or("-"),
        verbose = cfg.verbose,
        "Logging initialized"
    );
    Ok(())
}

fn filter_error(field: &str, e: impl std::fmt::Display) -> Error {
    Error::configuration_with_context(
        format!("Invalid log filter: {}", e),
        ErrorContext::new().with_field_path(field).with_source("logging"),
    )
}

/// Cut `text` to at most `max` characters, marking the cut.
pub fn truncate_for_log(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((idx, _)) => format!("{}... (truncated)", &text[..idx]),
    }
}

/// Dump a payload at debug level only, truncated.
pub fn log_payload(label: &str, data: &impl std::fmt::Display) {
    if enabled!(Level::DEBUG) {
        debug!("{}: {}", label, truncate_for_log(&data.to_string(), MAX_LOGGED_PAYLOAD));
    }
}

pub fn log_request_summary(endpoint: &str, model: &str, has_tools: bool) {
    let tools_info = if has_tools { " (with tools)" } else { "" };
    info!("Request: {} - Model: {}{}", endpoint, model, tools_info);
}

pub fn log_response_summary(status: &str, model: &str, finish_reason: Option<&str>) {
    match finish_reason {
        Some(reason) => info!("Response: {} - Model: {} - {}", status, model, reason),
        None => info!("Response: {} - Model: {}", status, model),
    }
}

pub fn log_tool_processing(family: ModelFamily, tool_count: usize, native: bool) {
    let approach = if native { "native" } else { "prompt-based" };
    info!(
        "Processing {} tools for {} model using {} approach",
        tool_count, family, approach
    );
}
