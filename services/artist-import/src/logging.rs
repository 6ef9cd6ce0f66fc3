//!
//! src/logging.rs
//!
//! Initializes the logger so every import step, trace line and
//! collaborator failure shows up as a structured json event
//!

use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tracing_error::ErrorLayer;
use tracing_appender::non_blocking;

use crate::config::{LogFormat, LoggingConfig};

/// Keeps the non-blocking writer flushing until dropped. Events go to
/// stderr, stdout carries command output
pub struct LoggingGuard(tracing_appender::non_blocking::WorkerGuard);

pub fn init_logging(cfg: &LoggingConfig) ->
    Result<LoggingGuard, crate::errors::ImportError> {

    let (writer, guard) = non_blocking(std::io::stderr());
    let filter = std::env::var("RUST_LOG")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(cfg.filter_directives.clone()));

    let time = tracing_subscriber::fmt::time::UtcTime::rfc_3339();

    match cfg.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .with_writer(writer)
                .with_timer(time)
                .with_target(cfg.include_target)
                .with_file(cfg.include_file_line)
                .with_line_number(cfg.include_file_line)
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(ErrorLayer::default())
                .try_init()
                .map_err(|e| crate::errors::ImportError::Config(
                    format!("logging already initialized: {e}")
                ))?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .with_writer(writer)
                .with_timer(time)
                .with_ansi(cfg.with_ansi)
                .with_target(cfg.include_target)
                .with_file(cfg.include_file_line)
                .with_line_number(cfg.include_file_line)
                .pretty();

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(ErrorLayer::default())
                .try_init()
                .map_err(|e| crate::errors::ImportError::Config(
                    format!("logging already initialized: {e}")
                ))?;
        }
    }

    Ok( LoggingGuard(guard) )
}
