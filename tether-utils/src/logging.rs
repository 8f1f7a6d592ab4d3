//! Logging infrastructure for tether
//!
//! Provides logging setup using the tracing ecosystem. Library code never
//! installs a global subscriber: sessions accept a [`tracing::Dispatch`]
//! built with [`build_dispatch`] and run their background tasks under it.
//! Only binaries call [`init_logging`].

use std::sync::Mutex;

use tracing::Dispatch;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    EnvFilter,
};

use crate::{paths, Result, TetherError};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "TETHER_LOG";

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr
    Stderr,
    /// Log to file under the state directory
    File,
    /// Log to both stderr and file
    Both,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output destination
    pub output: LogOutput,
    /// Log level filter (e.g., "info", "debug", "tether_client=debug,tokio=warn")
    pub filter: String,
    /// Include span events (enter/exit)
    pub span_events: bool,
    /// Include file/line in logs
    pub file_line: bool,
    /// Optional custom log file name (defaults to "tether.log")
    pub file_name: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
            span_events: false,
            file_line: false,
            file_name: None,
        }
    }
}

impl LogConfig {
    /// Config for library sessions embedded in a host program
    pub fn client() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".into()),
            span_events: false,
            file_line: false,
            file_name: None,
        }
    }

    /// Config for the command-line tool
    pub fn cli() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "tether_cli=info,warn".into()),
            span_events: false,
            file_line: false,
            file_name: None,
        }
    }

    /// Config for long-running scripts that want a log file
    pub fn file() -> Self {
        Self {
            output: LogOutput::File,
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "info".into()),
            span_events: true,
            file_line: true,
            file_name: None,
        }
    }

    /// Create config for development (verbose stderr)
    pub fn development() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "debug".into(),
            span_events: true,
            file_line: true,
            file_name: None,
        }
    }
}

/// Build a dispatcher for the given configuration without installing it
pub fn build_dispatch(config: &LogConfig) -> Result<Dispatch> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| TetherError::config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let fmt_layer = if config.span_events {
        fmt_layer.with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    } else {
        fmt_layer
    };

    let fmt_layer = if config.file_line {
        fmt_layer.with_file(true).with_line_number(true)
    } else {
        fmt_layer.with_file(false).with_line_number(false)
    };

    let dispatch = match config.output {
        LogOutput::Stderr => Dispatch::new(
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr)),
        ),
        LogOutput::File => {
            let file = open_log_file(config)?;
            Dispatch::new(
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.with_writer(Mutex::new(file)).with_ansi(false)),
            )
        }
        LogOutput::Both => {
            let file = open_log_file(config)?;
            let file_layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true);

            Dispatch::new(
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.with_writer(std::io::stderr))
                    .with(file_layer),
            )
        }
    };

    Ok(dispatch)
}

/// Initialize process-wide logging with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize process-wide logging with custom configuration
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let dispatch = build_dispatch(&config)?;
    tracing::dispatcher::set_global_default(dispatch)
        .map_err(|e| TetherError::internal(format!("Failed to init logging: {}", e)))
}

fn open_log_file(config: &LogConfig) -> Result<std::fs::File> {
    let log_dir = paths::log_dir();
    std::fs::create_dir_all(&log_dir).map_err(|e| TetherError::FileWrite {
        path: log_dir.clone(),
        source: e,
    })?;

    let log_path = log_dir.join(config.file_name.as_deref().unwrap_or("tether.log"));
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| TetherError::FileWrite {
            path: log_path,
            source: e,
        })
}
