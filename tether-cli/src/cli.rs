//! Command-line argument parsing for the tether client
//!
//! Uses clap for argument parsing with derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use tether_client::ClientConfig;

/// tether - talk to a running bridge from the shell
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Bridge host
    #[arg(long, env = "TETHER_HOST")]
    pub host: Option<String>,

    /// Bridge port
    #[arg(long, env = "TETHER_PORT")]
    pub port: Option<u16>,

    /// Authentication token
    #[arg(long, env = "TETHER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to a bridge-info JSON file
    #[arg(long, env = "TETHER_BRIDGE_INFO")]
    pub bridge_info: Option<PathBuf>,

    /// Request timeout in seconds (defaults to the config value)
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Config file (defaults to the XDG config location)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Check that the bridge answers
    Ping,
    /// Print the full bridge status
    Status,
    /// Execute a raw command line
    Exec {
        /// Command text, e.g. "goto 100 70 100"
        baritone_command: String,
        /// Wait for the started task to finish
        #[arg(long, default_value_t = false)]
        wait: bool,
    },
    /// Cancel the active task, or a specific one
    Cancel {
        #[arg(long)]
        task_id: Option<String>,
    },
    /// Stream pushed events as JSON lines
    Events {
        /// Stop after this many events
        #[arg(long)]
        count: Option<usize>,
    },
    /// Wait for a task to reach a terminal event
    Wait {
        task_id: String,
        /// Give up after this many seconds (0 waits indefinitely)
        #[arg(long, default_value_t = 0.0)]
        timeout: f64,
    },
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Explicit request timeout, if a positive one was given
    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout.map(seconds).filter(|timeout| !timeout.is_zero())
    }

    /// Overlay the command-line values onto a loaded config
    pub fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(host) = &self.host {
            config.connection.host = Some(host.clone());
        }
        if let Some(port) = self.port {
            config.connection.port = Some(port);
        }
        if let Some(token) = &self.token {
            config.connection.token = Some(token.clone());
        }
        if let Some(path) = &self.bridge_info {
            config.connection.bridge_info = Some(path.clone());
        }
        match self.request_timeout() {
            Some(timeout) => config.with_request_timeout(timeout),
            None => config,
        }
    }
}

/// Seconds as a duration; negative or NaN values are zero, huge ones saturate
pub fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}
