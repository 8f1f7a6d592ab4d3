//! tether - command-line client for the bridge
//!
//! Connects to a running bridge, runs one subcommand and prints the result
//! as JSON.

use tether_utils::{init_logging_with_config, LogConfig, Result};

mod cli;
mod commands;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    init_logging_with_config(LogConfig::cli())?;
    tracing::debug!("CLI args: {:?}", args);

    match commands::run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!("tether error: {}", e);
            eprintln!("Error: {}", e);
            Err(e)
        }
    }
}
