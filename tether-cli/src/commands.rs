//! Subcommand execution

use std::io::Write;
use std::time::Duration;

use serde_json::{Map, Value};

use tether_client::{extract_task_id, ClientConfig, Session, SessionOptions};
use tether_utils::{Result, TetherError};

use crate::cli::{seconds, Args, Command};

/// Load the config file and overlay the command-line values
pub fn resolve_config(args: &Args) -> Result<ClientConfig> {
    let config = match &args.config {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };
    Ok(args.apply(config))
}

/// Connect, run one subcommand, then close
pub async fn run(args: Args) -> Result<()> {
    let config = resolve_config(&args)?;
    let session = Session::discover(SessionOptions::default().with_config(config)).await?;
    tracing::info!(endpoint = %session.descriptor().endpoint_url(), "Connected");

    let outcome = execute(&session, &args.command).await;
    session.close().await;
    outcome
}

async fn execute(session: &Session, command: &Command) -> Result<()> {
    match command {
        Command::Ping => print_pretty(session.ping().await?),
        Command::Status => print_pretty(session.status_get().await?),
        Command::Exec {
            baritone_command,
            wait,
        } => {
            let result = session.execute(baritone_command).await?;
            let task_id = if *wait {
                Some(require_task_id(baritone_command, &result)?)
            } else {
                None
            };
            print_pretty(result)?;
            if let Some(task_id) = task_id {
                let terminal = session.wait_for_task(&task_id, None, None).await?;
                print_line(&serde_json::to_value(&terminal).map_err(encode_error)?)?;
            }
            Ok(())
        }
        Command::Cancel { task_id } => print_pretty(session.cancel(task_id.as_deref()).await?),
        Command::Events { count } => stream_events(session, *count).await,
        Command::Wait { task_id, timeout } => {
            let terminal = session
                .wait_for_task(task_id, None, wait_timeout(*timeout))
                .await?;
            print_line(&serde_json::to_value(&terminal).map_err(encode_error)?)
        }
    }
}

/// Print events until `count` is reached, the bridge hangs up or Ctrl-C
async fn stream_events(session: &Session, count: Option<usize>) -> Result<()> {
    let mut seen = 0usize;
    loop {
        if count.is_some_and(|limit| seen >= limit) {
            return Ok(());
        }
        tokio::select! {
            event = session.next_event(None) => {
                let event = match event {
                    Ok(event) => event,
                    Err(e) if e.is_closed() => {
                        tracing::info!("Bridge closed the connection");
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                };
                print_line(&serde_json::to_value(&event).map_err(encode_error)?)?;
                seen += 1;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("Interrupted");
                return Ok(());
            }
        }
    }
}

/// Task id of an `exec --wait` dispatch
fn require_task_id(command: &str, result: &Map<String, Value>) -> Result<String> {
    extract_task_id(result).map(str::to_string).ok_or_else(|| {
        TetherError::bad_response(
            format!("No task_id returned for command: {}", command),
            Value::Object(result.clone()),
        )
    })
}

fn print_pretty(result: Map<String, Value>) -> Result<()> {
    let text = serde_json::to_string_pretty(&Value::Object(result)).map_err(encode_error)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", text)?;
    Ok(())
}

fn print_line(value: &Value) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", value)?;
    stdout.flush()?;
    Ok(())
}

fn encode_error(e: serde_json::Error) -> TetherError {
    TetherError::internal(format!("failed to encode output: {}", e))
}

/// Timeout of the `wait` subcommand, `None` meaning unbounded
pub fn wait_timeout(value: f64) -> Option<Duration> {
    Some(seconds(value)).filter(|t| !t.is_zero())
}
