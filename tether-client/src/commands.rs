//! Command text building and dispatch
//!
//! Commands are plain text lines (`goto 100 70 100`) executed by the
//! counterpart through `baritone.execute`. The catalog below only knows verb
//! names and aliases; argument grammar is the counterpart's business.

use std::fmt;
use std::time::Duration;

use serde_json::{Map, Value};

use tether_protocol::EventEnvelope;
use tether_utils::{Result, TetherError};

use crate::connection::Session;

/// One positional argument of a command line
#[derive(Debug, Clone, PartialEq)]
pub enum CommandArg {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for CommandArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandArg::Bool(true) => f.write_str("true"),
            CommandArg::Bool(false) => f.write_str("false"),
            CommandArg::Int(n) => write!(f, "{}", n),
            CommandArg::Float(n) => f.write_str(&format_float(*n)),
            CommandArg::Text(text) => f.write_str(&quote_if_needed(text)),
        }
    }
}

/// Shortest round-trip text of a float, the way the bridge's command parser
/// expects it: `2.0`, `0.0001`, `1e+16`, `1e-07`, `nan`, `-inf`
fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if !(-4..16).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
    }

    let fixed = value.to_string();
    if fixed.contains('.') {
        fixed
    } else {
        fixed + ".0"
    }
}

impl From<bool> for CommandArg {
    fn from(value: bool) -> Self {
        CommandArg::Bool(value)
    }
}

impl From<i32> for CommandArg {
    fn from(value: i32) -> Self {
        CommandArg::Int(value.into())
    }
}

impl From<i64> for CommandArg {
    fn from(value: i64) -> Self {
        CommandArg::Int(value)
    }
}

impl From<u32> for CommandArg {
    fn from(value: u32) -> Self {
        CommandArg::Int(value.into())
    }
}

impl From<f64> for CommandArg {
    fn from(value: f64) -> Self {
        CommandArg::Float(value)
    }
}

impl From<&str> for CommandArg {
    fn from(value: &str) -> Self {
        CommandArg::Text(value.to_string())
    }
}

impl From<String> for CommandArg {
    fn from(value: String) -> Self {
        CommandArg::Text(value)
    }
}

impl From<&String> for CommandArg {
    fn from(value: &String) -> Self {
        CommandArg::Text(value.clone())
    }
}

/// Quote `text` when it is empty or contains whitespace
pub fn quote_if_needed(text: &str) -> String {
    if text.is_empty() {
        return "\"\"".to_string();
    }
    if text.chars().any(char::is_whitespace) {
        let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
        return format!("\"{}\"", escaped);
    }
    text.to_string()
}

/// Join a verb and its arguments into one command line
pub fn build_command_text(verb: &str, args: &[CommandArg]) -> String {
    let mut text = verb.to_string();
    for arg in args {
        text.push(' ');
        text.push_str(&arg.to_string());
    }
    text.trim().to_string()
}

/// `result.task.task_id`, when it is a non-empty string
pub fn extract_task_id(raw: &Map<String, Value>) -> Option<&str> {
    raw.get("task")
        .and_then(Value::as_object)
        .and_then(|task| task.get("task_id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Outcome of a `baritone.execute` dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDispatchResult {
    /// Full result mapping returned by the counterpart
    pub raw: Map<String, Value>,
    /// Exact text that was sent
    pub command_text: String,
    pub task_id: Option<String>,
    /// `result.accepted`, only when the counterpart sent a boolean
    pub accepted: Option<bool>,
}

impl CommandDispatchResult {
    pub fn new(command_text: impl Into<String>, raw: Map<String, Value>) -> Self {
        let task_id = extract_task_id(&raw).map(str::to_string);
        let accepted = raw.get("accepted").and_then(Value::as_bool);
        Self {
            raw,
            command_text: command_text.into(),
            task_id,
            accepted,
        }
    }
}

impl Session {
    /// Build a command line from `verb` and `args` and execute it
    pub async fn dispatch(&self, verb: &str, args: &[CommandArg]) -> Result<CommandDispatchResult> {
        let command_text = build_command_text(verb, args);
        tracing::debug!(command = %command_text, "Dispatching command");
        let raw = self.execute(&command_text).await?;
        Ok(CommandDispatchResult::new(command_text, raw))
    }

    /// Dispatch a command and wait for its task to reach a terminal event
    pub async fn dispatch_and_wait(
        &self,
        verb: &str,
        args: &[CommandArg],
        timeout: Option<Duration>,
    ) -> Result<EventEnvelope> {
        let dispatch = self.dispatch(verb, args).await?;
        match dispatch.task_id {
            Some(task_id) => self.wait_for_task(&task_id, None, timeout).await,
            None => Err(TetherError::bad_response(
                format!("No task_id returned for command: {}", verb),
                Value::Object(dispatch.raw),
            )),
        }
    }

    /// Verb-named command wrappers
    pub fn commands(&self) -> Commands<'_> {
        Commands { session: self }
    }
}

// ==================== Catalog ====================

/// Area of the bot a command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandDomain {
    Navigation,
    World,
    Build,
    Control,
    Info,
    Waypoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub domain: CommandDomain,
}

const fn entry(
    name: &'static str,
    aliases: &'static [&'static str],
    domain: CommandDomain,
) -> CommandSpec {
    CommandSpec {
        name,
        aliases,
        domain,
    }
}

/// Commands known to the counterpart's command system
pub const CATALOG: &[CommandSpec] = &[
    entry("axis", &["highway"], CommandDomain::Navigation),
    entry("blacklist", &[], CommandDomain::Navigation),
    entry("come", &[], CommandDomain::Navigation),
    entry("elytra", &[], CommandDomain::Navigation),
    entry("explore", &[], CommandDomain::Navigation),
    entry("explorefilter", &[], CommandDomain::Navigation),
    entry("goal", &[], CommandDomain::Navigation),
    entry("goto", &[], CommandDomain::Navigation),
    entry("invert", &[], CommandDomain::Navigation),
    entry("path", &[], CommandDomain::Navigation),
    entry("surface", &["top"], CommandDomain::Navigation),
    entry("thisway", &["forward"], CommandDomain::Navigation),
    entry("tunnel", &[], CommandDomain::Navigation),
    entry("click", &[], CommandDomain::World),
    entry("farm", &[], CommandDomain::World),
    entry("find", &[], CommandDomain::World),
    entry("follow", &[], CommandDomain::World),
    entry("mine", &[], CommandDomain::World),
    entry("pickup", &[], CommandDomain::World),
    entry("build", &[], CommandDomain::Build),
    entry("litematica", &[], CommandDomain::Build),
    entry("sel", &["selection", "s"], CommandDomain::Build),
    entry("forcecancel", &[], CommandDomain::Control),
    entry("modified", &["mod", "baritone", "modifiedsettings"], CommandDomain::Control),
    entry("pause", &["p", "paws"], CommandDomain::Control),
    entry("paused", &[], CommandDomain::Control),
    entry("reset", &[], CommandDomain::Control),
    entry("resume", &["r", "unpause", "unpaws"], CommandDomain::Control),
    entry("set", &["setting", "settings"], CommandDomain::Control),
    entry("stop", &["cancel"], CommandDomain::Control),
    entry("eta", &[], CommandDomain::Info),
    entry("gc", &[], CommandDomain::Info),
    entry("help", &["?"], CommandDomain::Info),
    entry("proc", &[], CommandDomain::Info),
    entry("reloadall", &[], CommandDomain::Info),
    entry("render", &[], CommandDomain::Info),
    entry("repack", &["rescan"], CommandDomain::Info),
    entry("saveall", &[], CommandDomain::Info),
    entry("version", &[], CommandDomain::Info),
    entry("home", &[], CommandDomain::Waypoints),
    entry("sethome", &[], CommandDomain::Waypoints),
    entry("waypoints", &["waypoint", "wp"], CommandDomain::Waypoints),
];

/// Find a command by name or alias
pub fn lookup(verb: &str) -> Option<&'static CommandSpec> {
    CATALOG
        .iter()
        .find(|entry| entry.name == verb || entry.aliases.contains(&verb))
}

/// Typed namespace over [`Session::dispatch`]
#[derive(Clone, Copy)]
pub struct Commands<'a> {
    session: &'a Session,
}

macro_rules! verb_methods {
    ($($method:ident => $verb:literal),* $(,)?) => {
        $(
            pub async fn $method(&self, args: &[CommandArg]) -> Result<CommandDispatchResult> {
                self.session.dispatch($verb, args).await
            }
        )*
    };
}

impl<'a> Commands<'a> {
    /// Dispatch any verb
    pub async fn run(&self, verb: &str, args: &[CommandArg]) -> Result<CommandDispatchResult> {
        self.session.dispatch(verb, args).await
    }

    pub async fn goto(&self, x: i64, y: i64, z: i64) -> Result<CommandDispatchResult> {
        self.session
            .dispatch("goto", &[x.into(), y.into(), z.into()])
            .await
    }

    /// `goto` and wait for the resulting task to finish
    pub async fn goto_wait(
        &self,
        x: i64,
        y: i64,
        z: i64,
        timeout: Option<Duration>,
    ) -> Result<EventEnvelope> {
        self.session
            .dispatch_and_wait("goto", &[x.into(), y.into(), z.into()], timeout)
            .await
    }

    /// Mine `blocks`, optionally stopping after `quantity`
    pub async fn mine(&self, quantity: Option<i64>, blocks: &[&str]) -> Result<CommandDispatchResult> {
        if blocks.is_empty() {
            return Err(TetherError::invalid_argument(
                "mine requires at least one block name",
            ));
        }
        let mut args: Vec<CommandArg> = quantity.into_iter().map(CommandArg::from).collect();
        args.extend(blocks.iter().map(|block| CommandArg::from(*block)));
        self.session.dispatch("mine", &args).await
    }

    /// Cancel through `task.cancel` rather than the text command
    pub async fn stop(&self, task_id: Option<&str>) -> Result<Map<String, Value>> {
        self.session.cancel(task_id).await
    }

    verb_methods! {
        axis => "axis",
        blacklist => "blacklist",
        come => "come",
        elytra => "elytra",
        explore => "explore",
        explorefilter => "explorefilter",
        goal => "goal",
        invert => "invert",
        path => "path",
        surface => "surface",
        thisway => "thisway",
        tunnel => "tunnel",
        click => "click",
        farm => "farm",
        find => "find",
        follow => "follow",
        pickup => "pickup",
        build => "build",
        litematica => "litematica",
        sel => "sel",
        forcecancel => "forcecancel",
        modified => "modified",
        pause => "pause",
        paused => "paused",
        reset => "reset",
        resume => "resume",
        set => "set",
        eta => "eta",
        gc => "gc",
        help => "help",
        proc => "proc",
        reloadall => "reloadall",
        render => "render",
        repack => "repack",
        saveall => "saveall",
        version => "version",
        home => "home",
        sethome => "sethome",
        waypoints => "waypoints",
    }
}
