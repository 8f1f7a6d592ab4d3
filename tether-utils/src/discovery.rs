//! Connection parameter discovery
//!
//! Resolution order for every field: explicit option, then environment,
//! then the first bridge-info file that carries a token, then defaults.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::{paths, Result, TetherError};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 27841;

pub const ENV_HOST: &str = "TETHER_HOST";
pub const ENV_PORT: &str = "TETHER_PORT";
pub const ENV_TOKEN: &str = "TETHER_TOKEN";
pub const ENV_BRIDGE_INFO: &str = "TETHER_BRIDGE_INFO";

/// Everything needed to open and authenticate one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub token: String,
    pub protocol_version: Option<u32>,
    pub server_version: Option<String>,
}

impl ConnectionDescriptor {
    pub fn new(host: impl Into<String>, port: u16, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            token: token.into(),
            protocol_version: None,
            server_version: None,
        }
    }

    /// Canonical endpoint URL, `tcp://host:port`
    pub fn endpoint_url(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }

    /// Socket address string for `TcpStream::connect`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Explicit values supplied by the caller; each one wins over every other source
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub token: Option<String>,
    pub bridge_info_path: Option<PathBuf>,
}

impl DiscoveryOptions {
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    pub fn with_bridge_info(mut self, path: impl Into<PathBuf>) -> Self {
        self.bridge_info_path = Some(path.into());
        self
    }
}

/// Resolve a descriptor from options, process environment and bridge-info files
pub fn resolve_descriptor(options: &DiscoveryOptions) -> Result<ConnectionDescriptor> {
    resolve_with(
        options,
        |key| std::env::var(key).ok().filter(|v| !v.is_empty()),
        paths::bridge_info_candidates(),
    )
}

fn resolve_with<F>(
    options: &DiscoveryOptions,
    env: F,
    auto_candidates: Vec<PathBuf>,
) -> Result<ConnectionDescriptor>
where
    F: Fn(&str) -> Option<String>,
{
    let selected = match (&options.bridge_info_path, env(ENV_BRIDGE_INFO)) {
        (Some(path), _) => vec![path.clone()],
        (None, Some(path)) => vec![PathBuf::from(path)],
        (None, None) => auto_candidates,
    };

    let mut checked = Vec::with_capacity(selected.len());
    let mut file_values = Map::new();
    for candidate in selected {
        let values = load_bridge_info(&candidate)?;
        checked.push(candidate);
        if values.is_empty() {
            continue;
        }
        let has_token = values
            .get("token")
            .and_then(Value::as_str)
            .is_some_and(|t| !t.is_empty());
        file_values = values;
        if has_token {
            break;
        }
    }

    let host = options
        .host
        .clone()
        .or_else(|| env(ENV_HOST))
        .or_else(|| {
            file_values
                .get("host")
                .and_then(Value::as_str)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match (options.port, env(ENV_PORT)) {
        (Some(port), _) => port,
        (None, Some(raw)) => parse_port(&raw, ENV_PORT)?,
        (None, None) => match file_values.get("port") {
            Some(value) => port_from_value(value)?,
            None => DEFAULT_PORT,
        },
    };

    let token = options
        .token
        .clone()
        .or_else(|| env(ENV_TOKEN))
        .or_else(|| match file_values.get("token") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .ok_or_else(|| {
            let paths = checked
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            TetherError::discovery(format!(
                "No bridge token found. Start the counterpart first or set {}. Checked paths: {}",
                ENV_TOKEN, paths
            ))
        })?;

    let protocol_version = file_values
        .get("protocol_version")
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
        .and_then(|v| u32::try_from(v).ok());

    let server_version = file_values.get("server_version").and_then(|v| match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    });

    Ok(ConnectionDescriptor {
        host,
        port,
        token,
        protocol_version,
        server_version,
    })
}

/// Read a bridge-info file; a missing file yields an empty map
fn load_bridge_info(path: &Path) -> Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }

    let raw = std::fs::read_to_string(path).map_err(|e| TetherError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(TetherError::discovery(format!(
            "Bridge info file does not contain an object: {}",
            path.display()
        ))),
        Err(e) => Err(TetherError::discovery(format!(
            "Bridge info file is not valid JSON: {}: {}",
            path.display(),
            e
        ))),
    }
}

fn parse_port(raw: &str, source: &str) -> Result<u16> {
    raw.trim()
        .parse()
        .map_err(|_| TetherError::discovery(format!("Invalid port in {}: {:?}", source, raw)))
}

fn port_from_value(value: &Value) -> Result<u16> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| TetherError::discovery(format!("Invalid port in bridge info: {}", n))),
        Value::String(s) => parse_port(s, "bridge info"),
        other => Err(TetherError::discovery(format!(
            "Invalid port in bridge info: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_info(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    // ==================== Precedence Tests ====================

    #[test]
    fn test_explicit_values_override_env_and_file() {
        let dir = TempDir::new().unwrap();
        let info = write_info(
            dir.path(),
            "bridge-info.json",
            r#"{"host":"1.2.3.4","port":1234,"token":"file-token"}"#,
        );
        let env = env_of(&[
            (ENV_HOST, "9.9.9.9"),
            (ENV_PORT, "9999"),
            (ENV_TOKEN, "env-token"),
        ]);
        let options = DiscoveryOptions::default()
            .with_address("127.0.0.1", 27841)
            .with_token("explicit-token")
            .with_bridge_info(&info);

        let resolved = resolve_with(&options, env, vec![]).unwrap();
        assert_eq!(resolved.host, "127.0.0.1");
        assert_eq!(resolved.port, 27841);
        assert_eq!(resolved.token, "explicit-token");
        assert_eq!(resolved.endpoint_url(), "tcp://127.0.0.1:27841");
    }

    #[test]
    fn test_env_values_override_file() {
        let dir = TempDir::new().unwrap();
        let info = write_info(
            dir.path(),
            "bridge-info.json",
            r#"{"host":"1.2.3.4","port":1234,"token":"file-token"}"#,
        );
        let env = env_of(&[
            (ENV_HOST, "10.0.0.5"),
            (ENV_PORT, "40000"),
            (ENV_TOKEN, "env-token"),
        ]);
        let options = DiscoveryOptions::default().with_bridge_info(&info);

        let resolved = resolve_with(&options, env, vec![]).unwrap();
        assert_eq!(resolved.host, "10.0.0.5");
        assert_eq!(resolved.port, 40000);
        assert_eq!(resolved.token, "env-token");
    }

    #[test]
    fn test_file_values_and_versions() {
        let dir = TempDir::new().unwrap();
        let info = write_info(
            dir.path(),
            "bridge-info.json",
            r#"{"host":"1.2.3.4","port":"1234","token":"file-token","protocol_version":2,"server_version":"0.4.1"}"#,
        );
        let options = DiscoveryOptions::default().with_bridge_info(&info);

        let resolved = resolve_with(&options, env_of(&[]), vec![]).unwrap();
        assert_eq!(resolved.address(), "1.2.3.4:1234");
        assert_eq!(resolved.token, "file-token");
        assert_eq!(resolved.protocol_version, Some(2));
        assert_eq!(resolved.server_version.as_deref(), Some("0.4.1"));
    }

    #[test]
    fn test_defaults_when_file_has_only_token() {
        let dir = TempDir::new().unwrap();
        let info = write_info(dir.path(), "bridge-info.json", r#"{"token":"t"}"#);
        let options = DiscoveryOptions::default().with_bridge_info(&info);

        let resolved = resolve_with(&options, env_of(&[]), vec![]).unwrap();
        assert_eq!(resolved.host, DEFAULT_HOST);
        assert_eq!(resolved.port, DEFAULT_PORT);
    }

    #[test]
    fn test_env_bridge_info_path_used_before_candidates() {
        let dir = TempDir::new().unwrap();
        let from_env = write_info(dir.path(), "env.json", r#"{"token":"env-file"}"#);
        let candidate = write_info(dir.path(), "auto.json", r#"{"token":"auto-file"}"#);
        let env = env_of(&[(ENV_BRIDGE_INFO, from_env.to_str().unwrap())]);

        let resolved = resolve_with(&DiscoveryOptions::default(), env, vec![candidate]).unwrap();
        assert_eq!(resolved.token, "env-file");
    }

    // ==================== Candidate Scan Tests ====================

    #[test]
    fn test_auto_discovery_falls_back_to_later_candidate() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("default").join("bridge-info.json");
        let dev = paths::bridge_info_in(&dir.path().join("repo").join("mod").join("run"));
        std::fs::create_dir_all(dev.parent().unwrap()).unwrap();
        std::fs::write(&dev, r#"{"host":"127.0.0.1","port":27841,"token":"dev-token"}"#).unwrap();

        let resolved =
            resolve_with(&DiscoveryOptions::default(), env_of(&[]), vec![missing, dev]).unwrap();
        assert_eq!(resolved.token, "dev-token");
    }

    #[test]
    fn test_candidate_without_token_does_not_stop_scan() {
        let dir = TempDir::new().unwrap();
        let first = write_info(dir.path(), "a.json", r#"{"host":"1.1.1.1"}"#);
        let second = write_info(dir.path(), "b.json", r#"{"host":"2.2.2.2","token":"b"}"#);

        let resolved =
            resolve_with(&DiscoveryOptions::default(), env_of(&[]), vec![first, second]).unwrap();
        assert_eq!(resolved.host, "2.2.2.2");
        assert_eq!(resolved.token, "b");
    }

    // ==================== Failure Tests ====================

    #[test]
    fn test_missing_token_lists_checked_paths() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");

        let err = resolve_with(&DiscoveryOptions::default(), env_of(&[]), vec![missing.clone()])
            .unwrap_err();
        match err {
            TetherError::Discovery(msg) => {
                assert!(msg.contains("No bridge token found"));
                assert!(msg.contains(&missing.display().to_string()));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_non_object_file_rejected() {
        let dir = TempDir::new().unwrap();
        let info = write_info(dir.path(), "bridge-info.json", "[1, 2, 3]");
        let options = DiscoveryOptions::default().with_bridge_info(&info);

        let err = resolve_with(&options, env_of(&[]), vec![]).unwrap_err();
        assert!(matches!(err, TetherError::Discovery(ref m) if m.contains("does not contain an object")));
    }

    #[test]
    fn test_invalid_env_port_rejected() {
        let env = env_of(&[(ENV_TOKEN, "t"), (ENV_PORT, "not-a-port")]);
        let err = resolve_with(&DiscoveryOptions::default(), env, vec![]).unwrap_err();
        assert!(matches!(err, TetherError::Discovery(_)));
    }
}
