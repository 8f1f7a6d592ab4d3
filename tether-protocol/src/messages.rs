//! Bridge frame types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Request method names understood by the counterpart
pub mod methods {
    /// Authentication handshake; must be the first request on a connection
    pub const AUTH_LOGIN: &str = "auth.login";
    pub const PING: &str = "ping";
    pub const STATUS_GET: &str = "status.get";
    pub const STATUS_SUBSCRIBE: &str = "status.subscribe";
    pub const STATUS_UNSUBSCRIBE: &str = "status.unsubscribe";
    /// Execute a textual command in the automation engine
    pub const EXECUTE: &str = "baritone.execute";
    pub const TASK_CANCEL: &str = "task.cancel";
    pub const API_METADATA: &str = "api.metadata.get";
    pub const API_CONSTRUCT: &str = "api.construct";
    pub const API_INVOKE: &str = "api.invoke";
}

/// Event names pushed by the counterpart
pub mod events {
    /// Matches every event name when used as a subscription or wait target
    pub const WILDCARD: &str = "*";

    /// Full status snapshot
    pub const STATUS_UPDATE: &str = "status.update";

    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_PROGRESS: &str = "task.progress";
    pub const TASK_PAUSED: &str = "task.paused";
    pub const TASK_RESUMED: &str = "task.resumed";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_CANCELED: &str = "task.canceled";

    pub const PATH_EVENT: &str = "baritone.path_event";
    pub const CHAT_MESSAGE: &str = "minecraft.chat_message";
    pub const SYSTEM_MESSAGE: &str = "minecraft.system_message";
    pub const PLAYER_JOIN: &str = "minecraft.player_join";
    pub const PLAYER_LEAVE: &str = "minecraft.player_leave";
    pub const PLAYER_DEATH: &str = "minecraft.player_death";
    pub const PLAYER_RESPAWN: &str = "minecraft.player_respawn";

    /// Events after which a task never progresses again
    pub const TERMINAL_TASK_EVENTS: [&str; 3] = [TASK_COMPLETED, TASK_FAILED, TASK_CANCELED];

    /// Non-terminal lifecycle events that carry the active task snapshot
    pub const ACTIVE_TASK_EVENTS: [&str; 4] = [TASK_STARTED, TASK_PROGRESS, TASK_PAUSED, TASK_RESUMED];

    /// Whether `name` is one of the terminal task events
    pub fn is_terminal(name: &str) -> bool {
        TERMINAL_TASK_EVENTS.contains(&name)
    }
}

/// A single frame on the wire, discriminated by its `type` field
///
/// Frames with an unrecognized `type` decode to [`Frame::Unknown`] so the
/// receive loop can drop them without failing the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    Request(Request),
    Response(Response),
    Event(EventEnvelope),
    #[serde(other)]
    Unknown,
}

/// Client -> counterpart request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Request {
    /// Create a request with a freshly generated id
    pub fn new(method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Counterpart -> client response, correlated by `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: Some(id.into()),
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(
        id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            ok: false,
            result: None,
            error: Some(ResponseError {
                code: code.into(),
                message: message.into(),
                data,
            }),
        }
    }
}

/// Structured failure carried by a response with `ok: false`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    #[serde(default = "ResponseError::unknown_code")]
    pub code: String,
    #[serde(default = "ResponseError::unknown_message")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseError {
    fn unknown_code() -> String {
        "UNKNOWN".into()
    }

    fn unknown_message() -> String {
        "Unknown error".into()
    }
}

/// Unsolicited event pushed by the counterpart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Dot-namespaced event name (e.g. `task.completed`)
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl EventEnvelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            ts: None,
        }
    }

    pub fn with_ts(mut self, ts: impl Into<String>) -> Self {
        self.ts = Some(ts.into());
        self
    }

    /// Event data as an object, if it is one
    pub fn data_object(&self) -> Option<&Map<String, Value>> {
        self.data.as_object()
    }

    /// `data.task_id`, when present and a string
    pub fn task_id(&self) -> Option<&str> {
        self.data.get("task_id").and_then(Value::as_str)
    }

    /// Whether this event matches a subscription/wait target
    pub fn matches(&self, target: &str) -> bool {
        target == events::WILDCARD || self.event == target
    }

    pub fn is_terminal(&self) -> bool {
        events::is_terminal(&self.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_with_type_tag() {
        let mut params = Map::new();
        params.insert("token".into(), json!("secret"));
        let frame = Frame::Request(Request {
            id: "req-1".into(),
            method: methods::AUTH_LOGIN.into(),
            params,
        });

        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({"type": "request", "id": "req-1", "method": "auth.login", "params": {"token": "secret"}})
        );
    }

    #[test]
    fn test_request_new_generates_unique_ids() {
        let a = Request::new(methods::PING, Map::new());
        let b = Request::new(methods::PING, Map::new());
        assert_ne!(a.id, b.id);
        assert_eq!(a.method, "ping");
    }

    #[test]
    fn test_response_success_parses() {
        let frame: Frame =
            serde_json::from_value(json!({"type": "response", "id": "1", "ok": true, "result": {"pong": true}}))
                .unwrap();
        match frame {
            Frame::Response(resp) => {
                assert!(resp.ok);
                assert_eq!(resp.id.as_deref(), Some("1"));
                assert_eq!(resp.result, Some(json!({"pong": true})));
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_response_error_defaults() {
        let frame: Frame =
            serde_json::from_value(json!({"type": "response", "id": "2", "ok": false, "error": {}})).unwrap();
        let Frame::Response(resp) = frame else {
            panic!("expected response");
        };
        let error = resp.error.unwrap();
        assert_eq!(error.code, "UNKNOWN");
        assert_eq!(error.message, "Unknown error");
        assert!(error.data.is_none());
    }

    #[test]
    fn test_response_missing_ok_is_failure() {
        let frame: Frame = serde_json::from_value(json!({"type": "response", "id": "3"})).unwrap();
        let Frame::Response(resp) = frame else {
            panic!("expected response");
        };
        assert!(!resp.ok);
    }

    #[test]
    fn test_event_parses_and_exposes_task_id() {
        let frame: Frame = serde_json::from_value(json!({
            "type": "event",
            "event": "task.completed",
            "data": {"task_id": "t-1"},
            "ts": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        let Frame::Event(event) = frame else {
            panic!("expected event");
        };
        assert_eq!(event.task_id(), Some("t-1"));
        assert!(event.is_terminal());
        assert_eq!(event.ts.as_deref(), Some("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn test_unknown_frame_type() {
        let frame: Frame = serde_json::from_value(json!({"type": "hello", "x": 1})).unwrap();
        assert_eq!(frame, Frame::Unknown);
    }

    #[test]
    fn test_event_matches_wildcard_and_exact() {
        let event = EventEnvelope::new("task.progress", json!({}));
        assert!(event.matches("*"));
        assert!(event.matches("task.progress"));
        assert!(!event.matches("task.started"));
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_terminal_event_names() {
        assert!(events::is_terminal("task.completed"));
        assert!(events::is_terminal("task.failed"));
        assert!(events::is_terminal("task.canceled"));
        assert!(!events::is_terminal("task.paused"));
    }
}
