//! Typed remote-object protocol
//!
//! Constructs objects and invokes methods inside the counterpart process.
//! Objects never cross the wire; they come back as [`RemoteRef`] handles
//! that later calls pass as targets or arguments. Handles are scoped to the
//! session that produced them and are released by the counterpart when that
//! session ends.

#[macro_use]
mod proxies;
mod automation;
mod goals;
mod world;

use serde_json::{json, Map, Value};

use tether_protocol::{methods, InvokeTarget, RemoteRef, RemoteValue};
use tether_utils::{Result, TetherError};

use crate::connection::Session;

pub use automation::{types, Automation, BlockSpec, ROOT};
pub use goals::GoalFactory;
pub use proxies::{
    BuilderProcessRef, CustomGoalProcessRef, ExploreProcessRef, FollowProcessRef,
    GetToBlockProcessRef, GoalRef, MineProcessRef, PathCalculationResultRef, PathExecutorRef,
    PathFinderRef, PathRef, PathingBehaviorRef,
};
pub use world::{
    CachedWorldRef, PlayerContextRef, SelectionManagerRef, SelectionRef, WaypointCollectionRef,
    WaypointRef, WorldDataRef, WorldProviderRef,
};

impl Session {
    /// Construct a remote object; returns the decoded `result.value`
    pub async fn api_construct(
        &self,
        type_name: &str,
        args: Vec<RemoteValue>,
        parameter_types: Option<&[&str]>,
    ) -> Result<RemoteValue> {
        let mut params = Map::new();
        params.insert("type".into(), Value::from(type_name));
        params.insert("args".into(), encode_args(&args));
        if let Some(types) = parameter_types {
            params.insert("parameter_types".into(), json!(types));
        }

        let result = self
            .request(methods::API_CONSTRUCT, params)
            .await
            .map_err(TetherError::into_typed)?;
        Ok(take_value(result))
    }

    /// Invoke `method` on a root object, a type (static call) or a handle
    pub async fn api_invoke(
        &self,
        target: impl Into<InvokeTarget>,
        method: &str,
        args: Vec<RemoteValue>,
        parameter_types: Option<&[&str]>,
    ) -> Result<RemoteValue> {
        let target = target.into();
        tracing::trace!(target = %target.describe(), method, "Typed invoke");

        let mut params = Map::new();
        params.insert("target".into(), target.to_json());
        params.insert("method".into(), Value::from(method));
        params.insert("args".into(), encode_args(&args));
        if let Some(types) = parameter_types {
            params.insert("parameter_types".into(), json!(types));
        }

        let result = self
            .request(methods::API_INVOKE, params)
            .await
            .map_err(TetherError::into_typed)?;
        Ok(take_value(result))
    }

    /// Describe the exposed roots, or one target's type
    pub async fn api_metadata(&self, target: Option<&InvokeTarget>) -> Result<Map<String, Value>> {
        let mut params = Map::new();
        if let Some(target) = target {
            params.insert("target".into(), target.to_json());
        }
        self.request(methods::API_METADATA, params)
            .await
            .map_err(TetherError::into_typed)
    }

    /// Root namespace of the automation engine
    pub fn automation(&self) -> Automation {
        Automation::new(self.clone())
    }
}

fn encode_args(args: &[RemoteValue]) -> Value {
    Value::Array(args.iter().map(RemoteValue::encode).collect())
}

fn take_value(mut result: Map<String, Value>) -> RemoteValue {
    result
        .remove("value")
        .map(RemoteValue::decode)
        .unwrap_or_default()
}

/// Require `value` to be a handle
///
/// Anything else is a `BadResponse` carrying the context, the offending
/// value and, when known, the expected remote type.
pub fn require_remote_ref(
    value: RemoteValue,
    context: &str,
    expected_type: Option<&str>,
) -> Result<RemoteRef> {
    match value {
        RemoteValue::Ref(reference) => Ok(reference),
        other => {
            let mut payload = Map::new();
            payload.insert("context".into(), Value::from(context));
            payload.insert("value".into(), other.encode());
            if let Some(expected_type) = expected_type {
                payload.insert("expected_type".into(), Value::from(expected_type));
            }
            Err(TetherError::bad_response(
                format!("Expected remote reference for {}", context),
                Value::Object(payload),
            ))
        }
    }
}

/// Like [`require_remote_ref`] but a null value is `None`
pub(crate) fn optional_remote_ref(
    value: RemoteValue,
    context: &str,
    expected_type: Option<&str>,
) -> Result<Option<RemoteRef>> {
    if value.is_null() {
        return Ok(None);
    }
    require_remote_ref(value, context, expected_type).map(Some)
}

/// Require an array of handles
pub(crate) fn require_remote_ref_list(
    value: RemoteValue,
    context: &str,
    expected_type: Option<&str>,
) -> Result<Vec<RemoteRef>> {
    match value {
        RemoteValue::Array(items) => items
            .into_iter()
            .map(|item| require_remote_ref(item, context, expected_type))
            .collect(),
        other => Err(unexpected("list", context, &other)),
    }
}

pub(crate) fn require_bool(value: RemoteValue, context: &str) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| unexpected("boolean", context, &value))
}

pub(crate) fn require_i64(value: RemoteValue, context: &str) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| unexpected("integer", context, &value))
}

pub(crate) fn require_f64(value: RemoteValue, context: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| unexpected("number", context, &value))
}

pub(crate) fn require_string(value: RemoteValue, context: &str) -> Result<String> {
    match value {
        RemoteValue::String(text) => Ok(text),
        other => Err(unexpected("string", context, &other)),
    }
}

fn unexpected(kind: &str, context: &str, value: &RemoteValue) -> TetherError {
    TetherError::bad_response(
        format!("Expected {} from {}", kind, context),
        json!({ "value": value.encode() }),
    )
}
