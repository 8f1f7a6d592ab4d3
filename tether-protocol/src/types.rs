//! Typed remote-object values
//!
//! Objects created by the typed API live only in the counterpart process. On
//! the wire they travel as handle markers:
//!
//! ```json
//! {"$pyritone_ref": "ref-17", "java_type": "baritone.api.pathing.goals.GoalBlock"}
//! ```
//!
//! [`RemoteValue`] is the decoded form of any value the typed API can carry;
//! markers anywhere inside arrays or objects become [`RemoteValue::Ref`].

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

/// Key identifying a handle marker object
pub const REF_KEY: &str = "$pyritone_ref";

/// Optional key carrying the declared remote type of a handle
pub const REF_TYPE_KEY: &str = "java_type";

/// Opaque handle to an object living in the counterpart process
///
/// The client never owns the referenced object and there is no release
/// message; dropping a `RemoteRef` has no remote effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteRef {
    id: String,
    type_name: Option<String>,
}

impl RemoteRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: None,
        }
    }

    pub fn with_type(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: Some(type_name.into()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Declared remote type, when the counterpart reported one
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Encode as a handle marker
    pub fn to_marker(&self) -> Value {
        let mut marker = Map::new();
        marker.insert(REF_KEY.into(), Value::String(self.id.clone()));
        if let Some(type_name) = &self.type_name {
            marker.insert(REF_TYPE_KEY.into(), Value::String(type_name.clone()));
        }
        Value::Object(marker)
    }

    /// Parse a handle marker object
    pub fn from_marker(object: &Map<String, Value>) -> Option<Self> {
        let id = object.get(REF_KEY)?.as_str()?;
        let type_name = object
            .get(REF_TYPE_KEY)
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Self {
            id: id.to_string(),
            type_name,
        })
    }
}

/// A value passed to or returned from the typed API
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RemoteValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<RemoteValue>),
    Object(BTreeMap<String, RemoteValue>),
    Ref(RemoteRef),
}

impl RemoteValue {
    /// Encode into wire JSON, turning refs into handle markers
    pub fn encode(&self) -> Value {
        match self {
            RemoteValue::Null => Value::Null,
            RemoteValue::Bool(b) => Value::Bool(*b),
            RemoteValue::Number(n) => Value::Number(n.clone()),
            RemoteValue::String(s) => Value::String(s.clone()),
            RemoteValue::Array(items) => Value::Array(items.iter().map(RemoteValue::encode).collect()),
            RemoteValue::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.encode()))
                    .collect(),
            ),
            RemoteValue::Ref(reference) => reference.to_marker(),
        }
    }

    /// Decode wire JSON, turning handle markers into refs
    pub fn decode(value: Value) -> Self {
        match value {
            Value::Null => RemoteValue::Null,
            Value::Bool(b) => RemoteValue::Bool(b),
            Value::Number(n) => RemoteValue::Number(n),
            Value::String(s) => RemoteValue::String(s),
            Value::Array(items) => RemoteValue::Array(items.into_iter().map(RemoteValue::decode).collect()),
            Value::Object(object) => match RemoteRef::from_marker(&object) {
                Some(reference) => RemoteValue::Ref(reference),
                None => RemoteValue::Object(
                    object
                        .into_iter()
                        .map(|(key, value)| (key, RemoteValue::decode(value)))
                        .collect(),
                ),
            },
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RemoteValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RemoteValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RemoteValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RemoteValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RemoteValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RemoteValue]> {
        match self {
            RemoteValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_remote_ref(&self) -> Option<&RemoteRef> {
        match self {
            RemoteValue::Ref(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn into_remote_ref(self) -> Option<RemoteRef> {
        match self {
            RemoteValue::Ref(reference) => Some(reference),
            _ => None,
        }
    }
}

impl From<bool> for RemoteValue {
    fn from(value: bool) -> Self {
        RemoteValue::Bool(value)
    }
}

impl From<i32> for RemoteValue {
    fn from(value: i32) -> Self {
        RemoteValue::Number(value.into())
    }
}

impl From<i64> for RemoteValue {
    fn from(value: i64) -> Self {
        RemoteValue::Number(value.into())
    }
}

impl From<u32> for RemoteValue {
    fn from(value: u32) -> Self {
        RemoteValue::Number(value.into())
    }
}

impl From<f64> for RemoteValue {
    /// Non-finite floats have no JSON form and become `Null`
    fn from(value: f64) -> Self {
        Number::from_f64(value)
            .map(RemoteValue::Number)
            .unwrap_or(RemoteValue::Null)
    }
}

impl From<&str> for RemoteValue {
    fn from(value: &str) -> Self {
        RemoteValue::String(value.to_string())
    }
}

impl From<String> for RemoteValue {
    fn from(value: String) -> Self {
        RemoteValue::String(value)
    }
}

impl From<RemoteRef> for RemoteValue {
    fn from(value: RemoteRef) -> Self {
        RemoteValue::Ref(value)
    }
}

impl From<&RemoteRef> for RemoteValue {
    fn from(value: &RemoteRef) -> Self {
        RemoteValue::Ref(value.clone())
    }
}

impl<T: Into<RemoteValue>> From<Vec<T>> for RemoteValue {
    fn from(values: Vec<T>) -> Self {
        RemoteValue::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RemoteValue>> From<Option<T>> for RemoteValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RemoteValue::Null)
    }
}

impl From<Value> for RemoteValue {
    fn from(value: Value) -> Self {
        RemoteValue::decode(value)
    }
}

/// Receiver of an `api.invoke` call
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeTarget {
    /// A named root object exposed by the counterpart (e.g. `baritone`)
    Root(String),
    /// A type, for static method calls
    Type(String),
    /// A previously returned remote object
    Ref(RemoteRef),
}

impl InvokeTarget {
    pub fn root(name: impl Into<String>) -> Self {
        InvokeTarget::Root(name.into())
    }

    pub fn type_name(name: impl Into<String>) -> Self {
        InvokeTarget::Type(name.into())
    }

    pub fn to_json(&self) -> Value {
        let mut target = Map::new();
        match self {
            InvokeTarget::Root(name) => {
                target.insert("kind".into(), Value::from("root"));
                target.insert("name".into(), Value::from(name.as_str()));
            }
            InvokeTarget::Type(name) => {
                target.insert("kind".into(), Value::from("type"));
                target.insert("name".into(), Value::from(name.as_str()));
            }
            InvokeTarget::Ref(reference) => {
                target.insert("kind".into(), Value::from("ref"));
                target.insert("id".into(), Value::from(reference.id()));
            }
        }
        Value::Object(target)
    }

    /// Human-readable label used in error context
    pub fn describe(&self) -> String {
        match self {
            InvokeTarget::Root(name) => format!("root:{}", name),
            InvokeTarget::Type(name) => format!("type:{}", name),
            InvokeTarget::Ref(reference) => match reference.type_name() {
                Some(type_name) => format!("ref:{}({})", reference.id(), type_name),
                None => format!("ref:{}", reference.id()),
            },
        }
    }
}

impl From<RemoteRef> for InvokeTarget {
    fn from(reference: RemoteRef) -> Self {
        InvokeTarget::Ref(reference)
    }
}

impl From<&RemoteRef> for InvokeTarget {
    fn from(reference: &RemoteRef) -> Self {
        InvokeTarget::Ref(reference.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ref_marker_with_type() {
        let reference = RemoteRef::with_type("r1", "a.b.Goal");
        assert_eq!(
            reference.to_marker(),
            json!({"$pyritone_ref": "r1", "java_type": "a.b.Goal"})
        );
    }

    #[test]
    fn test_ref_marker_without_type() {
        let reference = RemoteRef::new("r2");
        assert_eq!(reference.to_marker(), json!({"$pyritone_ref": "r2"}));
        assert!(reference.type_name().is_none());
    }

    #[test]
    fn test_encode_nested_refs() {
        let value = RemoteValue::Array(vec![
            RemoteValue::from(3),
            RemoteValue::Ref(RemoteRef::with_type("g1", "Goal")),
            RemoteValue::from(vec![RemoteRef::new("g2")]),
        ]);

        assert_eq!(
            value.encode(),
            json!([3, {"$pyritone_ref": "g1", "java_type": "Goal"}, [{"$pyritone_ref": "g2"}]])
        );
    }

    #[test]
    fn test_decode_nested_markers() {
        let decoded = RemoteValue::decode(json!({
            "path": {"$pyritone_ref": "p1", "java_type": "IPath"},
            "nodes": [{"$pyritone_ref": "n1"}, 4],
            "name": "walk"
        }));

        let RemoteValue::Object(entries) = decoded else {
            panic!("expected object");
        };
        assert_eq!(
            entries["path"],
            RemoteValue::Ref(RemoteRef::with_type("p1", "IPath"))
        );
        assert_eq!(
            entries["nodes"],
            RemoteValue::Array(vec![RemoteValue::Ref(RemoteRef::new("n1")), RemoteValue::from(4)])
        );
        assert_eq!(entries["name"].as_str(), Some("walk"));
    }

    #[test]
    fn test_decode_marker_with_non_string_id_is_plain_object() {
        let decoded = RemoteValue::decode(json!({"$pyritone_ref": 5}));
        assert!(matches!(decoded, RemoteValue::Object(_)));
    }

    #[test]
    fn test_non_finite_float_becomes_null() {
        assert!(RemoteValue::from(f64::NAN).is_null());
        assert_eq!(RemoteValue::from(1.5).as_f64(), Some(1.5));
    }

    #[test]
    fn test_option_conversion() {
        assert!(RemoteValue::from(None::<i32>).is_null());
        assert_eq!(RemoteValue::from(Some(7)).as_i64(), Some(7));
    }

    #[test]
    fn test_invoke_target_json() {
        assert_eq!(
            InvokeTarget::root("baritone").to_json(),
            json!({"kind": "root", "name": "baritone"})
        );
        assert_eq!(
            InvokeTarget::type_name("a.B").to_json(),
            json!({"kind": "type", "name": "a.B"})
        );
        assert_eq!(
            InvokeTarget::from(RemoteRef::with_type("r9", "X")).to_json(),
            json!({"kind": "ref", "id": "r9"})
        );
    }

    #[test]
    fn test_invoke_target_describe() {
        assert_eq!(InvokeTarget::root("baritone").describe(), "root:baritone");
        assert_eq!(
            InvokeTarget::from(RemoteRef::with_type("r1", "Goal")).describe(),
            "ref:r1(Goal)"
        );
    }
}
