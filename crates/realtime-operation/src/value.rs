//! Values stored in collaborative lists and maps.

use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

/// A value held by a list slot or a map entry.
///
/// Plain data is carried as JSON. Other collaborative objects are never
/// embedded; they are referenced by id and resolved through the owning
/// model's registry, which is what allows object graphs to contain cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Json(serde_json::Value),
    Ref(ObjectId),
}

impl Value {
    pub fn as_ref_id(&self) -> Option<&ObjectId> {
        match self {
            Value::Ref(id) => Some(id),
            Value::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(v) => Some(v),
            Value::Ref(_) => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Ref(id)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Json(serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Json(serde_json::Value::String(s))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Json(serde_json::Value::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Json(serde_json::Value::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Json(serde_json::Value::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Json(serde_json::Value::Bool(b))
    }
}
