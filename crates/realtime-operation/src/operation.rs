//! Operations addressed to collaborative objects.
//!
//! An [`Operation`] pairs a target [`ObjectId`] with one [`OpComponent`].
//! Components are plain descriptors: they carry no behaviour of their own and
//! are interpreted by the object variant that consumes them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::ObjectId;
use crate::value::Value;

// ── ObjectKind ─────────────────────────────────────────────────────────────

/// The closed set of collaborative object variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    String,
    List,
    Map,
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::String => "String",
            ObjectKind::List => "List",
            ObjectKind::Map => "Map",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── OpComponent ────────────────────────────────────────────────────────────

/// Payload of an operation.
///
/// String indices count `char`s, list indices count slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OpComponent {
    /// Register a new, empty object of `kind` under the operation's target id.
    Create { kind: ObjectKind },
    /// Insert `text` at `index`.
    StringInsert { index: usize, text: String },
    /// Delete `len` chars starting at `index`.
    StringDelete { index: usize, len: usize },
    /// Insert `values` at `index`.
    ListInsert { index: usize, values: Vec<Value> },
    /// Delete `len` slots starting at `index`.
    ListDelete { index: usize, len: usize },
    /// Replace the slot at `index`.
    ListSet { index: usize, value: Value },
    /// Set `key` to `value`; `None` removes the key.
    MapSet { key: String, value: Option<Value> },
}

impl OpComponent {
    /// Short mnemonic name of this component.
    pub fn name(&self) -> &'static str {
        match self {
            OpComponent::Create { .. } => "create",
            OpComponent::StringInsert { .. } => "str_ins",
            OpComponent::StringDelete { .. } => "str_del",
            OpComponent::ListInsert { .. } => "list_ins",
            OpComponent::ListDelete { .. } => "list_del",
            OpComponent::ListSet { .. } => "list_set",
            OpComponent::MapSet { .. } => "map_set",
        }
    }

    /// The object variant this component is addressed to, if any.
    ///
    /// `Create` is handled by the model registry rather than by an object.
    pub fn target_kind(&self) -> Option<ObjectKind> {
        match self {
            OpComponent::Create { .. } => None,
            OpComponent::StringInsert { .. } | OpComponent::StringDelete { .. } => {
                Some(ObjectKind::String)
            }
            OpComponent::ListInsert { .. }
            | OpComponent::ListDelete { .. }
            | OpComponent::ListSet { .. } => Some(ObjectKind::List),
            OpComponent::MapSet { .. } => Some(ObjectKind::Map),
        }
    }
}

// ── Operation ──────────────────────────────────────────────────────────────

/// A single mutation addressed to one collaborative object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub target: ObjectId,
    #[serde(flatten)]
    pub component: OpComponent,
}

impl Operation {
    pub fn new(target: ObjectId, component: OpComponent) -> Self {
        Self { target, component }
    }

    pub fn create(target: ObjectId, kind: ObjectKind) -> Self {
        Self::new(target, OpComponent::Create { kind })
    }

    pub fn name(&self) -> &'static str {
        self.component.name()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = format!("{} {}", self.name(), self.target);
        match &self.component {
            OpComponent::Create { kind } => write!(f, "{base} {{ {kind} }}"),
            OpComponent::StringInsert { index, text } => write!(f, "{base} {{ {index} ← {text:?} }}"),
            OpComponent::StringDelete { index, len } | OpComponent::ListDelete { index, len } => {
                write!(f, "{base} {{ {index}!{len} }}")
            }
            OpComponent::ListInsert { index, values } => {
                write!(f, "{base} {{ {index} ← {} values }}", values.len())
            }
            OpComponent::ListSet { index, .. } => write!(f, "{base} {{ {index} }}"),
            OpComponent::MapSet { key, value } => match value {
                Some(_) => write!(f, "{base} {{ {key:?} }}"),
                None => write!(f, "{base} {{ {key:?} ← ∅ }}"),
            },
        }
    }
}

// ── SequencedOperation ─────────────────────────────────────────────────────

/// An operation placed in the global order, with its originator attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedOperation {
    /// Position in the global total order.
    pub seq: u64,
    pub user_id: String,
    pub session_id: String,
    pub operation: Operation,
}
