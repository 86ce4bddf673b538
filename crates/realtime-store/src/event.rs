//! Change events emitted by collaborative objects.

use std::fmt;

use realtime_operation::{ObjectId, Value};

/// Categories of events an object may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    ObjectChanged,
    ValueChanged,
    TextInserted,
    TextDeleted,
    ValuesAdded,
    ValuesRemoved,
    ValuesSet,
}

impl EventType {
    pub fn name(&self) -> &'static str {
        match self {
            EventType::ObjectChanged => "object_changed",
            EventType::ValueChanged => "value_changed",
            EventType::TextInserted => "text_inserted",
            EventType::TextDeleted => "text_deleted",
            EventType::ValuesAdded => "values_added",
            EventType::ValuesRemoved => "values_removed",
            EventType::ValuesSet => "values_set",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What changed, per event type.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Wraps the specific events produced by one operation.
    ObjectChanged { events: Vec<BaseModelEvent> },
    ValueChanged {
        property: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
    TextInserted { index: usize, text: String },
    TextDeleted { index: usize, text: String },
    ValuesAdded { index: usize, values: Vec<Value> },
    ValuesRemoved { index: usize, values: Vec<Value> },
    ValuesSet {
        index: usize,
        old_values: Vec<Value>,
        new_values: Vec<Value>,
    },
}

/// Immutable event envelope. Created inside `consume`, never mutated after.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseModelEvent {
    target: ObjectId,
    user_id: String,
    session_id: String,
    kind: EventKind,
}

/// Event of type [`EventType::ObjectChanged`].
pub type ObjectChangedEvent = BaseModelEvent;

impl BaseModelEvent {
    pub fn new(
        target: ObjectId,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            target,
            user_id: user_id.into(),
            session_id: session_id.into(),
            kind,
        }
    }

    /// Wraps `event` in an object-changed envelope with the same attribution.
    pub fn object_changed(event: &BaseModelEvent) -> Self {
        Self {
            target: event.target.clone(),
            user_id: event.user_id.clone(),
            session_id: event.session_id.clone(),
            kind: EventKind::ObjectChanged { events: vec![event.clone()] },
        }
    }

    pub fn event_type(&self) -> EventType {
        match self.kind {
            EventKind::ObjectChanged { .. } => EventType::ObjectChanged,
            EventKind::ValueChanged { .. } => EventType::ValueChanged,
            EventKind::TextInserted { .. } => EventType::TextInserted,
            EventKind::TextDeleted { .. } => EventType::TextDeleted,
            EventKind::ValuesAdded { .. } => EventType::ValuesAdded,
            EventKind::ValuesRemoved { .. } => EventType::ValuesRemoved,
            EventKind::ValuesSet { .. } => EventType::ValuesSet,
        }
    }

    pub fn target(&self) -> &ObjectId {
        &self.target
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }
}
