//! The collaborative object contract and its variants.
//!
//! | Rust type              | Holds                     | Operations                         |
//! |------------------------|---------------------------|------------------------------------|
//! | `CollaborativeString`  | text                      | `StringInsert`, `StringDelete`     |
//! | `CollaborativeList`    | ordered [`Value`]s        | `ListInsert`, `ListDelete`, `ListSet` |
//! | `CollaborativeMap`     | key → [`Value`]           | `MapSet`                           |
//!
//! Objects never own each other. A list slot or map entry pointing at another
//! object holds its id, and traversal resolves it through the model's
//! [`ObjectIndex`].

pub mod list;
pub mod map;
pub mod string;

use std::collections::HashSet;
use std::fmt::{self, Write as _};

use indexmap::IndexMap;
use realtime_operation::{ObjectId, ObjectKind, OpComponent, Operation, Value};

use crate::bridge::Bridge;
use crate::document::{Document, EventHandler, HandlerRegistration};
use crate::error::StoreError;
use crate::event::{BaseModelEvent, EventKind, EventType};

pub use list::CollaborativeList;
pub use map::CollaborativeMap;
pub use string::CollaborativeString;

/// Registry of live objects keyed by id, in creation order.
pub type ObjectIndex = IndexMap<ObjectId, CollaborativeObject>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Disposed,
}

/// Identity and lifecycle state shared by every variant.
#[derive(Debug, Clone)]
pub struct ObjectCore {
    id: ObjectId,
    state: LifecycleState,
}

impl ObjectCore {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self {
            id,
            state: LifecycleState::Active,
        }
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn ensure_active(&self) -> Result<(), StoreError> {
        match self.state {
            LifecycleState::Active => Ok(()),
            LifecycleState::Disposed => Err(StoreError::InvalidState { id: self.id.clone() }),
        }
    }

    /// Rejects operations addressed to another object.
    pub fn ensure_target(&self, target: &ObjectId) -> Result<(), StoreError> {
        if *target != self.id {
            return Err(StoreError::MisroutedOperation {
                id: self.id.clone(),
                target: target.clone(),
            });
        }
        Ok(())
    }

    /// Returns `true` on the Active → Disposed transition, `false` if the
    /// object was already disposed.
    fn mark_disposed(&mut self) -> bool {
        let was_active = self.state == LifecycleState::Active;
        self.state = LifecycleState::Disposed;
        was_active
    }
}

// ── Contract ───────────────────────────────────────────────────────────────

/// Behaviour common to every collaborative type.
///
/// Variants implement [`consume`](Collaborative::consume),
/// [`to_initialization`](Collaborative::to_initialization) and
/// [`write_to`](Collaborative::write_to); everything else is provided.
///
/// `consume` is the only path that mutates an object. Implementations must:
/// - apply every delivered operation once, in delivery order, without
///   deduplicating or reordering;
/// - validate before mutating, so a rejected operation changes nothing;
/// - finish the mutation before scheduling any event, and schedule events
///   only through [`fire_event`](Collaborative::fire_event);
/// - keep `user_id`/`session_id` out of the resulting state;
/// - reject components of another variant with
///   [`StoreError::UnsupportedOperation`].
pub trait Collaborative {
    fn kind(&self) -> ObjectKind;

    fn core(&self) -> &ObjectCore;

    fn core_mut(&mut self) -> &mut ObjectCore;

    fn id(&self) -> &ObjectId {
        self.core().id()
    }

    fn is_disposed(&self) -> bool {
        self.core().state() == LifecycleState::Disposed
    }

    fn add_event_listener(
        &self,
        document: &Document,
        event_type: EventType,
        handler: EventHandler,
        capture: bool,
    ) -> Result<HandlerRegistration, StoreError> {
        self.core().ensure_active()?;
        Ok(document.add_event_listener(self.id(), event_type, handler, capture))
    }

    fn add_object_changed_listener(
        &self,
        document: &Document,
        handler: EventHandler,
    ) -> Result<HandlerRegistration, StoreError> {
        self.add_event_listener(document, EventType::ObjectChanged, handler, false)
    }

    /// Applies one sequenced operation.
    fn consume(
        &mut self,
        document: &mut Document,
        user_id: &str,
        session_id: &str,
        operation: Operation,
    ) -> Result<(), StoreError>;

    /// Hands a local operation to the bridge. State is untouched until the
    /// bridge delivers the sequenced operation back through `consume`.
    fn consume_and_submit(
        &self,
        bridge: &mut dyn Bridge,
        operation: Operation,
    ) -> Result<(), StoreError> {
        self.core().ensure_active()?;
        self.core().ensure_target(&operation.target)?;
        bridge.consume_and_submit(operation)
    }

    fn fire_event(&self, document: &mut Document, event: BaseModelEvent) {
        document.schedule_event(event);
    }

    /// Schedules `kind` followed by the object-changed event wrapping it.
    fn fire_change(&self, document: &mut Document, user_id: &str, session_id: &str, kind: EventKind) {
        let event = BaseModelEvent::new(self.id().clone(), user_id, session_id, kind);
        let changed = BaseModelEvent::object_changed(&event);
        self.fire_event(document, event);
        self.fire_event(document, changed);
    }

    fn unsupported(&self, component: &OpComponent) -> StoreError {
        StoreError::UnsupportedOperation {
            id: self.id().clone(),
            kind: self.kind(),
            operation: component.name(),
        }
    }

    /// Operations that rebuild the current state when replayed, in order, on
    /// an empty object of the same variant.
    fn to_initialization(&self) -> Vec<Operation>;

    /// Writes this object's contents. Referenced objects go through
    /// [`write_value`], which consults and extends `seen`.
    fn write_to(
        &self,
        index: &ObjectIndex,
        seen: &mut HashSet<ObjectId>,
        sink: &mut String,
    ) -> fmt::Result;

    /// Cycle-safe string form of this object and everything it references.
    fn to_display_string(&self, index: &ObjectIndex) -> String {
        let mut seen = HashSet::from([self.id().clone()]);
        let mut sink = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_to(index, &mut seen, &mut sink);
        sink
    }

    /// Active → Disposed. Releases every subscription on this object.
    /// Returns `false`, doing nothing, if already disposed.
    fn dispose(&mut self, document: &Document) -> bool {
        if !self.core_mut().mark_disposed() {
            return false;
        }
        document.release_object(self.id());
        true
    }
}

/// Writes `value`, expanding a referenced object only on first visit.
pub fn write_value(
    value: &Value,
    index: &ObjectIndex,
    seen: &mut HashSet<ObjectId>,
    sink: &mut String,
) -> fmt::Result {
    match value {
        Value::Json(json) => write!(sink, "{json}"),
        Value::Ref(id) => match index.get(id) {
            Some(object) if seen.contains(id) => write!(sink, "<{}: {}>", object.kind(), id),
            Some(object) => {
                seen.insert(id.clone());
                object.write_to(index, seen, sink)
            }
            None => write!(sink, "<Missing: {id}>"),
        },
    }
}

pub(crate) fn out_of_bounds(index: usize, len: usize) -> StoreError {
    StoreError::OutOfBounds { index, len }
}

// ── CollaborativeObject ────────────────────────────────────────────────────

/// The closed set of collaborative variants.
#[derive(Debug, Clone)]
pub enum CollaborativeObject {
    String(CollaborativeString),
    List(CollaborativeList),
    Map(CollaborativeMap),
}

impl CollaborativeObject {
    pub(crate) fn empty(id: ObjectId, kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::String => CollaborativeObject::String(CollaborativeString::new(id)),
            ObjectKind::List => CollaborativeObject::List(CollaborativeList::new(id)),
            ObjectKind::Map => CollaborativeObject::Map(CollaborativeMap::new(id)),
        }
    }

    fn inner(&self) -> &dyn Collaborative {
        match self {
            CollaborativeObject::String(s) => s,
            CollaborativeObject::List(l) => l,
            CollaborativeObject::Map(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Collaborative {
        match self {
            CollaborativeObject::String(s) => s,
            CollaborativeObject::List(l) => l,
            CollaborativeObject::Map(m) => m,
        }
    }

    pub fn as_string(&self) -> Option<&CollaborativeString> {
        match self {
            CollaborativeObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&CollaborativeList> {
        match self {
            CollaborativeObject::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&CollaborativeMap> {
        match self {
            CollaborativeObject::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl Collaborative for CollaborativeObject {
    fn kind(&self) -> ObjectKind {
        self.inner().kind()
    }

    fn core(&self) -> &ObjectCore {
        self.inner().core()
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        self.inner_mut().core_mut()
    }

    fn consume(
        &mut self,
        document: &mut Document,
        user_id: &str,
        session_id: &str,
        operation: Operation,
    ) -> Result<(), StoreError> {
        self.inner_mut().consume(document, user_id, session_id, operation)
    }

    fn to_initialization(&self) -> Vec<Operation> {
        self.inner().to_initialization()
    }

    fn write_to(
        &self,
        index: &ObjectIndex,
        seen: &mut HashSet<ObjectId>,
        sink: &mut String,
    ) -> fmt::Result {
        self.inner().write_to(index, seen, sink)
    }
}
