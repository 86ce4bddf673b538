//! Collaborative document model.
//!
//! # Overview
//!
//! A [`Model`] owns the registry of collaborative objects, the [`Document`]
//! that schedules their events and the [`Bridge`] that sequences local
//! operations. Every object is created through the model's factory methods
//! and addressed by id; objects referencing each other hold ids, never
//! pointers, so the registry is the single owner of every object.
//!
//! Local edits travel `handle → Bridge → pump → consume`: nothing is applied
//! until the bridge has placed the operation in the global order, and the
//! listeners for the resulting events run only after the whole batch pulled
//! by [`Model::pump`] has been applied.
//!
//! Between pumps the model keeps a tentative copy of every object with local
//! operations in flight: the applied state plus those operations. Local edits
//! are validated against, and index into, the tentative copy, so several
//! edits submitted before one pump compose in submission order.

pub mod handles;

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use realtime_operation::log::{deserialize_operations, serialize_operations};
use realtime_operation::{
    generate_object_id, ObjectId, ObjectKind, OpComponent, Operation, SequencedOperation, Value,
};
use tracing::{debug, warn};

use crate::bridge::{Bridge, LocalBridge};
use crate::config::ReplicaConfig;
use crate::document::{Document, EventHandler, HandlerRegistration};
use crate::error::StoreError;
use crate::event::EventType;
use crate::object::{
    Collaborative, CollaborativeList, CollaborativeMap, CollaborativeObject, CollaborativeString,
    ObjectIndex,
};

use self::handles::submit_tentative;

pub use handles::{ListRef, MapRef, StringRef};

pub struct Model {
    config: ReplicaConfig,
    objects: ObjectIndex,
    /// Ids of disposed objects; operations against them are rejected.
    disposed: HashSet<ObjectId>,
    /// Applied state plus local operations not yet pumped, per object.
    tentative: HashMap<ObjectId, CollaborativeObject>,
    document: Document,
    bridge: Box<dyn Bridge>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("config", &self.config)
            .field("objects", &self.objects.len())
            .field("disposed", &self.disposed.len())
            .field("tentative", &self.tentative.len())
            .field("document", &self.document)
            .finish()
    }
}

impl Model {
    /// Creates a model whose operations are sequenced by a [`LocalBridge`].
    pub fn new(config: ReplicaConfig) -> Self {
        let bridge = LocalBridge::new(&config);
        Self::with_bridge(config, Box::new(bridge))
    }

    /// Creates a model with an empty root map.
    ///
    /// The root exists on every replica from the start and is therefore
    /// registered directly instead of through the bridge.
    pub fn with_bridge(config: ReplicaConfig, bridge: Box<dyn Bridge>) -> Self {
        let mut objects = ObjectIndex::new();
        let root = ObjectId::root();
        objects.insert(root.clone(), CollaborativeObject::empty(root, ObjectKind::Map));
        Self {
            config,
            objects,
            disposed: HashSet::new(),
            tentative: HashMap::new(),
            document: Document::new(),
            bridge,
        }
    }

    /// Rebuilds a model by applying `operations` directly, attributed to
    /// `config`. Pairs with [`Model::snapshot`].
    pub fn load(
        config: ReplicaConfig,
        operations: impl IntoIterator<Item = Operation>,
    ) -> Result<Self, StoreError> {
        let mut model = Self::new(config);
        let (user_id, session_id) = (model.config.user_id.clone(), model.config.session_id.clone());
        for operation in operations {
            model.consume(&user_id, &session_id, operation)?;
        }
        model.document.flush();
        debug!(objects = model.objects.len(), "model loaded");
        Ok(model)
    }

    /// Rebuilds a model from a framed operation log.
    pub fn from_operation_log(config: ReplicaConfig, data: &[u8]) -> Result<Self, StoreError> {
        let entries = deserialize_operations(data)?;
        Self::load(config, entries.into_iter().map(|e| e.operation))
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn bridge_mut(&mut self) -> &mut dyn Bridge {
        self.bridge.as_mut()
    }

    pub fn root_id(&self) -> ObjectId {
        ObjectId::root()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn is_disposed(&self, id: &ObjectId) -> bool {
        self.disposed.contains(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.objects.keys()
    }

    pub fn object(&self, id: &ObjectId) -> Result<&CollaborativeObject, StoreError> {
        if self.disposed.contains(id) {
            return Err(StoreError::InvalidState { id: id.clone() });
        }
        self.objects
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    pub fn get_string(&self, id: &ObjectId) -> Result<&CollaborativeString, StoreError> {
        let object = self.object(id)?;
        object
            .as_string()
            .ok_or_else(|| wrong_type(id, ObjectKind::String, object))
    }

    pub fn get_list(&self, id: &ObjectId) -> Result<&CollaborativeList, StoreError> {
        let object = self.object(id)?;
        object
            .as_list()
            .ok_or_else(|| wrong_type(id, ObjectKind::List, object))
    }

    pub fn get_map(&self, id: &ObjectId) -> Result<&CollaborativeMap, StoreError> {
        let object = self.object(id)?;
        object
            .as_map()
            .ok_or_else(|| wrong_type(id, ObjectKind::Map, object))
    }

    // ── Factory ───────────────────────────────────────────────────────────

    /// Submits the creation of a string holding `initial`.
    ///
    /// The returned id is registered once the bridge has sequenced the
    /// creation and [`Model::pump`] has applied it. Until then it can already
    /// be edited through a handle.
    pub fn create_string(&mut self, initial: &str) -> Result<ObjectId, StoreError> {
        let mut init = Vec::new();
        if !initial.is_empty() {
            init.push(OpComponent::StringInsert {
                index: 0,
                text: initial.to_string(),
            });
        }
        self.create(ObjectKind::String, init)
    }

    pub fn create_list(&mut self, values: Vec<Value>) -> Result<ObjectId, StoreError> {
        let mut init = Vec::new();
        if !values.is_empty() {
            init.push(OpComponent::ListInsert { index: 0, values });
        }
        self.create(ObjectKind::List, init)
    }

    pub fn create_map<K>(
        &mut self,
        entries: impl IntoIterator<Item = (K, Value)>,
    ) -> Result<ObjectId, StoreError>
    where
        K: Into<String>,
    {
        let init = entries
            .into_iter()
            .map(|(key, value)| OpComponent::MapSet {
                key: key.into(),
                value: Some(value),
            })
            .collect();
        self.create(ObjectKind::Map, init)
    }

    fn create(&mut self, kind: ObjectKind, init: Vec<OpComponent>) -> Result<ObjectId, StoreError> {
        let id = generate_object_id(&self.config.session_id);
        debug!(object_id = %id, %kind, "object creation submitted");
        self.bridge.consume_and_submit(Operation::create(id.clone(), kind))?;
        let mut tentative = CollaborativeObject::empty(id.clone(), kind);
        for component in init {
            submit_tentative(
                &mut tentative,
                self.bridge.as_mut(),
                &self.config,
                Operation::new(id.clone(), component),
            )?;
        }
        self.tentative.insert(id.clone(), tentative);
        Ok(id)
    }

    fn register(&mut self, id: ObjectId, kind: ObjectKind) -> Result<(), StoreError> {
        if self.disposed.contains(&id) {
            return Err(StoreError::InvalidState { id });
        }
        if self.objects.contains_key(&id) {
            return Err(StoreError::DuplicateObject(id));
        }
        debug!(object_id = %id, %kind, "object registered");
        self.objects
            .insert(id.clone(), CollaborativeObject::empty(id, kind));
        Ok(())
    }

    // ── Operation flow ────────────────────────────────────────────────────

    /// Submits a local operation for its target object.
    ///
    /// The operation is checked against the target's tentative state first;
    /// one that would be rejected there is not submitted.
    pub fn consume_and_submit(&mut self, operation: Operation) -> Result<(), StoreError> {
        if self.disposed.contains(&operation.target) {
            return Err(StoreError::InvalidState { id: operation.target });
        }
        let tentative = tentative_entry(&mut self.tentative, &self.objects, &operation.target)?;
        submit_tentative(tentative, self.bridge.as_mut(), &self.config, operation)
    }

    /// Applies one operation to its target. Creation operations register a
    /// new object; everything else is routed to the target's `consume`.
    ///
    /// Events are scheduled, not dispatched; see [`Model::flush_events`].
    pub fn consume(
        &mut self,
        user_id: &str,
        session_id: &str,
        operation: Operation,
    ) -> Result<(), StoreError> {
        if let OpComponent::Create { kind } = operation.component {
            return self.register(operation.target, kind);
        }
        if self.disposed.contains(&operation.target) {
            return Err(StoreError::InvalidState { id: operation.target });
        }
        let object = self
            .objects
            .get_mut(&operation.target)
            .ok_or_else(|| StoreError::NotFound(operation.target.clone()))?;
        object.consume(&mut self.document, user_id, session_id, operation)
    }

    pub fn apply(&mut self, sequenced: SequencedOperation) -> Result<(), StoreError> {
        debug!(
            seq = sequenced.seq,
            session_id = %sequenced.session_id,
            op = %sequenced.operation,
            "applying sequenced operation"
        );
        self.consume(&sequenced.user_id, &sequenced.session_id, sequenced.operation)
    }

    /// Applies every operation the bridge has ready, in delivery order, then
    /// dispatches the resulting events. Returns the number applied.
    ///
    /// Stops at the first rejected operation; events of the operations
    /// applied before it are still dispatched and the rest stay queued.
    ///
    /// Once the bridge has nothing left to deliver every local operation has
    /// been applied, and the tentative copies are dropped.
    pub fn pump(&mut self) -> Result<usize, StoreError> {
        let mut applied = 0;
        while let Some(next) = self.bridge.poll() {
            let seq = next.seq;
            if let Err(err) = self.apply(next) {
                warn!(seq, error = %err, "sequenced operation rejected");
                self.document.flush();
                return Err(err);
            }
            applied += 1;
        }
        self.tentative.clear();
        self.document.flush();
        Ok(applied)
    }

    /// Dispatches every scheduled event.
    pub fn flush_events(&mut self) -> usize {
        self.document.flush()
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Disposes `id` and removes it from the registry, returning the disposed
    /// object. Disposing an id twice returns `Ok(None)`.
    pub fn dispose(&mut self, id: &ObjectId) -> Result<Option<CollaborativeObject>, StoreError> {
        if self.disposed.contains(id) {
            return Ok(None);
        }
        let mut object = self
            .objects
            .shift_remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        self.tentative.remove(id);
        object.dispose(&self.document);
        self.disposed.insert(id.clone());
        debug!(object_id = %id, "object disposed");
        Ok(Some(object))
    }

    // ── Events ────────────────────────────────────────────────────────────

    pub fn add_event_listener(
        &self,
        id: &ObjectId,
        event_type: EventType,
        handler: EventHandler,
        capture: bool,
    ) -> Result<HandlerRegistration, StoreError> {
        self.object(id)?
            .add_event_listener(&self.document, event_type, handler, capture)
    }

    pub fn add_object_changed_listener(
        &self,
        id: &ObjectId,
        handler: EventHandler,
    ) -> Result<HandlerRegistration, StoreError> {
        self.object(id)?
            .add_object_changed_listener(&self.document, handler)
    }

    // ── Serialization ─────────────────────────────────────────────────────

    /// Cycle-safe string form of `id` and the objects it references.
    pub fn describe(&self, id: &ObjectId) -> Result<String, StoreError> {
        Ok(self.object(id)?.to_display_string(&self.objects))
    }

    /// Operations that rebuild every live object on a fresh model: creation
    /// of each non-root object, followed by each object's initialization.
    pub fn snapshot(&self) -> Vec<Operation> {
        let creates = self
            .objects
            .values()
            .filter(|object| !object.id().is_root())
            .map(|object| Operation::create(object.id().clone(), object.kind()));
        let inits = self
            .objects
            .values()
            .flat_map(|object| object.to_initialization());
        creates.chain(inits).collect()
    }

    /// [`Model::snapshot`] encoded as a framed operation log.
    pub fn to_operation_log(&self) -> Result<Vec<u8>, StoreError> {
        let entries: Vec<SequencedOperation> = self
            .snapshot()
            .into_iter()
            .zip(1u64..)
            .map(|(operation, seq)| SequencedOperation {
                seq,
                user_id: self.config.user_id.clone(),
                session_id: self.config.session_id.clone(),
                operation,
            })
            .collect();
        Ok(serialize_operations(&entries)?)
    }

    // ── Handles ───────────────────────────────────────────────────────────

    pub fn string(&mut self, id: &ObjectId) -> Result<StringRef<'_>, StoreError> {
        if self.disposed.contains(id) {
            return Err(StoreError::InvalidState { id: id.clone() });
        }
        match tentative_entry(&mut self.tentative, &self.objects, id)? {
            CollaborativeObject::String(s) => {
                Ok(StringRef::new(s, self.bridge.as_mut(), &self.config))
            }
            other => Err(wrong_type(id, ObjectKind::String, other)),
        }
    }

    pub fn list(&mut self, id: &ObjectId) -> Result<ListRef<'_>, StoreError> {
        if self.disposed.contains(id) {
            return Err(StoreError::InvalidState { id: id.clone() });
        }
        match tentative_entry(&mut self.tentative, &self.objects, id)? {
            CollaborativeObject::List(l) => {
                Ok(ListRef::new(l, self.bridge.as_mut(), &self.config))
            }
            other => Err(wrong_type(id, ObjectKind::List, other)),
        }
    }

    pub fn map(&mut self, id: &ObjectId) -> Result<MapRef<'_>, StoreError> {
        if self.disposed.contains(id) {
            return Err(StoreError::InvalidState { id: id.clone() });
        }
        match tentative_entry(&mut self.tentative, &self.objects, id)? {
            CollaborativeObject::Map(m) => {
                Ok(MapRef::new(m, self.bridge.as_mut(), &self.config))
            }
            other => Err(wrong_type(id, ObjectKind::Map, other)),
        }
    }

    pub fn root(&mut self) -> Result<MapRef<'_>, StoreError> {
        self.map(&ObjectId::root())
    }
}

/// The tentative copy of `id`, started from the applied object on first use.
fn tentative_entry<'m>(
    tentative: &'m mut HashMap<ObjectId, CollaborativeObject>,
    objects: &ObjectIndex,
    id: &ObjectId,
) -> Result<&'m mut CollaborativeObject, StoreError> {
    match tentative.entry(id.clone()) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => {
            let applied = objects
                .get(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            Ok(entry.insert(applied.clone()))
        }
    }
}

fn wrong_type(id: &ObjectId, expected: ObjectKind, actual: &CollaborativeObject) -> StoreError {
    StoreError::WrongType {
        id: id.clone(),
        expected,
        actual: actual.kind(),
    }
}
