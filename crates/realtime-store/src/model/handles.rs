//! Typed editing handles.
//!
//! A handle borrows the model's tentative copy of one object together with
//! the bridge. The tentative copy is the last applied state plus every local
//! operation submitted since; mutators validate against it and compute their
//! indices from it, so consecutive edits between pumps compose in submission
//! order. The real object changes only when [`Model::pump`] applies the
//! sequenced operations.
//!
//! Reads through a handle (via `Deref`) see the tentative state.
//!
//! [`Model::pump`]: super::Model::pump

use std::ops::Deref;

use realtime_operation::{ObjectId, OpComponent, Operation, Value};

use crate::bridge::Bridge;
use crate::config::ReplicaConfig;
use crate::document::Document;
use crate::error::StoreError;
use crate::object::{Collaborative, CollaborativeList, CollaborativeMap, CollaborativeString};

fn check_range(index: usize, len: usize, total: usize) -> Result<(), StoreError> {
    match index.checked_add(len) {
        Some(end) if end <= total => Ok(()),
        _ => Err(StoreError::OutOfBounds {
            index: index.saturating_add(len),
            len: total,
        }),
    }
}

/// Applies `operation` to the tentative copy, then hands it to the bridge.
///
/// The operation goes through the object's own `consume`, against a scratch
/// document whose events are dropped. The copy is replaced only once the
/// bridge has accepted the operation, so a rejection anywhere leaves both
/// the copy and the bridge untouched.
pub(crate) fn submit_tentative<C>(
    tentative: &mut C,
    bridge: &mut dyn Bridge,
    config: &ReplicaConfig,
    operation: Operation,
) -> Result<(), StoreError>
where
    C: Collaborative + Clone,
{
    let mut next = tentative.clone();
    let mut scratch = Document::new();
    next.consume(
        &mut scratch,
        &config.user_id,
        &config.session_id,
        operation.clone(),
    )?;
    tentative.consume_and_submit(bridge, operation)?;
    *tentative = next;
    Ok(())
}

// ── StringRef ──────────────────────────────────────────────────────────────

pub struct StringRef<'a> {
    string: &'a mut CollaborativeString,
    bridge: &'a mut dyn Bridge,
    config: &'a ReplicaConfig,
}

impl<'a> StringRef<'a> {
    pub(crate) fn new(
        string: &'a mut CollaborativeString,
        bridge: &'a mut dyn Bridge,
        config: &'a ReplicaConfig,
    ) -> Self {
        Self {
            string,
            bridge,
            config,
        }
    }

    pub fn insert(&mut self, index: usize, text: &str) -> Result<(), StoreError> {
        check_range(index, 0, self.string.len())?;
        if text.is_empty() {
            return Ok(());
        }
        self.submit(OpComponent::StringInsert {
            index,
            text: text.to_string(),
        })
    }

    pub fn append(&mut self, text: &str) -> Result<(), StoreError> {
        let end = self.string.len();
        self.insert(end, text)
    }

    pub fn delete(&mut self, index: usize, len: usize) -> Result<(), StoreError> {
        check_range(index, len, self.string.len())?;
        if len == 0 {
            return Ok(());
        }
        self.submit(OpComponent::StringDelete { index, len })
    }

    /// Replaces the whole text.
    pub fn set_text(&mut self, text: &str) -> Result<(), StoreError> {
        let len = self.string.len();
        self.delete(0, len)?;
        self.insert(0, text)
    }

    fn submit(&mut self, component: OpComponent) -> Result<(), StoreError> {
        let operation = Operation::new(self.string.id().clone(), component);
        submit_tentative(&mut *self.string, &mut *self.bridge, self.config, operation)
    }
}

impl Deref for StringRef<'_> {
    type Target = CollaborativeString;

    fn deref(&self) -> &Self::Target {
        &*self.string
    }
}

// ── ListRef ────────────────────────────────────────────────────────────────

pub struct ListRef<'a> {
    list: &'a mut CollaborativeList,
    bridge: &'a mut dyn Bridge,
    config: &'a ReplicaConfig,
}

impl<'a> ListRef<'a> {
    pub(crate) fn new(
        list: &'a mut CollaborativeList,
        bridge: &'a mut dyn Bridge,
        config: &'a ReplicaConfig,
    ) -> Self {
        Self {
            list,
            bridge,
            config,
        }
    }

    pub fn insert(&mut self, index: usize, values: Vec<Value>) -> Result<(), StoreError> {
        check_range(index, 0, self.list.len())?;
        if values.is_empty() {
            return Ok(());
        }
        self.submit(OpComponent::ListInsert { index, values })
    }

    pub fn push(&mut self, value: impl Into<Value>) -> Result<(), StoreError> {
        let end = self.list.len();
        self.insert(end, vec![value.into()])
    }

    pub fn delete(&mut self, index: usize, len: usize) -> Result<(), StoreError> {
        check_range(index, len, self.list.len())?;
        if len == 0 {
            return Ok(());
        }
        self.submit(OpComponent::ListDelete { index, len })
    }

    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> Result<(), StoreError> {
        let len = self.list.len();
        if index >= len {
            return Err(StoreError::OutOfBounds { index, len });
        }
        self.submit(OpComponent::ListSet {
            index,
            value: value.into(),
        })
    }

    /// Removes every element. Clearing an already empty list submits nothing.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        let len = self.list.len();
        self.delete(0, len)
    }

    fn submit(&mut self, component: OpComponent) -> Result<(), StoreError> {
        let operation = Operation::new(self.list.id().clone(), component);
        submit_tentative(&mut *self.list, &mut *self.bridge, self.config, operation)
    }
}

impl Deref for ListRef<'_> {
    type Target = CollaborativeList;

    fn deref(&self) -> &Self::Target {
        &*self.list
    }
}

// ── MapRef ─────────────────────────────────────────────────────────────────

pub struct MapRef<'a> {
    map: &'a mut CollaborativeMap,
    bridge: &'a mut dyn Bridge,
    config: &'a ReplicaConfig,
}

impl<'a> MapRef<'a> {
    pub(crate) fn new(
        map: &'a mut CollaborativeMap,
        bridge: &'a mut dyn Bridge,
        config: &'a ReplicaConfig,
    ) -> Self {
        Self {
            map,
            bridge,
            config,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), StoreError> {
        self.submit(OpComponent::MapSet {
            key: key.into(),
            value: Some(value.into()),
        })
    }

    /// Links `id` under `key`.
    pub fn set_ref(&mut self, key: impl Into<String>, id: &ObjectId) -> Result<(), StoreError> {
        self.set(key, Value::Ref(id.clone()))
    }

    /// Removes `key`. Removing an absent key submits nothing.
    pub fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if !self.map.contains_key(key) {
            return Ok(());
        }
        self.submit(OpComponent::MapSet {
            key: key.to_string(),
            value: None,
        })
    }

    fn submit(&mut self, component: OpComponent) -> Result<(), StoreError> {
        let operation = Operation::new(self.map.id().clone(), component);
        submit_tentative(&mut *self.map, &mut *self.bridge, self.config, operation)
    }
}

impl Deref for MapRef<'_> {
    type Target = CollaborativeMap;

    fn deref(&self) -> &Self::Target {
        &*self.map
    }
}
