use std::collections::{BTreeMap, HashSet};
use std::fmt::{self, Write as _};

use realtime_operation::{ObjectId, ObjectKind, OpComponent, Operation, Value};

use super::{write_value, Collaborative, ObjectCore, ObjectIndex};
use crate::document::Document;
use crate::error::StoreError;
use crate::event::EventKind;

/// Collaborative string-keyed map. Keys iterate in sorted order.
#[derive(Debug, Clone)]
pub struct CollaborativeMap {
    core: ObjectCore,
    entries: BTreeMap<String, Value>,
}

impl CollaborativeMap {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self {
            core: ObjectCore::new(id),
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Collaborative for CollaborativeMap {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Map
    }

    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn consume(
        &mut self,
        document: &mut Document,
        user_id: &str,
        session_id: &str,
        operation: Operation,
    ) -> Result<(), StoreError> {
        self.core.ensure_active()?;
        self.core.ensure_target(&operation.target)?;
        let kind = match operation.component {
            OpComponent::MapSet { key, value } => {
                if self.entries.get(&key) == value.as_ref() {
                    return Ok(());
                }
                let old_value = match &value {
                    Some(v) => self.entries.insert(key.clone(), v.clone()),
                    None => self.entries.remove(&key),
                };
                EventKind::ValueChanged {
                    property: key,
                    old_value,
                    new_value: value,
                }
            }
            other => return Err(self.unsupported(&other)),
        };
        self.fire_change(document, user_id, session_id, kind);
        Ok(())
    }

    fn to_initialization(&self) -> Vec<Operation> {
        self.entries
            .iter()
            .map(|(key, value)| {
                Operation::new(
                    self.id().clone(),
                    OpComponent::MapSet {
                        key: key.clone(),
                        value: Some(value.clone()),
                    },
                )
            })
            .collect()
    }

    fn write_to(
        &self,
        index: &ObjectIndex,
        seen: &mut HashSet<ObjectId>,
        sink: &mut String,
    ) -> fmt::Result {
        sink.write_char('{')?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                sink.write_str(", ")?;
            }
            write!(sink, "{}: ", serde_json::Value::from(key.as_str()))?;
            write_value(value, index, seen, sink)?;
        }
        sink.write_char('}')
    }
}
