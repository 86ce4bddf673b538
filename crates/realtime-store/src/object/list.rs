use std::collections::HashSet;
use std::fmt::{self, Write as _};

use realtime_operation::{ObjectId, ObjectKind, OpComponent, Operation, Value};

use super::{out_of_bounds, write_value, Collaborative, ObjectCore, ObjectIndex};
use crate::document::Document;
use crate::error::StoreError;
use crate::event::EventKind;

/// Collaborative ordered list of [`Value`]s.
#[derive(Debug, Clone)]
pub struct CollaborativeList {
    core: ObjectCore,
    values: Vec<Value>,
}

impl CollaborativeList {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self {
            core: ObjectCore::new(id),
            values: Vec::new(),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Collaborative for CollaborativeList {
    fn kind(&self) -> ObjectKind {
        ObjectKind::List
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
        let len = self.values.len();
        let kind = match operation.component {
            OpComponent::ListInsert { index, values } => {
                if index > len {
                    return Err(out_of_bounds(index, len));
                }
                if values.is_empty() {
                    return Ok(());
                }
                self.values.splice(index..index, values.iter().cloned());
                EventKind::ValuesAdded { index, values }
            }
            OpComponent::ListDelete { index, len: count } => {
                let Some(end) = index.checked_add(count).filter(|end| *end <= len) else {
                    return Err(out_of_bounds(index.saturating_add(count), len));
                };
                if count == 0 {
                    return Ok(());
                }
                let values: Vec<Value> = self.values.drain(index..end).collect();
                EventKind::ValuesRemoved { index, values }
            }
            OpComponent::ListSet { index, value } => {
                let Some(slot) = self.values.get_mut(index) else {
                    return Err(out_of_bounds(index, len));
                };
                if *slot == value {
                    return Ok(());
                }
                let old = std::mem::replace(slot, value.clone());
                EventKind::ValuesSet {
                    index,
                    old_values: vec![old],
                    new_values: vec![value],
                }
            }
            other => return Err(self.unsupported(&other)),
        };
        self.fire_change(document, user_id, session_id, kind);
        Ok(())
    }

    fn to_initialization(&self) -> Vec<Operation> {
        if self.values.is_empty() {
            return Vec::new();
        }
        vec![Operation::new(
            self.id().clone(),
            OpComponent::ListInsert {
                index: 0,
                values: self.values.clone(),
            },
        )]
    }

    fn write_to(
        &self,
        index: &ObjectIndex,
        seen: &mut HashSet<ObjectId>,
        sink: &mut String,
    ) -> fmt::Result {
        sink.write_char('[')?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                sink.write_str(", ")?;
            }
            write_value(value, index, seen, sink)?;
        }
        sink.write_char(']')
    }
}
