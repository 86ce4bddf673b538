use std::collections::HashSet;
use std::fmt::{self, Write as _};

use realtime_operation::{ObjectId, ObjectKind, OpComponent, Operation};

use super::{out_of_bounds, Collaborative, ObjectCore, ObjectIndex};
use crate::document::Document;
use crate::error::StoreError;
use crate::event::EventKind;

/// Collaborative text. Indices count `char`s.
#[derive(Debug, Clone)]
pub struct CollaborativeString {
    core: ObjectCore,
    text: String,
}

impl CollaborativeString {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self {
            core: ObjectCore::new(id),
            text: String::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_index)
            .map_or(self.text.len(), |(offset, _)| offset)
    }
}

impl Collaborative for CollaborativeString {
    fn kind(&self) -> ObjectKind {
        ObjectKind::String
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
            OpComponent::StringInsert { index, text } => {
                let len = self.len();
                if index > len {
                    return Err(out_of_bounds(index, len));
                }
                if text.is_empty() {
                    return Ok(());
                }
                let at = self.byte_offset(index);
                self.text.insert_str(at, &text);
                EventKind::TextInserted { index, text }
            }
            OpComponent::StringDelete { index, len } => {
                let total = self.len();
                let end = index.checked_add(len).filter(|end| *end <= total);
                let Some(end) = end else {
                    return Err(out_of_bounds(index.saturating_add(len), total));
                };
                if len == 0 {
                    return Ok(());
                }
                let range = self.byte_offset(index)..self.byte_offset(end);
                let removed: String = self.text.drain(range).collect();
                EventKind::TextDeleted { index, text: removed }
            }
            other => return Err(self.unsupported(&other)),
        };
        self.fire_change(document, user_id, session_id, kind);
        Ok(())
    }

    fn to_initialization(&self) -> Vec<Operation> {
        if self.text.is_empty() {
            return Vec::new();
        }
        vec![Operation::new(
            self.id().clone(),
            OpComponent::StringInsert {
                index: 0,
                text: self.text.clone(),
            },
        )]
    }

    fn write_to(
        &self,
        _index: &ObjectIndex,
        _seen: &mut HashSet<ObjectId>,
        sink: &mut String,
    ) -> fmt::Result {
        write!(sink, "{}", serde_json::Value::from(self.text.as_str()))
    }
}
