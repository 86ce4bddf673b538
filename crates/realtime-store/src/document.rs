//! Document-level listener registry and deferred event scheduler.
//!
//! Events are never dispatched while they are being produced. Objects hand
//! them to [`Document::schedule_event`], which only queues them; listeners run
//! when [`Document::flush`] drains the queue, after the operation that
//! produced the events has been fully applied.
//!
//! Dispatch order for one event: capture-phase listeners of the target, then
//! bubble-phase listeners, each group in subscription order. Events are
//! dispatched in the order they were scheduled.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use realtime_operation::ObjectId;
use tracing::{debug, trace};

use crate::event::{BaseModelEvent, EventType};

// ── EventHandler ───────────────────────────────────────────────────────────

/// A shareable event callback.
///
/// Handler identity is the identity of the underlying closure allocation:
/// clones of one `EventHandler` are the same handler, two handlers built from
/// identical closures are not.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&BaseModelEvent)>);

impl EventHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&BaseModelEvent) + 'static,
    {
        Self(Rc::new(handler))
    }

    fn call(&self, event: &BaseModelEvent) {
        (self.0)(event)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl Eq for EventHandler {}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

// ── Listener table ─────────────────────────────────────────────────────────

struct Subscription {
    key: u64,
    object_id: ObjectId,
    event_type: EventType,
    handler: EventHandler,
    capture: bool,
}

#[derive(Default)]
struct ListenerTable {
    next_key: u64,
    subscriptions: Vec<Subscription>,
}

impl ListenerTable {
    fn remove(&mut self, key: u64) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.key != key);
        self.subscriptions.len() != before
    }

    fn handlers_for(&self, object_id: &ObjectId, event_type: EventType) -> Vec<EventHandler> {
        let matching: Vec<&Subscription> = self
            .subscriptions
            .iter()
            .filter(|s| s.event_type == event_type && &s.object_id == object_id)
            .collect();
        let (capture, bubble): (Vec<_>, Vec<_>) = matching.into_iter().partition(|s| s.capture);
        capture
            .into_iter()
            .chain(bubble)
            .map(|s| s.handler.clone())
            .collect()
    }
}

// ── HandlerRegistration ────────────────────────────────────────────────────

/// Handle to one subscription.
///
/// Dropping the handle keeps the subscription alive; call
/// [`HandlerRegistration::unregister`] to remove it.
#[derive(Debug, Clone)]
pub struct HandlerRegistration {
    table: Weak<RefCell<ListenerTable>>,
    key: u64,
}

impl HandlerRegistration {
    /// Removes the subscription. Returns `false` if it was already gone.
    pub fn unregister(&self) -> bool {
        match self.table.upgrade() {
            Some(table) => table.borrow_mut().remove(self.key),
            None => false,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.table
            .upgrade()
            .is_some_and(|table| table.borrow().subscriptions.iter().any(|s| s.key == self.key))
    }
}

impl fmt::Debug for ListenerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerTable")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

// ── Document ───────────────────────────────────────────────────────────────

/// Listener registry plus the queue of events awaiting dispatch.
///
/// Listeners are registered through a live object, never on the document
/// directly:
///
/// ```compile_fail
/// use realtime_store::{Document, EventHandler, EventType, ObjectId};
///
/// let document = Document::new();
/// document.add_event_listener(
///     &ObjectId::from("gone"),
///     EventType::ObjectChanged,
///     EventHandler::new(|_| {}),
///     false,
/// );
/// ```
#[derive(Debug, Default)]
pub struct Document {
    listeners: Rc<RefCell<ListenerTable>>,
    queue: VecDeque<BaseModelEvent>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events of `event_type` on `object_id`.
    ///
    /// Registering a handler that is already subscribed for the same object
    /// and type stores nothing new and returns a handle to the existing
    /// subscription.
    ///
    /// The document does not know which objects are live; callers outside
    /// the crate go through [`Collaborative::add_event_listener`] or
    /// [`Model::add_event_listener`](crate::Model::add_event_listener), which
    /// reject disposed objects.
    ///
    /// [`Collaborative::add_event_listener`]: crate::Collaborative::add_event_listener
    pub(crate) fn add_event_listener(
        &self,
        object_id: &ObjectId,
        event_type: EventType,
        handler: EventHandler,
        capture: bool,
    ) -> HandlerRegistration {
        let mut table = self.listeners.borrow_mut();
        let existing = table.subscriptions.iter().find(|s| {
            s.event_type == event_type && &s.object_id == object_id && s.handler == handler
        });
        let key = match existing {
            Some(s) => s.key,
            None => {
                let key = table.next_key;
                table.next_key = table.next_key.saturating_add(1);
                table.subscriptions.push(Subscription {
                    key,
                    object_id: object_id.clone(),
                    event_type,
                    handler,
                    capture,
                });
                trace!(object_id = %object_id, %event_type, capture, key, "listener added");
                key
            }
        };
        HandlerRegistration {
            table: Rc::downgrade(&self.listeners),
            key,
        }
    }

    /// Drops every subscription registered for `object_id`.
    pub fn release_object(&self, object_id: &ObjectId) -> usize {
        let mut table = self.listeners.borrow_mut();
        let before = table.subscriptions.len();
        table.subscriptions.retain(|s| &s.object_id != object_id);
        let released = before - table.subscriptions.len();
        debug!(object_id = %object_id, released, "listeners released");
        released
    }

    pub fn listener_count(&self, object_id: &ObjectId) -> usize {
        self.listeners
            .borrow()
            .subscriptions
            .iter()
            .filter(|s| &s.object_id == object_id)
            .count()
    }

    /// Queues `event` for deferred delivery.
    pub fn schedule_event(&mut self, event: BaseModelEvent) {
        trace!(target_id = %event.target(), event_type = %event.event_type(), "event scheduled");
        self.queue.push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Delivers every queued event in scheduling order. Returns the number of
    /// events drained.
    ///
    /// The listener table is not borrowed while handlers run, so a handler may
    /// unregister itself or others; such changes take effect from the next
    /// event on.
    pub fn flush(&mut self) -> usize {
        let mut drained = 0;
        while let Some(event) = self.queue.pop_front() {
            let handlers = self
                .listeners
                .borrow()
                .handlers_for(event.target(), event.event_type());
            trace!(
                target_id = %event.target(),
                event_type = %event.event_type(),
                handlers = handlers.len(),
                "dispatching event"
            );
            for handler in &handlers {
                handler.call(&event);
            }
            drained += 1;
        }
        if drained > 0 {
            debug!(events = drained, "event queue flushed");
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::event::EventKind;

    fn inserted(target: &str) -> BaseModelEvent {
        BaseModelEvent::new(
            ObjectId::from(target),
            "u",
            "s",
            EventKind::TextInserted { index: 0, text: "x".into() },
        )
    }

    #[test]
    fn capture_listeners_run_before_bubble_listeners() {
        let mut doc = Document::new();
        let id = ObjectId::from("a");
        let log = Rc::new(RefCell::new(Vec::new()));

        for (name, capture) in [("bubble-1", false), ("capture", true), ("bubble-2", false)] {
            let log = Rc::clone(&log);
            doc.add_event_listener(
                &id,
                EventType::TextInserted,
                EventHandler::new(move |_| log.borrow_mut().push(name)),
                capture,
            );
        }

        doc.schedule_event(inserted("a"));
        assert!(log.borrow().is_empty());
        assert_eq!(doc.flush(), 1);
        assert_eq!(*log.borrow(), vec!["capture", "bubble-1", "bubble-2"]);
    }

    #[test]
    fn events_for_other_objects_are_not_delivered() {
        let mut doc = Document::new();
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        doc.add_event_listener(
            &ObjectId::from("a"),
            EventType::TextInserted,
            EventHandler::new(move |_| *h.borrow_mut() += 1),
            false,
        );

        doc.schedule_event(inserted("b"));
        doc.flush();
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn handler_may_unregister_during_dispatch() {
        let mut doc = Document::new();
        let id = ObjectId::from("a");
        let slot: Rc<RefCell<Option<HandlerRegistration>>> = Rc::new(RefCell::new(None));
        let hits = Rc::new(RefCell::new(0));

        let (s, h) = (Rc::clone(&slot), Rc::clone(&hits));
        let reg = doc.add_event_listener(
            &id,
            EventType::TextInserted,
            EventHandler::new(move |_| {
                *h.borrow_mut() += 1;
                if let Some(reg) = s.borrow().as_ref() {
                    reg.unregister();
                }
            }),
            false,
        );
        *slot.borrow_mut() = Some(reg);

        doc.schedule_event(inserted("a"));
        doc.schedule_event(inserted("a"));
        assert_eq!(doc.flush(), 2);
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(doc.listener_count(&id), 0);
    }

    #[test]
    fn registration_outliving_document_is_inert() {
        let doc = Document::new();
        let reg = doc.add_event_listener(
            &ObjectId::from("a"),
            EventType::ObjectChanged,
            EventHandler::new(|_| {}),
            false,
        );
        drop(doc);
        assert!(!reg.is_registered());
        assert!(!reg.unregister());
    }
}
