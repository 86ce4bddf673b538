//! Realtime collaborative object store.
//!
//! Replicas share strings, lists and maps whose every change flows through a
//! sequenced operation stream:
//!
//! - a local edit becomes an [`Operation`] handed to a [`Bridge`];
//! - the bridge places it in the global order and hands it back;
//! - [`Model::pump`] feeds it through the target object's `consume`, the only
//!   path that mutates state;
//! - resulting events are queued on the [`Document`] and dispatched after the
//!   batch has been applied.
//!
//! ```
//! use realtime_store::{Model, ReplicaConfig};
//!
//! let mut model = Model::new(ReplicaConfig::new("alice"));
//! let title = model.create_string("Hello").unwrap();
//! model.pump().unwrap();
//!
//! model.string(&title).unwrap().append(", world").unwrap();
//! assert_eq!(model.get_string(&title).unwrap().text(), "Hello");
//!
//! model.pump().unwrap();
//! assert_eq!(model.get_string(&title).unwrap().text(), "Hello, world");
//! ```

pub mod bridge;
pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod model;
pub mod object;

pub use bridge::{Bridge, LocalBridge, Sequencer, SequencerBridge};
pub use config::ReplicaConfig;
pub use document::{Document, EventHandler, HandlerRegistration};
pub use error::StoreError;
pub use event::{BaseModelEvent, EventKind, EventType, ObjectChangedEvent};
pub use model::{ListRef, MapRef, Model, StringRef};
pub use object::{
    Collaborative, CollaborativeList, CollaborativeMap, CollaborativeObject, CollaborativeString,
    LifecycleState, ObjectCore, ObjectIndex,
};

pub use realtime_operation::{ObjectId, ObjectKind, OpComponent, Operation, SequencedOperation, Value};
