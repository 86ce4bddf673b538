//! Operation primitives for realtime collaborative objects.
//!
//! Every mutation of a collaborative object is described by an [`Operation`]:
//! the id of the object it targets plus a typed [`OpComponent`] payload.
//! Operations are the unit of sequencing, replay and persistence.

pub mod id;
pub mod log;
pub mod operation;
pub mod value;

pub use id::{generate_object_id, generate_session_id, ObjectId, ROOT_ID};
pub use operation::{ObjectKind, OpComponent, Operation, SequencedOperation};
pub use value::Value;

/// Returns the crate version at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
