use realtime_operation::log::OperationLogError;
use realtime_operation::{ObjectId, ObjectKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The object has been disposed.
    #[error("object {id} is disposed")]
    InvalidState { id: ObjectId },
    /// The operation's payload is not one the target variant understands.
    #[error("{kind} object {id} does not support operation {operation}")]
    UnsupportedOperation {
        id: ObjectId,
        kind: ObjectKind,
        operation: &'static str,
    },
    #[error("operation for {target} delivered to object {id}")]
    MisroutedOperation { id: ObjectId, target: ObjectId },
    #[error("object {0} not found")]
    NotFound(ObjectId),
    #[error("object {0} already exists")]
    DuplicateObject(ObjectId),
    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds { index: usize, len: usize },
    #[error("object {id} is a {actual}, expected a {expected}")]
    WrongType {
        id: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },
    #[error("operation log failed: {0}")]
    Log(#[from] OperationLogError),
}
