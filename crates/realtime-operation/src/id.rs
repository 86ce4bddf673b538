//! Object and session identifiers.

use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Id of the root map every model is created with.
pub const ROOT_ID: &str = "root";

/// Length of the random part of generated ids.
const ID_SUFFIX_LEN: usize = 12;

/// Identifier of a collaborative object, unique within its model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn root() -> Self {
        Self(ROOT_ID.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generates a random session id.
pub fn generate_session_id() -> String {
    random_suffix(ID_SUFFIX_LEN)
}

/// Generates an object id scoped to `session_id`.
///
/// The session prefix keeps ids created concurrently on different replicas
/// from colliding; the random suffix keeps ids from one session distinct.
pub fn generate_object_id(session_id: &str) -> ObjectId {
    ObjectId(format!("{session_id}.{}", random_suffix(ID_SUFFIX_LEN)))
}
