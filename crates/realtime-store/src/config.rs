use realtime_operation::generate_session_id;
use serde::{Deserialize, Serialize};

/// Identity of the local replica.
///
/// `user_id` and `session_id` are attached to every operation this replica
/// submits and surface in the events those operations produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    pub user_id: String,
    #[serde(default = "generate_session_id")]
    pub session_id: String,
}

impl ReplicaConfig {
    /// Configuration for `user_id` with a freshly generated session.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: generate_session_id(),
        }
    }

    pub fn with_session(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self::new("anonymous")
    }
}
