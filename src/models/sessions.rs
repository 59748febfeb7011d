use serde::{Deserialize, Serialize};

// Written into the session by the identity service at login; this backend
// only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: uuid::Uuid,
}
