use serde::Serialize;
use uuid::Uuid;

// Public projection of a user, the only thing this service reads from the
// users table. Account data and authentication live in the identity service.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub profile_picture: Option<String>,
}
