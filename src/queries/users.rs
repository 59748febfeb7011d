use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::users::UserProfile;

pub async fn get_user_profile_by_id(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AppResult<Option<UserProfile>> {
    let profile = sqlx::query_as::<_, UserProfile>(
        "SELECT id, username, full_name, profile_picture FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database query error (get_user_profile_by_id): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error fetching user profile"))
    })?;

    Ok(profile)
}
