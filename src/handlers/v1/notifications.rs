use std::collections::HashMap;

use anyhow::anyhow;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    models::{notifications::NotificationWithSender, users::UserProfile},
    queries::{
        notifications::{count_unread_notifications, list_notifications, mark_notifications_read},
        users::get_user_profile_by_id,
    },
};

use super::{clamp_pagination, session_user_id, PaginationQuery};

pub async fn get_notifications(
    State(state): State<AppState>,
    session: Session,
    Query(pagination): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user_id(&session).await?;
    let (_page, limit, offset) = clamp_pagination(&pagination, 20);

    let mut conn =
        state.db_pool.acquire().await.map_err(|_| {
            AppError::InternalServerError(anyhow!("Failed to get connection"))
        })?;

    let notifications = list_notifications(&mut conn, user_id, limit, offset).await?;
    let unread_count = count_unread_notifications(&mut conn, user_id).await?;

    // a page of notifications usually repeats a handful of senders
    let mut sender_cache: HashMap<Uuid, Option<UserProfile>> = HashMap::new();
    let mut formatted = Vec::with_capacity(notifications.len());
    for notification in notifications {
        let sender = match sender_cache.get(&notification.sender_id) {
            Some(cached) => cached.clone(),
            None => {
                let profile = get_user_profile_by_id(&mut conn, notification.sender_id).await?;
                sender_cache.insert(notification.sender_id, profile.clone());
                profile
            }
        };
        formatted.push(NotificationWithSender {
            notification,
            sender,
        });
    }

    Ok(Json(json!({
        "notifications": formatted,
        "unread_count": unread_count,
    })))
}

#[derive(serde::Deserialize, Validate)]
pub struct MarkNotificationsReadPayload {
    #[validate(length(min = 1, message = "notification_ids cannot be empty"))]
    pub notification_ids: Vec<Uuid>,
}

// Bulk mark-as-read. Ids that do not belong to the caller are skipped
// silently; the response reports how many rows actually changed.
pub async fn mark_notifications_as_read(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<MarkNotificationsReadPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user_id(&session).await?;

    payload
        .validate()
        .map_err(|e| AppError::Validation(anyhow!("Invalid payload: {}", e)))?;

    let mut conn =
        state.db_pool.acquire().await.map_err(|_| {
            AppError::InternalServerError(anyhow!("Failed to get connection"))
        })?;

    let updated = mark_notifications_read(&mut conn, user_id, &payload.notification_ids).await?;

    Ok(Json(json!({ "updated": updated })))
}
