use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::notifications::{Notification, NotificationType};

pub async fn insert_notification(
    conn: &mut PgConnection,
    recipient_id: Uuid,
    sender_id: Uuid,
    notification_type: NotificationType,
    related_post_id: Option<Uuid>,
    related_chat_id: Option<Uuid>,
    message: &str,
) -> AppResult<Notification> {
    let notification = sqlx::query_as::<_, Notification>(
        "INSERT INTO notifications (id, recipient_id, sender_id, type, related_post_id, related_chat_id, message)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(recipient_id)
    .bind(sender_id)
    .bind(notification_type)
    .bind(related_post_id)
    .bind(related_chat_id)
    .bind(message)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database insert error (insert_notification): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error inserting notification"))
    })?;

    Ok(notification)
}

pub async fn list_notifications(
    conn: &mut PgConnection,
    recipient_id: Uuid,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<Notification>> {
    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications
         WHERE recipient_id = $1
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(recipient_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database query error (list_notifications): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error listing notifications"))
    })?;

    Ok(notifications)
}

pub async fn count_unread_notifications(
    conn: &mut PgConnection,
    recipient_id: Uuid,
) -> AppResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE",
    )
    .bind(recipient_id)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database query error (count_unread_notifications): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!(
            "Database error counting unread notifications"
        ))
    })?;

    Ok(count)
}

// Only touches rows owned by the recipient; ids belonging to someone else
// are silently skipped rather than rejected.
pub async fn mark_notifications_read(
    conn: &mut PgConnection,
    recipient_id: Uuid,
    ids: &[Uuid],
) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE, read_at = NOW()
         WHERE recipient_id = $1 AND id = ANY($2) AND is_read = FALSE",
    )
    .bind(recipient_id)
    .bind(ids)
    .execute(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database update error (mark_notifications_read): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!(
            "Database error marking notifications read"
        ))
    })?;

    Ok(result.rows_affected())
}
