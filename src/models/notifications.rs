use crate::models::users::UserProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Like,
    Comment,
    Follow,
    FollowRequest,
    FollowAccepted,
    Mention,
    Message,
}

// Created as a side effect of other domain actions (message send here;
// likes/follows/comments elsewhere). recipient != sender is the caller's
// responsibility.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationWithSender {
    #[serde(flatten)]
    pub notification: Notification,
    pub sender: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub related_post_id: Option<Uuid>,
    pub related_chat_id: Option<Uuid>,
    pub message: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
