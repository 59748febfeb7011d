use crate::models::users::UserProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
}

// One row per unordered pair of users. The pair is stored sorted
// (participant1_id < participant2_id) so the unique constraint holds for
// both orderings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Chat {
    pub id: Uuid,
    pub participant1_id: Uuid,
    pub participant2_id: Uuid,
    pub last_message_at: DateTime<Utc>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participant1_id == user_id || self.participant2_id == user_id
    }

    // The participant that is not `user_id`. Only meaningful when
    // has_participant(user_id) already holds.
    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if self.participant1_id == user_id {
            self.participant2_id
        } else {
            self.participant1_id
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub message_type: MessageType,
    pub media_url: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

// API projection of a message together with its sender's public profile.
#[derive(Debug, Clone, Serialize)]
pub struct MessageWithSender {
    #[serde(flatten)]
    pub message: Message,
    pub sender: Option<UserProfile>,
}

// Text messages need a non-empty body, media messages need a media url.
// The body of a media message may legitimately be empty.
pub fn validate_message_content(
    message_type: MessageType,
    text: &str,
    media_url: Option<&str>,
) -> Result<(), &'static str> {
    match message_type {
        MessageType::Text => {
            if text.trim().is_empty() {
                return Err("Message text is required for text messages");
            }
        }
        MessageType::Image | MessageType::Video => {
            if media_url.map_or(true, |url| url.trim().is_empty()) {
                return Err("Media URL is required for non-text messages");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_requires_body() {
        assert!(validate_message_content(MessageType::Text, "", None).is_err());
        assert!(validate_message_content(MessageType::Text, "   ", None).is_err());
        assert!(validate_message_content(MessageType::Text, "hi", None).is_ok());
    }

    #[test]
    fn media_message_requires_media_url() {
        assert!(validate_message_content(MessageType::Image, "", None).is_err());
        assert!(validate_message_content(MessageType::Image, "", Some("  ")).is_err());
        assert!(
            validate_message_content(MessageType::Image, "", Some("http://x/y.png")).is_ok()
        );
        assert!(validate_message_content(MessageType::Video, "caption", None).is_err());
    }

    #[test]
    fn other_participant_resolves_both_sides() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let chat = Chat {
            id: Uuid::new_v4(),
            participant1_id: a.min(b),
            participant2_id: a.max(b),
            last_message_at: Utc::now(),
            is_archived: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(chat.other_participant(a), b);
        assert_eq!(chat.other_participant(b), a);
        assert!(chat.has_participant(a));
        assert!(!chat.has_participant(Uuid::new_v4()));
    }
}
