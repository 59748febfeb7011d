use crate::models::chats::Message;
use crate::models::users::UserProfile;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

// Everything the server pushes over a live connection. Tag names are the
// wire-level event names the clients subscribe to.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "user-status-update")]
    UserStatusUpdate {
        user_id: Uuid,
        status: PresenceStatus,
    },
    #[serde(rename = "new-message")]
    NewMessage {
        chat_id: Uuid,
        message: Message,
        sender: UserProfile,
    },
    // Room-level mirror of a transport send; payload passes through as-is
    #[serde(rename = "receive-message")]
    ReceiveMessage {
        chat_id: Uuid,
        message: serde_json::Value,
        sender: serde_json::Value,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    #[serde(rename = "user-joined-chat")]
    UserJoinedChat { chat_id: Uuid },
    #[serde(rename = "user-typing")]
    UserTyping {
        user_id: Uuid,
        username: String,
        chat_id: Uuid,
    },
    #[serde(rename = "user-stop-typing")]
    UserStopTyping { user_id: Uuid, chat_id: Uuid },
    #[serde(rename = "messages-read")]
    MessagesRead { chat_id: Uuid, read_by: Uuid },
    #[serde(rename = "unread-count-updated")]
    UnreadCountUpdated { chat_id: Uuid, unread_count: i64 },
    #[serde(rename = "error")]
    Error { message: String },
}

// Transport-level send-message payload, relayed to the chat room without
// touching the store (the REST endpoint owns persistence).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RelayedMessage {
    pub chat_id: Uuid,
    pub message: serde_json::Value,
    #[serde(default)]
    pub sender: serde_json::Value,
    pub recipient_id: Option<Uuid>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TypingPayload {
    pub chat_id: Uuid,
    pub username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserConnection {
    pub connection_id: Uuid,
    pub user_id: Uuid,
    pub sender: tokio::sync::mpsc::UnboundedSender<ServerEvent>,
}

#[derive(Debug, Clone)]
pub struct ChatRoom {
    pub chat_id: Uuid,
    // keyed by connection id, not user id: a room slot belongs to a
    // physical connection
    pub connections: std::sync::Arc<dashmap::DashMap<Uuid, UserConnection>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_wire_tag_names() {
        let event = ServerEvent::UserStatusUpdate {
            user_id: Uuid::new_v4(),
            status: PresenceStatus::Online,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "user-status-update");
        assert_eq!(value["status"], "online");

        let event = ServerEvent::MessagesRead {
            chat_id: Uuid::new_v4(),
            read_by: Uuid::new_v4(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "messages-read");
    }
}
