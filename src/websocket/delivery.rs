use std::fmt::Display;

use chrono::Utc;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::chats::{Chat, Message};
use crate::models::notifications::NotificationType;
use crate::models::users::UserProfile;
use crate::models::websocket::{RelayedMessage, ServerEvent};
use crate::queries::notifications::insert_notification;
use crate::websocket::presence::PresenceRegistry;

// Failures here are advisory. They are logged and swallowed by the callers;
// the persisted write that triggered the push has already succeeded.
#[derive(Debug)]
pub enum DeliveryError {
    ChannelClosed { user_id: Uuid },
}

impl Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::ChannelClosed { user_id } => {
                write!(f, "live connection for user {} is closed", user_id)
            }
        }
    }
}

// Push one event to a user's registered connection. Ok(true) means the event
// was handed to the connection's channel, Ok(false) means the user is
// offline and nothing was sent. A closed channel unregisters the stale entry.
pub fn push_to_user(
    presence: &PresenceRegistry,
    user_id: Uuid,
    event: ServerEvent,
) -> Result<bool, DeliveryError> {
    let Some(connection) = presence.lookup(user_id) else {
        return Ok(false);
    };

    match connection.sender.send(event) {
        Ok(()) => Ok(true),
        Err(_) => {
            presence.unregister(connection.connection_id);
            Err(DeliveryError::ChannelClosed { user_id })
        }
    }
}

// Everything that follows a persisted message send: the durable notification
// row and the best-effort live push. The message write is authoritative and
// already committed, so nothing in here may surface an error to the sender.
pub async fn dispatch_new_message(
    state: &AppState,
    chat: &Chat,
    message: &Message,
    sender: &UserProfile,
) {
    let recipient_id = chat.other_participant(message.sender_id);

    match state.db_pool.acquire().await {
        Ok(mut conn) => {
            let text = format!("New message from {}", sender.username);
            if let Err(e) = insert_notification(
                &mut conn,
                recipient_id,
                message.sender_id,
                NotificationType::Message,
                None,
                Some(chat.id),
                &text,
            )
            .await
            {
                tracing::warn!(
                    "notification insert failed for message {}: {}",
                    message.id,
                    e
                );
            }
        }
        Err(e) => {
            tracing::warn!("could not acquire connection for notification insert: {}", e);
        }
    }

    let event = ServerEvent::NewMessage {
        chat_id: chat.id,
        message: message.clone(),
        sender: sender.clone(),
    };
    match push_to_user(&state.presence, recipient_id, event) {
        Ok(true) => {
            tracing::debug!("pushed new-message to user {}", recipient_id);
        }
        // Offline: the recipient discovers the message on their next fetch
        Ok(false) => {}
        Err(e) => {
            tracing::warn!("live delivery failed: {}", e);
        }
    }
}

// Transport-level mirror of a send: fan the payload out to the chat room and
// nudge the recipient's unread badge if they are online. Pure pass-through,
// no persistence, no retry.
pub fn relay_room_message(state: &AppState, sender_connection_id: Uuid, payload: RelayedMessage) {
    let event = ServerEvent::ReceiveMessage {
        chat_id: payload.chat_id,
        message: payload.message,
        sender: payload.sender,
        timestamp: Utc::now(),
    };
    state
        .websocket_manager
        .broadcast_to_chat(payload.chat_id, event, Some(sender_connection_id));

    if let Some(recipient_id) = payload.recipient_id {
        let badge = ServerEvent::UnreadCountUpdated {
            chat_id: payload.chat_id,
            unread_count: 1,
        };
        if let Err(e) = push_to_user(&state.presence, recipient_id, badge) {
            tracing::warn!("unread badge push failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::websocket::{PresenceStatus, UserConnection};
    use tokio::sync::mpsc::unbounded_channel;

    fn probe_event() -> ServerEvent {
        ServerEvent::UserStatusUpdate {
            user_id: Uuid::new_v4(),
            status: PresenceStatus::Online,
        }
    }

    #[tokio::test]
    async fn push_reaches_online_user() {
        let presence = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (tx, mut rx) = unbounded_channel();
        presence.register(UserConnection {
            connection_id: Uuid::new_v4(),
            user_id: user,
            sender: tx,
        });

        assert!(matches!(push_to_user(&presence, user, probe_event()), Ok(true)));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn push_to_offline_user_is_a_noop() {
        let presence = PresenceRegistry::new();
        assert!(matches!(
            push_to_user(&presence, Uuid::new_v4(), probe_event()),
            Ok(false)
        ));
    }

    #[tokio::test]
    async fn push_to_closed_channel_unregisters_the_entry() {
        let presence = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (tx, rx) = unbounded_channel();
        presence.register(UserConnection {
            connection_id: Uuid::new_v4(),
            user_id: user,
            sender: tx,
        });
        drop(rx);

        assert!(matches!(
            push_to_user(&presence, user, probe_event()),
            Err(DeliveryError::ChannelClosed { .. })
        ));
        assert!(!presence.is_online(user));
    }
}
