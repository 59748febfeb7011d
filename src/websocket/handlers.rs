use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    models::{
        sessions::UserSession,
        websocket::{RelayedMessage, ServerEvent, TypingPayload, UserConnection},
    },
    queries::chats::find_chat_for_participant,
    websocket::delivery,
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Response> {
    let user_session = session
        .get::<UserSession>("user")
        .await
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Cannot find user session")))?;

    let user_id = match user_session {
        Some(user_data) => user_data.user_id,
        None => {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "User session not found"
            )));
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_websocket(socket, state, user_id)))
}

// Connection lifecycle: connected -> identified (after the client's
// user-online signal) -> disconnected. Cleanup at the bottom runs exactly
// once per connection, whichever way the read loop ends.
async fn handle_websocket(socket: WebSocket, state: AppState, session_user_id: Uuid) {
    let connection_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ServerEvent>();

    // Writer task: everything pushed at this connection goes out as JSON text
    let outgoing_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    tracing::info!(
        "connection {} opened for user {}",
        connection_id,
        session_user_id
    );

    let mut identified = false;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(e) = handle_client_event(
                    &state,
                    connection_id,
                    session_user_id,
                    &tx,
                    &mut identified,
                    text.to_string(),
                )
                .await
                {
                    tracing::warn!("client event error on connection {}: {}", connection_id, e);
                    let _ = tx.send(ServerEvent::Error {
                        message: e.to_string(),
                    });
                }
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                tracing::warn!("receive error on connection {}: {}", connection_id, e);
                break;
            }
            _ => {}
        }
    }

    // Stale-safe: if a newer connection for this user already replaced the
    // presence entry, unregister leaves it alone.
    state.presence.unregister(connection_id);
    state.websocket_manager.leave_all_chats(connection_id);
    outgoing_task.abort();

    tracing::info!("connection {} closed", connection_id);
}

async fn handle_client_event(
    state: &AppState,
    connection_id: Uuid,
    session_user_id: Uuid,
    tx: &tokio::sync::mpsc::UnboundedSender<ServerEvent>,
    identified: &mut bool,
    text: String,
) -> AppResult<()> {
    let parsed: serde_json::Value = serde_json::from_str(&text)
        .map_err(|_| AppError::Validation(anyhow::anyhow!("Invalid JSON")))?;

    let event_type = parsed["type"].as_str().ok_or_else(|| {
        AppError::Validation(anyhow::anyhow!(
            "Missing or invalid 'type' field in message"
        ))
    })?;

    if event_type == "user-online" {
        let claimed = parse_uuid_field(&parsed, "user_id")?;
        // Presence can only be claimed for the identity that authenticated
        // the upgrade
        if claimed != session_user_id {
            tracing::warn!(
                "connection {} tried to register presence for user {}",
                connection_id,
                claimed
            );
            return Ok(());
        }
        state.presence.register(UserConnection {
            connection_id,
            user_id: session_user_id,
            sender: tx.clone(),
        });
        *identified = true;
        return Ok(());
    }

    // Everything below requires an identified connection
    if !*identified {
        tracing::warn!(
            "connection {} sent '{}' before user-online; ignoring",
            connection_id,
            event_type
        );
        return Ok(());
    }

    match event_type {
        "join-chat" => {
            let chat_id = parse_uuid_field(&parsed, "chat_id")?;
            handle_join_chat(state, connection_id, session_user_id, tx, chat_id).await?;
        }
        "leave-chat" => {
            let chat_id = parse_uuid_field(&parsed, "chat_id")?;
            state.websocket_manager.leave_chat(chat_id, connection_id);
        }
        "send-message" => {
            let payload: RelayedMessage = serde_json::from_value(parsed)
                .map_err(|_| AppError::Validation(anyhow::anyhow!("Invalid message format")))?;
            if !state
                .websocket_manager
                .is_connection_in_chat(payload.chat_id, connection_id)
            {
                tracing::warn!(
                    "connection {} relayed a message for chat {} it never joined",
                    connection_id,
                    payload.chat_id
                );
                return Ok(());
            }
            delivery::relay_room_message(state, connection_id, payload);
        }
        "typing" => {
            let payload: TypingPayload = serde_json::from_value(parsed)
                .map_err(|_| AppError::Validation(anyhow::anyhow!("Invalid typing payload")))?;
            let event = ServerEvent::UserTyping {
                user_id: session_user_id,
                username: payload.username.unwrap_or_default(),
                chat_id: payload.chat_id,
            };
            state
                .websocket_manager
                .broadcast_to_chat(payload.chat_id, event, Some(connection_id));
        }
        "stop-typing" => {
            let payload: TypingPayload = serde_json::from_value(parsed)
                .map_err(|_| AppError::Validation(anyhow::anyhow!("Invalid typing payload")))?;
            let event = ServerEvent::UserStopTyping {
                user_id: session_user_id,
                chat_id: payload.chat_id,
            };
            state
                .websocket_manager
                .broadcast_to_chat(payload.chat_id, event, Some(connection_id));
        }
        "message-read" => {
            let chat_id = parse_uuid_field(&parsed, "chat_id")?;
            let event = ServerEvent::MessagesRead {
                chat_id,
                read_by: session_user_id,
            };
            state
                .websocket_manager
                .broadcast_to_chat(chat_id, event, Some(connection_id));
        }
        _ => {
            let error = ServerEvent::Error {
                message: format!("Unknown message type: {}", event_type),
            };
            let _ = tx.send(error);
        }
    }

    Ok(())
}

// Room joins are authorized against the store: only participants of the
// chat may listen in on its room.
async fn handle_join_chat(
    state: &AppState,
    connection_id: Uuid,
    user_id: Uuid,
    tx: &tokio::sync::mpsc::UnboundedSender<ServerEvent>,
    chat_id: Uuid,
) -> AppResult<()> {
    let mut conn = state.db_pool.acquire().await.map_err(|_| {
        AppError::InternalServerError(anyhow::anyhow!("Database connection failed"))
    })?;

    if find_chat_for_participant(&mut conn, chat_id, user_id)
        .await?
        .is_none()
    {
        tracing::warn!(
            "user {} tried to join chat {} they do not participate in",
            user_id,
            chat_id
        );
        return Ok(());
    }

    state.websocket_manager.join_chat(
        chat_id,
        UserConnection {
            connection_id,
            user_id,
            sender: tx.clone(),
        },
    );
    state
        .websocket_manager
        .broadcast_to_chat(chat_id, ServerEvent::UserJoinedChat { chat_id }, None);

    Ok(())
}

fn parse_uuid_field(parsed: &serde_json::Value, field: &str) -> AppResult<Uuid> {
    let raw = parsed[field]
        .as_str()
        .ok_or_else(|| AppError::Validation(anyhow::anyhow!("Missing {}", field)))?;
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(anyhow::anyhow!("Invalid {}", field)))
}
