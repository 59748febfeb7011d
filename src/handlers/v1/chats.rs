use anyhow::anyhow;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
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
    models::chats::{validate_message_content, MessageType, MessageWithSender},
    queries::{
        chats::{
            count_chats_for_user, count_total_unread_messages, count_unread_messages,
            find_chat_by_id, find_chat_for_participant, find_last_message, find_message_in_chat,
            find_or_create_chat, insert_message, list_chats_for_user, list_messages,
            mark_messages_read, soft_delete_message, touch_chat_last_message_at,
        },
        users::get_user_profile_by_id,
    },
    websocket::delivery,
};

use super::{clamp_pagination, session_user_id, PaginationQuery};

// Non-archived chats for the current user, newest activity first, each
// annotated with the counterpart's profile, last message and unread count.
pub async fn get_chats(
    State(state): State<AppState>,
    session: Session,
    Query(pagination): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user_id(&session).await?;
    let (page, limit, offset) = clamp_pagination(&pagination, 20);

    let mut conn =
        state.db_pool.acquire().await.map_err(|_| {
            AppError::InternalServerError(anyhow!("Failed to get connection"))
        })?;

    let chats = list_chats_for_user(&mut conn, user_id, limit, offset).await?;
    let total_chats = count_chats_for_user(&mut conn, user_id).await?;
    let own_profile = get_user_profile_by_id(&mut conn, user_id).await?;

    let mut formatted = Vec::with_capacity(chats.len());
    for chat in &chats {
        let participant =
            get_user_profile_by_id(&mut conn, chat.other_participant(user_id)).await?;
        let last_message = find_last_message(&mut conn, chat.id).await?.map(|message| {
            let sender = if message.sender_id == user_id {
                own_profile.clone()
            } else {
                participant.clone()
            };
            MessageWithSender { message, sender }
        });
        let unread_count = count_unread_messages(&mut conn, chat.id, user_id).await?;

        formatted.push(json!({
            "id": chat.id,
            "participant": participant,
            "last_message": last_message,
            "last_message_at": chat.last_message_at,
            "unread_count": unread_count,
        }));
    }

    let total_pages = if total_chats == 0 {
        0
    } else {
        (total_chats + limit - 1) / limit
    };

    Ok(Json(json!({
        "chats": formatted,
        "pagination": {
            "current_page": page,
            "total_pages": total_pages,
            "total_items": total_chats,
            "items_per_page": limit,
        }
    })))
}

// The unique chat with another user, created lazily on first contact.
pub async fn get_or_create_chat(
    State(state): State<AppState>,
    session: Session,
    Path(other_user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user_id(&session).await?;

    if other_user_id == user_id {
        return Err(AppError::InvalidOperation(anyhow!(
            "You cannot chat with yourself"
        )));
    }

    let mut conn =
        state.db_pool.acquire().await.map_err(|_| {
            AppError::InternalServerError(anyhow!("Failed to get connection"))
        })?;

    let other_user = match get_user_profile_by_id(&mut conn, other_user_id).await? {
        Some(profile) => profile,
        None => return Err(AppError::NotFound(anyhow!("User not found"))),
    };

    let chat = find_or_create_chat(&mut conn, user_id, other_user_id).await?;

    let own_profile = get_user_profile_by_id(&mut conn, user_id).await?;
    let last_message = find_last_message(&mut conn, chat.id).await?.map(|message| {
        let sender = if message.sender_id == user_id {
            own_profile.clone()
        } else {
            Some(other_user.clone())
        };
        MessageWithSender { message, sender }
    });
    let unread_count = count_unread_messages(&mut conn, chat.id, user_id).await?;

    Ok(Json(json!({
        "chat": {
            "id": chat.id,
            "participant": other_user,
            "last_message": last_message,
            "last_message_at": chat.last_message_at,
            "unread_count": unread_count,
        }
    })))
}

// Conversation view, oldest first. Fetch and the read receipt are two
// explicit steps: the listing is taken first, then everything the
// counterpart sent is flipped to read.
pub async fn get_messages(
    State(state): State<AppState>,
    session: Session,
    Path(chat_id): Path<Uuid>,
    Query(pagination): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user_id(&session).await?;
    let (_page, limit, offset) = clamp_pagination(&pagination, 50);

    let mut conn =
        state.db_pool.acquire().await.map_err(|_| {
            AppError::InternalServerError(anyhow!("Failed to get connection"))
        })?;

    let chat = match find_chat_by_id(&mut conn, chat_id).await? {
        Some(chat) => chat,
        None => return Err(AppError::NotFound(anyhow!("Chat not found"))),
    };
    if !chat.has_participant(user_id) {
        return Err(AppError::Forbidden(anyhow!(
            "You are not a participant in this chat"
        )));
    }

    let messages = list_messages(&mut conn, chat_id, limit, offset).await?;
    let has_more = messages.len() as i64 == limit;

    mark_messages_read(&mut conn, chat_id, user_id).await?;

    let participant1 = get_user_profile_by_id(&mut conn, chat.participant1_id).await?;
    let participant2 = get_user_profile_by_id(&mut conn, chat.participant2_id).await?;

    // fetched newest-first, displayed oldest-first
    let messages: Vec<MessageWithSender> = messages
        .into_iter()
        .rev()
        .map(|message| {
            let sender = if message.sender_id == chat.participant1_id {
                participant1.clone()
            } else {
                participant2.clone()
            };
            MessageWithSender { message, sender }
        })
        .collect();

    Ok(Json(json!({
        "messages": messages,
        "has_more": has_more,
    })))
}

#[derive(serde::Deserialize, Validate)]
pub struct SendMessagePayload {
    #[validate(length(max = 2000, message = "Message text must be at most 2000 characters"))]
    pub text: Option<String>,
    pub message_type: Option<MessageType>,
    pub media_url: Option<String>,
}

pub async fn send_message(
    State(state): State<AppState>,
    session: Session,
    Path(chat_id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user_id(&session).await?;

    payload
        .validate()
        .map_err(|e| AppError::Validation(anyhow!("Invalid message payload: {}", e)))?;

    let message_type = payload.message_type.unwrap_or(MessageType::Text);
    let text = payload.text.unwrap_or_default();
    validate_message_content(message_type, &text, payload.media_url.as_deref())
        .map_err(|msg| AppError::Validation(anyhow!(msg)))?;

    let mut conn =
        state.db_pool.acquire().await.map_err(|_| {
            AppError::InternalServerError(anyhow!("Failed to get connection"))
        })?;

    let chat = match find_chat_for_participant(&mut conn, chat_id, user_id).await? {
        Some(chat) => chat,
        None => {
            return Err(AppError::NotFound(anyhow!(
                "Chat not found or access denied"
            )));
        }
    };

    let message = insert_message(
        &mut conn,
        Uuid::new_v4(),
        chat_id,
        user_id,
        &text,
        message_type,
        payload.media_url.as_deref(),
    )
    .await?;
    touch_chat_last_message_at(&mut conn, chat_id).await?;

    let sender_profile = get_user_profile_by_id(&mut conn, user_id).await?;
    drop(conn);

    // The message write above is authoritative; notification and live push
    // are advisory and never fail this request.
    match sender_profile {
        Some(profile) => delivery::dispatch_new_message(&state, &chat, &message, &profile).await,
        None => tracing::warn!(
            "sender profile missing for user {}; skipping delivery",
            user_id
        ),
    }

    Ok((StatusCode::CREATED, Json(json!({ "message": message }))))
}

// Explicit read receipt, same update the conversation view applies.
pub async fn mark_messages_as_read(
    State(state): State<AppState>,
    session: Session,
    Path(chat_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user_id(&session).await?;

    let mut conn =
        state.db_pool.acquire().await.map_err(|_| {
            AppError::InternalServerError(anyhow!("Failed to get connection"))
        })?;

    if find_chat_for_participant(&mut conn, chat_id, user_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(anyhow!(
            "Chat not found or access denied"
        )));
    }

    let updated = mark_messages_read(&mut conn, chat_id, user_id).await?;

    Ok(Json(json!({ "updated": updated })))
}

// Soft delete, sender only.
pub async fn delete_message(
    State(state): State<AppState>,
    session: Session,
    Path((chat_id, message_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user_id(&session).await?;

    let mut conn =
        state.db_pool.acquire().await.map_err(|_| {
            AppError::InternalServerError(anyhow!("Failed to get connection"))
        })?;

    if find_chat_for_participant(&mut conn, chat_id, user_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(anyhow!(
            "Chat not found or access denied"
        )));
    }

    let message = match find_message_in_chat(&mut conn, message_id, chat_id).await? {
        Some(message) => message,
        None => return Err(AppError::NotFound(anyhow!("Message not found"))),
    };

    if message.sender_id != user_id {
        return Err(AppError::Forbidden(anyhow!(
            "Not authorized to delete this message"
        )));
    }

    soft_delete_message(&mut conn, message_id).await?;

    Ok((StatusCode::OK, "Message deleted"))
}

// Hides the chat for both participants, not just the archiver.
pub async fn archive_chat(
    State(state): State<AppState>,
    session: Session,
    Path(chat_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user_id(&session).await?;

    let mut conn =
        state.db_pool.acquire().await.map_err(|_| {
            AppError::InternalServerError(anyhow!("Failed to get connection"))
        })?;

    if find_chat_for_participant(&mut conn, chat_id, user_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(anyhow!(
            "Chat not found or access denied"
        )));
    }

    crate::queries::chats::archive_chat(&mut conn, chat_id).await?;

    Ok((StatusCode::OK, "Chat archived"))
}

pub async fn get_unread_count(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user_id(&session).await?;

    let mut conn =
        state.db_pool.acquire().await.map_err(|_| {
            AppError::InternalServerError(anyhow!("Failed to get connection"))
        })?;

    let unread_count = count_total_unread_messages(&mut conn, user_id).await?;

    Ok(Json(json!({ "unread_count": unread_count })))
}
