use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::chats::{Chat, Message, MessageType};

// The unique chat for an unordered pair, whichever way round it was stored.
pub async fn find_chat_between(
    conn: &mut PgConnection,
    user_a: Uuid,
    user_b: Uuid,
) -> AppResult<Option<Chat>> {
    let chat = sqlx::query_as::<_, Chat>(
        "SELECT * FROM chats
         WHERE (participant1_id = $1 AND participant2_id = $2)
            OR (participant1_id = $2 AND participant2_id = $1)",
    )
    .bind(user_a)
    .bind(user_b)
    .fetch_optional(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database query error (find_chat_between): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error fetching chat"))
    })?;

    Ok(chat)
}

// Find-or-create for the pair. The participant columns are stored sorted so
// the unique constraint dedupes concurrent creates; the insert tolerates the
// conflict and the loser re-reads the winner's row.
pub async fn find_or_create_chat(
    conn: &mut PgConnection,
    user_a: Uuid,
    user_b: Uuid,
) -> AppResult<Chat> {
    if let Some(chat) = find_chat_between(&mut *conn, user_a, user_b).await? {
        return Ok(chat);
    }

    let inserted = sqlx::query_as::<_, Chat>(
        "INSERT INTO chats (id, participant1_id, participant2_id)
         VALUES ($1, $2, $3)
         ON CONFLICT (participant1_id, participant2_id) DO NOTHING
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(std::cmp::min(user_a, user_b))
    .bind(std::cmp::max(user_a, user_b))
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Database insert error (find_or_create_chat): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error creating chat"))
    })?;

    if let Some(chat) = inserted {
        return Ok(chat);
    }

    // Lost the race to a concurrent create
    match find_chat_between(conn, user_a, user_b).await? {
        Some(chat) => Ok(chat),
        None => Err(AppError::InternalServerError(anyhow::anyhow!(
            "Chat missing after conflicting insert"
        ))),
    }
}

// Fetch a chat only if `user_id` is one of its participants. Callers decide
// whether a None is a NotFound or a Forbidden.
pub async fn find_chat_for_participant(
    conn: &mut PgConnection,
    chat_id: Uuid,
    user_id: Uuid,
) -> AppResult<Option<Chat>> {
    let chat = sqlx::query_as::<_, Chat>(
        "SELECT * FROM chats
         WHERE id = $1 AND (participant1_id = $2 OR participant2_id = $2)",
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database query error (find_chat_for_participant): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error fetching chat"))
    })?;

    Ok(chat)
}

pub async fn find_chat_by_id(conn: &mut PgConnection, chat_id: Uuid) -> AppResult<Option<Chat>> {
    let chat = sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE id = $1")
        .bind(chat_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| {
            tracing::error!("Database query error (find_chat_by_id): {:?}", e);
            AppError::InternalServerError(anyhow::anyhow!("Database error fetching chat"))
        })?;

    Ok(chat)
}

pub async fn list_chats_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<Chat>> {
    let chats = sqlx::query_as::<_, Chat>(
        "SELECT * FROM chats
         WHERE is_archived = FALSE
           AND (participant1_id = $1 OR participant2_id = $1)
         ORDER BY last_message_at DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database query error (list_chats_for_user): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error listing chats"))
    })?;

    Ok(chats)
}

pub async fn count_chats_for_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM chats
         WHERE is_archived = FALSE
           AND (participant1_id = $1 OR participant2_id = $1)",
    )
    .bind(user_id)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database query error (count_chats_for_user): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error counting chats"))
    })?;

    Ok(count)
}

pub async fn find_last_message(
    conn: &mut PgConnection,
    chat_id: Uuid,
) -> AppResult<Option<Message>> {
    let message = sqlx::query_as::<_, Message>(
        "SELECT * FROM messages
         WHERE chat_id = $1
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
    )
    .bind(chat_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database query error (find_last_message): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error fetching last message"))
    })?;

    Ok(message)
}

// Messages sent by the counterpart that `user_id` has not read yet.
pub async fn count_unread_messages(
    conn: &mut PgConnection,
    chat_id: Uuid,
    user_id: Uuid,
) -> AppResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM messages
         WHERE chat_id = $1 AND sender_id != $2 AND is_read = FALSE",
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database query error (count_unread_messages): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error counting unread messages"))
    })?;

    Ok(count)
}

pub async fn count_total_unread_messages(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AppResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM messages m
         JOIN chats c ON c.id = m.chat_id
         WHERE (c.participant1_id = $1 OR c.participant2_id = $1)
           AND m.sender_id != $1
           AND m.is_read = FALSE",
    )
    .bind(user_id)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database query error (count_total_unread_messages): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error counting unread messages"))
    })?;

    Ok(count)
}

pub async fn insert_message(
    conn: &mut PgConnection,
    id: Uuid,
    chat_id: Uuid,
    sender_id: Uuid,
    text: &str,
    message_type: MessageType,
    media_url: Option<&str>,
) -> AppResult<Message> {
    let message = sqlx::query_as::<_, Message>(
        "INSERT INTO messages (id, chat_id, sender_id, text, message_type, media_url)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(id)
    .bind(chat_id)
    .bind(sender_id)
    .bind(text)
    .bind(message_type)
    .bind(media_url)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database insert error (insert_message): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error inserting message"))
    })?;

    Ok(message)
}

pub async fn touch_chat_last_message_at(conn: &mut PgConnection, chat_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE chats SET last_message_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(chat_id)
        .execute(conn)
        .await
        .map_err(|e| {
            tracing::error!("Database update error (touch_chat_last_message_at): {:?}", e);
            AppError::InternalServerError(anyhow::anyhow!("Database error updating chat"))
        })?;

    Ok(())
}

// Newest first; callers reverse for display. Tie-break on id keeps the
// ordering stable for messages created in the same instant.
pub async fn list_messages(
    conn: &mut PgConnection,
    chat_id: Uuid,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(
        "SELECT * FROM messages
         WHERE chat_id = $1
         ORDER BY created_at DESC, id DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(chat_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database query error (list_messages): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error listing messages"))
    })?;

    Ok(messages)
}

// Mark everything the counterpart sent as read. Only flips unread rows, so
// read_at is set once and never moves afterwards.
pub async fn mark_messages_read(
    conn: &mut PgConnection,
    chat_id: Uuid,
    reader_id: Uuid,
) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE messages SET is_read = TRUE, read_at = NOW()
         WHERE chat_id = $1 AND sender_id != $2 AND is_read = FALSE",
    )
    .bind(chat_id)
    .bind(reader_id)
    .execute(conn)
    .await
    .map_err(|e| {
        tracing::error!("Database update error (mark_messages_read): {:?}", e);
        AppError::InternalServerError(anyhow::anyhow!("Database error marking messages read"))
    })?;

    Ok(result.rows_affected())
}

pub async fn find_message_in_chat(
    conn: &mut PgConnection,
    message_id: Uuid,
    chat_id: Uuid,
) -> AppResult<Option<Message>> {
    let message =
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1 AND chat_id = $2")
            .bind(message_id)
            .bind(chat_id)
            .fetch_optional(conn)
            .await
            .map_err(|e| {
                tracing::error!("Database query error (find_message_in_chat): {:?}", e);
                AppError::InternalServerError(anyhow::anyhow!("Database error fetching message"))
            })?;

    Ok(message)
}

pub async fn soft_delete_message(conn: &mut PgConnection, message_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE messages SET is_deleted = TRUE WHERE id = $1")
        .bind(message_id)
        .execute(conn)
        .await
        .map_err(|e| {
            tracing::error!("Database update error (soft_delete_message): {:?}", e);
            AppError::InternalServerError(anyhow::anyhow!("Database error deleting message"))
        })?;

    Ok(())
}

// Archiving is chat-global: it hides the conversation for both participants.
pub async fn archive_chat(conn: &mut PgConnection, chat_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE chats SET is_archived = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(chat_id)
        .execute(conn)
        .await
        .map_err(|e| {
            tracing::error!("Database update error (archive_chat): {:?}", e);
            AppError::InternalServerError(anyhow::anyhow!("Database error archiving chat"))
        })?;

    Ok(())
}
