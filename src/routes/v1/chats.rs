use crate::handlers::v1::chats;
use crate::{app_state::AppState, middlewares::auth::auth_middleware};
use axum::routing::{delete, get, put};
use axum::{middleware, Router};

pub fn chats_routes() -> Router<AppState> {
    // Protected routes that require authentication
    Router::new()
        .route("/", get(chats::get_chats))
        .route("/unread-count", get(chats::get_unread_count))
        .route("/user/{user_id}", get(chats::get_or_create_chat))
        .route(
            "/{chat_id}/messages",
            get(chats::get_messages).post(chats::send_message),
        )
        .route(
            "/{chat_id}/messages/{message_id}",
            delete(chats::delete_message),
        )
        .route("/{chat_id}/read", put(chats::mark_messages_as_read))
        .route("/{chat_id}/archive", put(chats::archive_chat))
        .layer(middleware::from_fn(auth_middleware))
}
