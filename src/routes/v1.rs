pub mod chats;
pub mod notifications;
pub mod websocket;

use crate::app_state::AppState;
use axum::Router;

pub fn v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/chats", chats::chats_routes())
        .nest("/notifications", notifications::notifications_routes())
        .merge(websocket::websocket_routes())
}
