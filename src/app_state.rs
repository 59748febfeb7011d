use crate::websocket::manager::WebSocketManager;
use crate::websocket::presence::PresenceRegistry;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub presence: PresenceRegistry,
    pub websocket_manager: WebSocketManager,
}
