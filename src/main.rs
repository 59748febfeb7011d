mod app_state;
mod db;
mod error;
mod handlers;
mod middlewares;
mod models;
mod queries;
mod routes;
mod websocket;

use tower_sessions::SessionManagerLayer;
use tower_sessions_sqlx_store::PostgresStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "instaclone_backend=debug,tower_http=info".into()),
        )
        .init();

    let pool = match db::connect_to_db().await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Error connecting to database: {}", e);
            std::process::exit(1);
        }
    };

    let session_store = PostgresStore::new(pool.clone());
    if let Err(e) = session_store.migrate().await {
        tracing::error!("Error preparing session store: {}", e);
        std::process::exit(1);
    }
    let session_layer = SessionManagerLayer::new(session_store).with_secure(false);

    let state = app_state::AppState {
        db_pool: pool,
        presence: websocket::presence::PresenceRegistry::new(),
        websocket_manager: websocket::manager::WebSocketManager::new(),
    };
    let app = routes::create_routes()
        .with_state(state)
        .layer(session_layer);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    tracing::info!("listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
