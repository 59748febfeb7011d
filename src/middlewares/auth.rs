use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use tower_sessions::Session;

use crate::models::sessions::UserSession;

// Gate for every protected route: a request only passes if the session layer
// resolved an authenticated user. Handlers re-read the session for the id.
pub async fn auth_middleware(
    session: Session,
    req: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    match session.get::<UserSession>("user").await {
        Ok(Some(_user_session)) => Ok(next.run(req).await),
        Ok(None) => Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string())),
        Err(e) => {
            tracing::error!("session load failed: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
