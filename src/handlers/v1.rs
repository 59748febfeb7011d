pub mod chats;
pub mod notifications;

use anyhow::anyhow;
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::sessions::UserSession;

// The authenticated user behind the request, as resolved by the session
// layer. The auth middleware already rejected anonymous requests; this is
// the per-handler read of who they are.
pub(crate) async fn session_user_id(session: &Session) -> AppResult<Uuid> {
    let user_session = session
        .get::<UserSession>("user")
        .await
        .map_err(|_| AppError::Unauthorized(anyhow!("Cannot find user session")))?;

    match user_session {
        Some(user_data) => Ok(user_data.user_id),
        None => Err(AppError::Unauthorized(anyhow!("User session not found"))),
    }
}

#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct PaginationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

// Offset pagination with defaults; page and limit are forced positive and
// the limit is capped so a single request cannot drain a whole table.
pub(crate) fn clamp_pagination(query: &PaginationQuery, default_limit: i64) -> (i64, i64, i64) {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(default_limit).clamp(1, 100);
    (page, limit, (page - 1) * limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_when_absent() {
        let (page, limit, offset) = clamp_pagination(&PaginationQuery::default(), 20);
        assert_eq!((page, limit, offset), (1, 20, 0));
    }

    #[test]
    fn pagination_clamps_nonpositive_values() {
        let query = PaginationQuery {
            page: Some(0),
            limit: Some(-5),
        };
        let (page, limit, offset) = clamp_pagination(&query, 50);
        assert_eq!((page, limit, offset), (1, 1, 0));
    }

    #[test]
    fn pagination_computes_offset() {
        let query = PaginationQuery {
            page: Some(3),
            limit: Some(20),
        };
        let (page, limit, offset) = clamp_pagination(&query, 20);
        assert_eq!((page, limit, offset), (3, 20, 40));
    }

    #[test]
    fn pagination_caps_oversized_limit() {
        let query = PaginationQuery {
            page: Some(1),
            limit: Some(10_000),
        };
        let (_, limit, _) = clamp_pagination(&query, 20);
        assert_eq!(limit, 100);
    }
}
