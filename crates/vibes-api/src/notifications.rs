use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;

use vibes_types::api::{ApiResponse, Claims, InboxData, RegisterDeviceRequest};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn register_device(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RegisterDeviceRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if req.endpoint.is_empty() {
        return Err(ApiError::Validation("endpoint required".into()));
    }

    let expires_at = Utc::now() + state.device_ttl;
    state
        .db
        .register_device(&claims.sub, &req.endpoint, req.platform.as_deref(), expires_at)?;

    Ok(Json(ApiResponse::message("device registered")))
}

/// Newest-first page of the caller's inbox. The unread count is scoped
/// to the returned page, not the whole inbox.
pub async fn inbox(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<ApiResponse<InboxData>>> {
    let limit = query.limit.min(200);
    let (notifications, unread_count) = state.db.notifications_for(&claims.sub, limit)?;

    Ok(Json(ApiResponse::data(InboxData {
        notifications,
        unread_count,
    })))
}

/// Marking an id that is unknown, or that belongs to someone else, is a
/// silent success.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.db.mark_notification_read(&claims.sub, &id)?;
    Ok(Json(ApiResponse::ok()))
}

pub async fn clear(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.db.clear_notifications(&claims.sub)?;
    Ok(Json(ApiResponse::message("notifications cleared")))
}
