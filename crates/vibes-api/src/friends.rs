use axum::{Extension, Json, extract::State};
use serde_json::json;
use tracing::warn;

use vibes_db::models::{AcceptOutcome, RequestOutcome};
use vibes_types::api::{ApiResponse, Claims, FriendActionRequest, FriendEntry};
use vibes_types::notifications::NotificationPayload;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let user = state
        .db
        .get_user(&claims.sub)?
        .ok_or(ApiError::NotFound("user"))?;

    let friends: Vec<FriendEntry> = user
        .friends
        .into_iter()
        .map(|username| FriendEntry { username })
        .collect();

    Ok(Json(ApiResponse::data(json!({ "friends": friends }))))
}

pub async fn requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let user = state
        .db
        .get_user(&claims.sub)?
        .ok_or(ApiError::NotFound("user"))?;

    let requests: Vec<FriendEntry> = user
        .pending_requests
        .into_iter()
        .map(|username| FriendEntry { username })
        .collect();

    Ok(Json(ApiResponse::data(json!({ "requests": requests }))))
}

pub async fn add(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FriendActionRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if req.username.is_empty() {
        return Err(ApiError::Validation("username required".into()));
    }
    if req.username == claims.sub {
        return Err(ApiError::Validation("you cannot add yourself as a friend".into()));
    }

    match state.db.add_friend_request(&claims.sub, &req.username)? {
        RequestOutcome::NotFound => Err(ApiError::NotFound("user")),
        RequestOutcome::AlreadyFriends => Err(ApiError::Conflict("already friends".into())),
        RequestOutcome::AlreadyPending => Err(ApiError::Conflict("request already sent".into())),
        RequestOutcome::Sent => {
            let result = state.notifier.send(
                &req.username,
                "👋 New friend request!",
                &format!("{} wants to be your friend", claims.sub),
                &claims.sub,
                NotificationPayload::FriendRequest,
            );
            if let Err(e) = result {
                warn!("Friend request notification for {} failed: {}", req.username, e);
            }
            Ok(Json(ApiResponse::message("friend request sent")))
        }
    }
}

pub async fn accept(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FriendActionRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    match state.db.accept_friend_request(&claims.sub, &req.username)? {
        AcceptOutcome::NotFound => Err(ApiError::NotFound("user")),
        AcceptOutcome::NoPending => {
            Err(ApiError::Validation("no pending request from that user".into()))
        }
        AcceptOutcome::Accepted => {
            let result = state.notifier.send(
                &req.username,
                "🎉 Friend request accepted!",
                &format!("{} accepted your friend request", claims.sub),
                &claims.sub,
                NotificationPayload::FriendAccept,
            );
            if let Err(e) = result {
                warn!("Accept notification for {} failed: {}", req.username, e);
            }
            Ok(Json(ApiResponse::message("friendship accepted")))
        }
    }
}

/// Symmetric and immediate, with no notification to the removed side.
pub async fn remove(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FriendActionRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if !state.db.remove_friend(&claims.sub, &req.username)? {
        return Err(ApiError::NotFound("user"));
    }

    Ok(Json(ApiResponse::message("friendship removed")))
}
