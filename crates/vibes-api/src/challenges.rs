use axum::{Extension, Json, extract::State};
use chrono::Local;
use serde_json::json;

use vibes_engine::challenge;
use vibes_types::api::{ApiResponse, Claims, NewChallengeRequest, OverrideRequest, TodayChallenge};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

pub async fn today(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let date = Local::now().date_naive();

    let selected = state
        .db
        .select_challenge(date)?
        .ok_or(ApiError::NotFound("challenge"))?;

    let (start_time, end_time) = challenge::observation_window(date);

    Ok(Json(ApiResponse::data(json!({
        "challenge": TodayChallenge {
            challenge: selected,
            date,
            start_time,
            end_time,
        }
    }))))
}

pub async fn set_override(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<OverrideRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.require_admin(&claims.sub)?;

    if !state.db.set_override(req.date, req.challenge_id)? {
        return Err(ApiError::NotFound("challenge"));
    }

    Ok(Json(ApiResponse::message("challenge override set")))
}

pub async fn add_challenge(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewChallengeRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    state.require_admin(&claims.sub)?;

    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("challenge title required".into()));
    }

    let added = state
        .db
        .add_challenge(&req.icon, req.title.trim(), &req.description)?;

    Ok(Json(ApiResponse::with_message(
        "challenge added",
        json!({ "challenge": added }),
    )))
}
