use axum::{Extension, Json, extract::State};
use serde_json::json;

use vibes_types::api::{
    ApiResponse, Claims, UpdateEmailRequest, UpdateImageRequest, UpdatePasswordRequest,
    UpdateVisibilityRequest,
};

use crate::auth::{AppState, hash_password, verify_password};
use crate::error::{ApiError, ApiResult};

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let user = state
        .db
        .get_user(&claims.sub)?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(ApiResponse::data(json!({ "user": user.into_profile() }))))
}

pub async fn update_image(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateImageRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    if !state
        .db
        .update_profile_image(&claims.sub, req.profile_image.as_deref())?
    {
        return Err(ApiError::NotFound("user"));
    }

    let user = state
        .db
        .get_user(&claims.sub)?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(ApiResponse::with_message(
        "profile image updated",
        json!({ "user": user.into_profile() }),
    )))
}

pub async fn update_email(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateEmailRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    if !req.new_email.contains('@') {
        return Err(ApiError::Validation("invalid email address".into()));
    }

    let user = state
        .db
        .get_user(&claims.sub)?
        .ok_or(ApiError::NotFound("user"))?;

    if !verify_password(&req.password, &user.password)? {
        return Err(ApiError::Unauthenticated("wrong password".into()));
    }
    if state.db.email_taken(&req.new_email, Some(&claims.sub))? {
        return Err(ApiError::Conflict("email already in use".into()));
    }

    state.db.update_email(&claims.sub, &req.new_email)?;

    let user = state
        .db
        .get_user(&claims.sub)?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(ApiResponse::with_message(
        "email updated",
        json!({ "user": user.into_profile() }),
    )))
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdatePasswordRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if req.new_password.len() < 6 {
        return Err(ApiError::Validation("password must be at least 6 characters".into()));
    }

    let user = state
        .db
        .get_user(&claims.sub)?
        .ok_or(ApiError::NotFound("user"))?;

    if !verify_password(&req.old_password, &user.password)? {
        return Err(ApiError::Unauthenticated("wrong old password".into()));
    }

    let hash = hash_password(&req.new_password)?;
    state.db.update_password(&claims.sub, &hash)?;

    Ok(Json(ApiResponse::message("password updated")))
}

pub async fn update_visibility(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateVisibilityRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if !state
        .db
        .update_memories_visibility(&claims.sub, req.memories_public)?
    {
        return Err(ApiError::NotFound("user"));
    }

    Ok(Json(ApiResponse::message("memories visibility updated")))
}
