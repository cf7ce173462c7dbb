use axum::{
    Extension, Json,
    extract::{Path, State},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{Local, NaiveDate, Utc};
use serde_json::json;
use tracing::{error, warn};

use vibes_db::models::{DeleteOutcome, PhotoOutcome, UserRow};
use vibes_types::api::{
    ApiResponse, Claims, CommentRequest, FeedPhoto, MemoryCalendar, UploadPhotoRequest,
};
use vibes_types::models::Photo;
use vibes_types::notifications::NotificationPayload;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// How much of a comment survives into the notification body.
const COMMENT_PREVIEW_CHARS: usize = 50;

pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UploadPhotoRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    if req.image_data.is_empty() {
        return Err(ApiError::Validation("image required".into()));
    }
    B64.decode(&req.image_data)
        .map_err(|_| ApiError::Validation("image payload is not valid base64".into()))?;

    let caption = req.caption.unwrap_or_default();
    let date = Local::now().date_naive();

    // Quota check, insert, and streak update run off the async runtime;
    // image payloads make this the heaviest write in the system.
    let db = state.db.clone();
    let username = claims.sub.clone();
    let (photo, friends) = tokio::task::spawn_blocking(move || -> ApiResult<(Photo, Vec<String>)> {
        let challenge = db
            .select_challenge(date)?
            .ok_or(ApiError::NotFound("challenge"))?;

        let outcome = db.insert_photo(
            &username,
            date,
            &req.image_data,
            caption.trim(),
            &challenge.title,
            Utc::now(),
        )?;

        let (photo, first_of_day) = match outcome {
            PhotoOutcome::QuotaExceeded => {
                return Err(ApiError::QuotaExceeded("daily photo limit reached".into()));
            }
            PhotoOutcome::Created { photo, first_of_day } => (photo, first_of_day),
        };

        if first_of_day {
            db.record_first_post_of_day(&username, date)?
                .ok_or(ApiError::NotFound("user"))?;
        }

        let friends = db
            .get_user(&username)?
            .map(|u| u.friends)
            .unwrap_or_default();

        Ok((photo, friends))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Infrastructure(anyhow::anyhow!("upload task failed"))
    })??;

    // Every upload fans out, not just the first of the day
    for friend in &friends {
        let result = state.notifier.send(
            friend,
            "📸 New photo!",
            &format!("{} uploaded a new photo!", claims.sub),
            &claims.sub,
            NotificationPayload::NewPhoto {
                photo_id: photo.id.clone(),
            },
        );
        if let Err(e) = result {
            warn!("Notifying {} about {}'s photo failed: {}", friend, claims.sub, e);
        }
    }

    Ok(Json(ApiResponse::with_message(
        "photo uploaded",
        json!({ "photo": photo }),
    )))
}

/// Today's photos from the caller's friends, newest-first.
pub async fn today_feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let user = state
        .db
        .get_user(&claims.sub)?
        .ok_or(ApiError::NotFound("user"))?;
    let date = Local::now().date_naive();

    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.feed_for_day(&user.friends, date))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Infrastructure(anyhow::anyhow!("feed task failed"))
        })??;

    let photos: Vec<FeedPhoto> = rows
        .into_iter()
        .map(|(photo, user_profile_image)| FeedPhoto {
            photo,
            user_profile_image,
        })
        .collect();

    Ok(Json(ApiResponse::data(json!({ "photos": photos }))))
}

pub async fn my_today(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let date = Local::now().date_naive();
    let photos = state.db.photos_for_owner_day(&claims.sub, date)?;
    Ok(Json(ApiResponse::data(json!({ "photos": photos }))))
}

pub async fn my_memories(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let today = Local::now().date_naive();
    let photos = state.db.memories(&claims.sub, today)?;
    Ok(Json(ApiResponse::data(json!({ "photos": photos }))))
}

pub async fn memory_calendar(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(username): Path<String>,
) -> ApiResult<Json<ApiResponse<MemoryCalendar>>> {
    check_memories_access(&state, &claims.sub, &username)?;

    let today = Local::now().date_naive();
    let dates = state.db.memory_dates(&username, today)?;
    Ok(Json(ApiResponse::data(MemoryCalendar { dates })))
}

pub async fn memories_for_date(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((username, date)): Path<(String, NaiveDate)>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    check_memories_access(&state, &claims.sub, &username)?;

    let photos = state.db.photos_for_owner_day(&username, date)?;
    Ok(Json(ApiResponse::data(json!({ "photos": photos }))))
}

pub async fn like(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(photo_id): Path<String>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let outcome = state
        .db
        .toggle_like(&photo_id, &claims.sub)?
        .ok_or(ApiError::NotFound("photo"))?;

    // Notify only on the unliked -> liked transition, never on self-likes
    if outcome.liked && outcome.owner != claims.sub {
        let result = state.notifier.send(
            &outcome.owner,
            "❤️ New like!",
            &format!("{} liked your photo!", claims.sub),
            &claims.sub,
            NotificationPayload::Like {
                photo_id: photo_id.clone(),
            },
        );
        if let Err(e) = result {
            warn!("Like notification for {} failed: {}", outcome.owner, e);
        }
    }

    Ok(Json(ApiResponse::with_message(
        "like updated",
        json!({ "liked": outcome.liked }),
    )))
}

pub async fn comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(photo_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::Validation("comment must not be empty".into()));
    }

    let (owner, comment) = state
        .db
        .add_comment(&photo_id, &claims.sub, text, Utc::now())?
        .ok_or(ApiError::NotFound("photo"))?;

    if owner != claims.sub {
        let result = state.notifier.send(
            &owner,
            "💬 New comment!",
            &format!("{}: {}", claims.sub, preview(text)),
            &claims.sub,
            NotificationPayload::Comment {
                photo_id: photo_id.clone(),
                text: text.to_string(),
            },
        );
        if let Err(e) = result {
            warn!("Comment notification for {} failed: {}", owner, e);
        }
    }

    Ok(Json(ApiResponse::with_message(
        "comment added",
        json!({ "comment": comment }),
    )))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(photo_id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    match state.db.delete_photo(&photo_id, &claims.sub)? {
        DeleteOutcome::Deleted => Ok(Json(ApiResponse::message("photo deleted"))),
        DeleteOutcome::NotFound => Err(ApiError::NotFound("photo")),
        DeleteOutcome::Forbidden => {
            Err(ApiError::Forbidden("only the owner can delete a photo".into()))
        }
    }
}

/// Memories are visible to their owner, and to the owner's friends when
/// the owner has opted in to public memories.
fn check_memories_access(state: &AppState, caller: &str, owner: &str) -> Result<UserRow, ApiError> {
    let user = state.db.get_user(owner)?.ok_or(ApiError::NotFound("user"))?;

    if caller != owner {
        let is_friend = user.friends.iter().any(|f| f == caller);
        if !is_friend || !user.memories_public {
            return Err(ApiError::Forbidden("memories are private".into()));
        }
    }

    Ok(user)
}

fn preview(text: &str) -> String {
    if text.chars().count() > COMMENT_PREVIEW_CHARS {
        let cut: String = text.chars().take(COMMENT_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}
