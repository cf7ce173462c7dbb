use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Challenge, Photo, UserProfile};
use crate::notifications::Notification;

// -- JWT Claims --

/// JWT claims shared between the REST middleware and token issuance.
/// `sub` is the username; usernames are the identity everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

// -- Response envelope --

/// Uniform response body: `{success, message?, data?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            data: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthData {
    pub token: String,
    pub user: UserProfile,
}

// -- Profile --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateImageRequest {
    pub profile_image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEmailRequest {
    pub new_email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateVisibilityRequest {
    pub memories_public: bool,
}

// -- Challenges --

/// Today's challenge plus its observation window. The window is
/// informational metadata; uploads are never gated on it.
#[derive(Debug, Serialize)]
pub struct TodayChallenge {
    #[serde(flatten)]
    pub challenge: Challenge,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideRequest {
    pub date: NaiveDate,
    pub challenge_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewChallengeRequest {
    pub icon: String,
    pub title: String,
    pub description: String,
}

// -- Photos --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadPhotoRequest {
    pub image_data: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedPhoto {
    #[serde(flatten)]
    pub photo: Photo,
    pub user_profile_image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct MemoryCalendar {
    pub dates: Vec<NaiveDate>,
}

// -- Friends --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FriendActionRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct FriendEntry {
    pub username: String,
}

// -- Notifications --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterDeviceRequest {
    pub endpoint: String,
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InboxData {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}
