use std::collections::HashSet;
use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};

use vibes_db::Database;
use vibes_notify::Notifier;
use vibes_types::api::{ApiResponse, AuthData, Claims, LoginRequest, RegisterRequest};

use crate::error::{ApiError, ApiResult};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub notifier: Notifier,
    pub jwt_secret: String,
    /// Usernames allowed to manage the challenge catalogue and overrides.
    pub admins: HashSet<String>,
    /// How long a registered device endpoint stays live.
    pub device_ttl: Duration,
}

impl AppStateInner {
    pub fn require_admin(&self, username: &str) -> Result<(), ApiError> {
        if self.admins.contains(username) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("admin privileges required".into()))
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<ApiResponse<AuthData>>> {
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation("username must be 3 to 32 characters".into()));
    }
    if !req.email.contains('@') {
        return Err(ApiError::Validation("invalid email address".into()));
    }
    if req.password.len() < 6 {
        return Err(ApiError::Validation("password must be at least 6 characters".into()));
    }
    if req.password != req.confirm_password {
        return Err(ApiError::Validation("passwords do not match".into()));
    }

    if state.db.get_user(&req.username)?.is_some() {
        return Err(ApiError::Conflict("username already taken".into()));
    }
    if state.db.email_taken(&req.email, None)? {
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let password_hash = hash_password(&req.password)?;
    state
        .db
        .create_user(&req.username, &req.email, &password_hash, Utc::now())?;

    let user = state
        .db
        .get_user(&req.username)?
        .ok_or(ApiError::NotFound("user"))?;
    let token = create_token(&state.jwt_secret, &req.username)?;

    Ok(Json(ApiResponse::with_message(
        "registration successful",
        AuthData {
            token,
            user: user.into_profile(),
        },
    )))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<ApiResponse<AuthData>>> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("username and password required".into()));
    }

    let user = state
        .db
        .get_user(&req.username)?
        .ok_or_else(|| ApiError::Unauthenticated("invalid credentials".into()))?;

    if !verify_password(&req.password, &user.password)? {
        return Err(ApiError::Unauthenticated("invalid credentials".into()));
    }

    let token = create_token(&state.jwt_secret, &user.username)?;

    Ok(Json(ApiResponse::with_message(
        "login successful",
        AuthData {
            token,
            user: user.into_profile(),
        },
    )))
}

pub(crate) fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Infrastructure(anyhow::anyhow!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

pub(crate) fn verify_password(password: &str, stored: &str) -> ApiResult<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| ApiError::Infrastructure(anyhow::anyhow!("stored credential hash is corrupt: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn create_token(secret: &str, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: username.to_string(),
        exp: (Utc::now() + Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
