use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A user as exposed over the API. The credential hash never leaves the
/// database layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub profile_image: Option<String>,
    pub memories_public: bool,
    pub streak_count: u32,
    pub achievements: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: i64,
    pub icon: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub username: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A daily photo. `vibe_date` is the calendar day the photo counts for,
/// not the wall-clock upload instant. `challenge_title` is frozen at
/// capture time and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub username: String,
    pub vibe_date: NaiveDate,
    pub image_data: String,
    pub caption: String,
    pub challenge_title: String,
    pub likes: Vec<String>,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}
