use chrono::{DateTime, NaiveDate, Utc};

use vibes_types::models::UserProfile;

/// Database row for a user. Distinct from the API-facing `UserProfile`:
/// this carries the credential hash and the friend/pending sets, which
/// never leave the server.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub username: String,
    pub email: String,
    pub password: String,
    pub profile_image: Option<String>,
    pub memories_public: bool,
    pub streak_count: u32,
    pub last_post_date: Option<NaiveDate>,
    pub achievements: Vec<String>,
    pub friends: Vec<String>,
    pub pending_requests: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn into_profile(self) -> UserProfile {
        UserProfile {
            username: self.username,
            email: self.email,
            profile_image: self.profile_image,
            memories_public: self.memories_public,
            streak_count: self.streak_count,
            achievements: self.achievements,
            created_at: self.created_at,
        }
    }
}

/// Result of a quota-checked photo insert.
#[derive(Debug)]
pub enum PhotoOutcome {
    Created {
        photo: vibes_types::models::Photo,
        /// True when this was the owner's first photo of the vibe day,
        /// i.e. the streak tracker should run.
        first_of_day: bool,
    },
    QuotaExceeded,
}

/// Result of a like toggle. `liked` is the new membership state.
#[derive(Debug, PartialEq, Eq)]
pub struct LikeOutcome {
    pub liked: bool,
    pub owner: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    Sent,
    AlreadyFriends,
    AlreadyPending,
    NotFound,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    NoPending,
    NotFound,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Forbidden,
}
