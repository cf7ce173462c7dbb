use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The type-specific slice of a notification. Each engagement action
/// carries its own payload shape; the serde tag doubles as the
/// notification type exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationPayload {
    NewPhoto { photo_id: String },
    Like { photo_id: String },
    Comment { photo_id: String, text: String },
    FriendRequest,
    FriendAccept,
    DailyChallenge { challenge_id: i64, title: String },
}

impl NotificationPayload {
    /// Stable string form of the type tag, used as the db column value.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewPhoto { .. } => "new_photo",
            Self::Like { .. } => "like",
            Self::Comment { .. } => "comment",
            Self::FriendRequest => "friend_request",
            Self::FriendAccept => "friend_accept",
            Self::DailyChallenge { .. } => "daily_challenge",
        }
    }
}

/// An inbox entry. Created by engagement actions or the daily job,
/// mutated only by the recipient (mark-read), bulk-deleted on clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: String,
    pub title: String,
    pub body: String,
    /// Acting user, or "system" for the daily job.
    pub origin: String,
    #[serde(flatten)]
    pub payload: NotificationPayload,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_tag_matches_kind() {
        let payload = NotificationPayload::Comment {
            photo_id: "alice_2024-03-02".into(),
            text: "nice".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], payload.kind());
        assert_eq!(json["text"], "nice");
    }

    #[test]
    fn notification_flattens_payload() {
        let n = Notification {
            id: Uuid::new_v4(),
            recipient: "bob".into(),
            title: "❤️ New like!".into(),
            body: "alice liked your photo!".into(),
            origin: "alice".into(),
            payload: NotificationPayload::Like {
                photo_id: "bob_2024-05-05".into(),
            },
            timestamp: Utc::now(),
            read: false,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "like");
        assert_eq!(json["photo_id"], "bob_2024-05-05");

        let back: Notification = serde_json::from_value(json).unwrap();
        assert_eq!(back.payload.kind(), "like");
    }
}
