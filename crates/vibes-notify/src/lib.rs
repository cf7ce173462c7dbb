use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use vibes_db::Database;
use vibes_types::notifications::{Notification, NotificationPayload};

/// Appends notifications to recipients' inboxes and attempts best-effort
/// live delivery to their registered device endpoints.
///
/// The store append is the operation that matters; the push is a hint.
/// Push failures are logged and dropped, and the push itself runs on a
/// spawned task so the triggering request never waits on it.
#[derive(Clone)]
pub struct Notifier {
    db: Arc<Database>,
    http: reqwest::Client,
}

impl Notifier {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { db, http })
    }

    /// Store a notification and, when the recipient has a live endpoint,
    /// push it in the background.
    pub fn send(
        &self,
        recipient: &str,
        title: &str,
        body: &str,
        origin: &str,
        payload: NotificationPayload,
    ) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient: recipient.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            origin: origin.to_string(),
            payload,
            timestamp: Utc::now(),
            read: false,
        };

        self.db.append_notification(&notification)?;

        match self.db.device_endpoint(recipient, Utc::now()) {
            Ok(Some(endpoint)) => self.push(endpoint, title, body),
            Ok(None) => {}
            // registry trouble never fails the append
            Err(e) => warn!("Device lookup for {} failed: {}", recipient, e),
        }

        Ok(notification)
    }

    fn push(&self, endpoint: String, title: &str, body: &str) {
        let http = self.http.clone();
        let payload = serde_json::json!({ "title": title, "body": body });

        tokio::spawn(async move {
            match http.post(&endpoint).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => warn!("Live push to {} returned {}", endpoint, resp.status()),
                Err(e) => warn!("Live push to {} failed: {}", endpoint, e),
            }
        });
    }
}
