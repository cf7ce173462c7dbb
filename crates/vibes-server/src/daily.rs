use std::sync::Arc;

use chrono::{Duration, Local, NaiveTime, Utc};
use tracing::{info, warn};

use vibes_db::Database;
use vibes_notify::Notifier;
use vibes_types::notifications::NotificationPayload;

/// Background loop that fires once per local day at `hour`:00. Announces
/// the day's challenge to every user and prunes expired device rows.
///
/// A failed tick is logged and retried on the next scheduled run; the
/// loop never aborts. Re-running a tick only re-notifies, which is safe.
pub async fn run_daily_loop(db: Arc<Database>, notifier: Notifier, hour: u32) {
    loop {
        let wait = until_next_run(hour);
        info!("Next daily challenge announcement in {}s", wait.as_secs());
        tokio::time::sleep(wait).await;

        match run_tick(&db, &notifier) {
            Ok(notified) => info!("Daily challenge announced to {} users", notified),
            Err(e) => warn!("Daily challenge tick failed, retrying next run: {}", e),
        }
    }
}

fn until_next_run(hour: u32) -> std::time::Duration {
    let now = Local::now().naive_local();
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);

    let mut next = now.date().and_time(at);
    if next <= now {
        next += Duration::days(1);
    }

    (next - now).to_std().unwrap_or(std::time::Duration::from_secs(60))
}

fn run_tick(db: &Database, notifier: &Notifier) -> anyhow::Result<usize> {
    let date = Local::now().date_naive();
    let challenge = db
        .select_challenge(date)?
        .ok_or_else(|| anyhow::anyhow!("challenge catalogue is empty"))?;

    let mut notified = 0;
    for username in db.all_usernames()? {
        let result = notifier.send(
            &username,
            "📸 VibeTime!",
            &format!("New challenge: {} {}", challenge.icon, challenge.title),
            "system",
            NotificationPayload::DailyChallenge {
                challenge_id: challenge.id,
                title: challenge.title.clone(),
            },
        );
        match result {
            Ok(_) => notified += 1,
            // one bad inbox must not starve the rest of the batch
            Err(e) => warn!("Daily notification for {} failed: {}", username, e),
        }
    }

    let pruned = db.prune_expired_devices(Utc::now())?;
    if pruned > 0 {
        info!("Pruned {} expired device registrations", pruned);
    }

    Ok(notified)
}
