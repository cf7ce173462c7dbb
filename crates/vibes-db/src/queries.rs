use anyhow::Result;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, Row, types::Type};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use vibes_engine::{challenge, streak};
use vibes_types::models::{Challenge, Comment, Photo};
use vibes_types::notifications::Notification;

use crate::Database;
use crate::models::{
    AcceptOutcome, DeleteOutcome, LikeOutcome, PhotoOutcome, RequestOutcome, UserRow,
};

/// Hard cap on photos per owner per vibe day.
pub const MAX_PHOTOS_PER_DAY: usize = 3;

const USER_COLS: &str = "username, email, password, profile_image, memories_public, \
     streak_count, last_post_date, achievements, friends, pending_requests, created_at";

const PHOTO_COLS: &str =
    "id, username, vibe_date, image_data, caption, challenge_title, likes, comments, created_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![username, email, password_hash, fmt_ts(created_at)],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, username))
    }

    pub fn email_taken(&self, email: &str, exclude: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE email = ?1 AND username != ?2",
                rusqlite::params![email, exclude.unwrap_or("")],
                |r| r.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn all_usernames(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT username FROM users ORDER BY username")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_profile_image(&self, username: &str, image: Option<&str>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let affected = conn.execute(
                "UPDATE users SET profile_image = ?1 WHERE username = ?2",
                rusqlite::params![image, username],
            )?;
            Ok(affected > 0)
        })
    }

    pub fn update_email(&self, username: &str, email: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let affected = conn.execute(
                "UPDATE users SET email = ?1 WHERE username = ?2",
                rusqlite::params![email, username],
            )?;
            Ok(affected > 0)
        })
    }

    pub fn update_password(&self, username: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let affected = conn.execute(
                "UPDATE users SET password = ?1 WHERE username = ?2",
                rusqlite::params![password_hash, username],
            )?;
            Ok(affected > 0)
        })
    }

    pub fn update_memories_visibility(&self, username: &str, public: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let affected = conn.execute(
                "UPDATE users SET memories_public = ?1 WHERE username = ?2",
                rusqlite::params![public, username],
            )?;
            Ok(affected > 0)
        })
    }

    // -- Streak --

    /// Advance the owner's streak for their first post on `date` and
    /// persist the result, merging any newly unlocked achievement tags.
    /// Returns `None` when the user does not exist. Read and write happen
    /// under the writer lock, so concurrent invocations cannot
    /// double-count a day.
    pub fn record_first_post_of_day(
        &self,
        username: &str,
        date: NaiveDate,
    ) -> Result<Option<streak::StreakUpdate>> {
        self.with_conn_mut(|conn| {
            let Some(user) = query_user(conn, username)? else {
                return Ok(None);
            };

            let state = streak::StreakState {
                last_post_date: user.last_post_date,
                count: user.streak_count,
            };
            let update = streak::record_first_post(&state, &user.achievements, date);

            if update.changed {
                let mut achievements = user.achievements;
                achievements.extend(update.new_achievements.iter().map(|t| t.to_string()));
                conn.execute(
                    "UPDATE users SET streak_count = ?1, last_post_date = ?2, achievements = ?3
                     WHERE username = ?4",
                    rusqlite::params![
                        update.count,
                        update.last_post_date.to_string(),
                        serde_json::to_string(&achievements)?,
                        username
                    ],
                )?;
            }

            Ok(Some(update))
        })
    }

    // -- Friends --

    pub fn add_friend_request(&self, requester: &str, receiver: &str) -> Result<RequestOutcome> {
        self.with_conn_mut(|conn| {
            let Some(requester_row) = query_user(conn, requester)? else {
                return Ok(RequestOutcome::NotFound);
            };
            let Some(receiver_row) = query_user(conn, receiver)? else {
                return Ok(RequestOutcome::NotFound);
            };

            if requester_row.friends.iter().any(|f| f == receiver) {
                return Ok(RequestOutcome::AlreadyFriends);
            }
            if receiver_row.pending_requests.iter().any(|p| p == requester) {
                return Ok(RequestOutcome::AlreadyPending);
            }

            let mut pending = receiver_row.pending_requests;
            pending.push(requester.to_string());
            write_pending(conn, receiver, &pending)?;

            Ok(RequestOutcome::Sent)
        })
    }

    /// Accept `requester`'s pending request addressed to `username`.
    /// Removes exactly one pending entry and inserts the friendship on
    /// both sides in the same writer-lock closure.
    pub fn accept_friend_request(&self, username: &str, requester: &str) -> Result<AcceptOutcome> {
        self.with_conn_mut(|conn| {
            let Some(user) = query_user(conn, username)? else {
                return Ok(AcceptOutcome::NotFound);
            };
            let Some(requester_row) = query_user(conn, requester)? else {
                return Ok(AcceptOutcome::NotFound);
            };

            if !user.pending_requests.iter().any(|p| p == requester) {
                return Ok(AcceptOutcome::NoPending);
            }

            let mut pending = user.pending_requests;
            pending.retain(|p| p != requester);

            let mut user_friends = user.friends;
            if !user_friends.iter().any(|f| f == requester) {
                user_friends.push(requester.to_string());
            }
            let mut requester_friends = requester_row.friends;
            if !requester_friends.iter().any(|f| f == username) {
                requester_friends.push(username.to_string());
            }

            write_pending(conn, username, &pending)?;
            write_friends(conn, username, &user_friends)?;
            write_friends(conn, requester, &requester_friends)?;

            Ok(AcceptOutcome::Accepted)
        })
    }

    /// Symmetric removal. Also cancels any pending request between the
    /// two users, in either direction. Returns false when `other` does
    /// not exist.
    pub fn remove_friend(&self, username: &str, other: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let Some(user) = query_user(conn, username)? else {
                return Ok(false);
            };
            let Some(other_row) = query_user(conn, other)? else {
                return Ok(false);
            };

            let mut user_friends = user.friends;
            user_friends.retain(|f| f != other);
            let mut user_pending = user.pending_requests;
            user_pending.retain(|p| p != other);

            let mut other_friends = other_row.friends;
            other_friends.retain(|f| f != username);
            let mut other_pending = other_row.pending_requests;
            other_pending.retain(|p| p != username);

            write_friends(conn, username, &user_friends)?;
            write_pending(conn, username, &user_pending)?;
            write_friends(conn, other, &other_friends)?;
            write_pending(conn, other, &other_pending)?;

            Ok(true)
        })
    }

    // -- Photos --

    /// Quota-checked insert. Counting and inserting run inside a single
    /// writer-lock closure, so two concurrent uploads by the same owner
    /// cannot overshoot the daily cap.
    pub fn insert_photo(
        &self,
        username: &str,
        date: NaiveDate,
        image_data: &str,
        caption: &str,
        challenge_title: &str,
        now: DateTime<Utc>,
    ) -> Result<PhotoOutcome> {
        self.with_conn_mut(|conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM photos WHERE username = ?1 AND vibe_date = ?2")?;
            let existing = stmt
                .query_map(rusqlite::params![username, date.to_string()], |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            if existing.len() >= MAX_PHOTOS_PER_DAY {
                return Ok(PhotoOutcome::QuotaExceeded);
            }

            // First post of the day gets the bare owner_date id; later
            // posts get a numeric suffix, skipping ids still taken after
            // deletions.
            let base = format!("{}_{}", username, date);
            let mut seq = 1;
            let mut id = base.clone();
            while existing.contains(&id) {
                seq += 1;
                id = format!("{base}_{seq}");
            }

            let photo = Photo {
                id,
                username: username.to_string(),
                vibe_date: date,
                image_data: image_data.to_string(),
                caption: caption.to_string(),
                challenge_title: challenge_title.to_string(),
                likes: Vec::new(),
                comments: Vec::new(),
                created_at: now,
            };

            conn.execute(
                "INSERT INTO photos (id, username, vibe_date, image_data, caption, challenge_title, likes, comments, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, '[]', '[]', ?7)",
                rusqlite::params![
                    photo.id,
                    photo.username,
                    photo.vibe_date.to_string(),
                    photo.image_data,
                    photo.caption,
                    photo.challenge_title,
                    fmt_ts(photo.created_at)
                ],
            )?;

            Ok(PhotoOutcome::Created {
                first_of_day: existing.is_empty(),
                photo,
            })
        })
    }

    pub fn get_photo(&self, id: &str) -> Result<Option<Photo>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {PHOTO_COLS} FROM photos WHERE id = ?1"))?;
            let row = stmt.query_row([id], photo_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn count_photos_for_day(&self, username: &str, date: NaiveDate) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM photos WHERE username = ?1 AND vibe_date = ?2",
                rusqlite::params![username, date.to_string()],
                |r| r.get(0),
            )?;
            Ok(count as usize)
        })
    }

    /// Photos posted by `owners` on `date`, newest-first, each with the
    /// owner's current profile image joined on.
    pub fn feed_for_day(
        &self,
        owners: &[String],
        date: NaiveDate,
    ) -> Result<Vec<(Photo, Option<String>)>> {
        if owners.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (2..=owners.len() + 1).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT p.id, p.username, p.vibe_date, p.image_data, p.caption, p.challenge_title,
                        p.likes, p.comments, p.created_at, u.profile_image
                 FROM photos p
                 LEFT JOIN users u ON p.username = u.username
                 WHERE p.vibe_date = ?1 AND p.username IN ({})
                 ORDER BY p.created_at DESC",
                placeholders.join(", ")
            );

            let date_str = date.to_string();
            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&date_str];
            params.extend(owners.iter().map(|o| o as &dyn rusqlite::types::ToSql));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok((photo_from_row(row)?, row.get::<_, Option<String>>(9)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn photos_for_owner_day(&self, username: &str, date: NaiveDate) -> Result<Vec<Photo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PHOTO_COLS} FROM photos
                 WHERE username = ?1 AND vibe_date = ?2
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![username, date.to_string()], photo_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All of an owner's photos from days before `today`, newest-first.
    pub fn memories(&self, username: &str, today: NaiveDate) -> Result<Vec<Photo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PHOTO_COLS} FROM photos
                 WHERE username = ?1 AND vibe_date != ?2
                 ORDER BY vibe_date DESC, created_at DESC"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![username, today.to_string()], photo_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Distinct past vibe days an owner has posted on, newest-first.
    pub fn memory_dates(&self, username: &str, today: NaiveDate) -> Result<Vec<NaiveDate>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT vibe_date FROM photos
                 WHERE username = ?1 AND vibe_date != ?2
                 ORDER BY vibe_date DESC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![username, today.to_string()], |row| {
                    date_col(row, 0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Toggle `actor`'s membership in the photo's like set. A single
    /// read-modify-write under the writer lock; concurrent toggles on the
    /// same photo cannot double-count. Returns `None` when the photo does
    /// not exist.
    pub fn toggle_like(&self, photo_id: &str, actor: &str) -> Result<Option<LikeOutcome>> {
        self.with_conn_mut(|conn| {
            let row = conn
                .query_row(
                    "SELECT username, likes FROM photos WHERE id = ?1",
                    [photo_id],
                    |row| Ok((row.get::<_, String>(0)?, json_col::<Vec<String>>(row, 1)?)),
                )
                .optional()?;

            let Some((owner, mut likes)) = row else {
                return Ok(None);
            };

            let liked = if likes.iter().any(|l| l == actor) {
                likes.retain(|l| l != actor);
                false
            } else {
                likes.push(actor.to_string());
                true
            };

            conn.execute(
                "UPDATE photos SET likes = ?1 WHERE id = ?2",
                rusqlite::params![serde_json::to_string(&likes)?, photo_id],
            )?;

            Ok(Some(LikeOutcome { liked, owner }))
        })
    }

    /// Append a comment to the photo's list. Returns the owner and the
    /// stored comment, or `None` when the photo does not exist.
    pub fn add_comment(
        &self,
        photo_id: &str,
        username: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(String, Comment)>> {
        self.with_conn_mut(|conn| {
            let row = conn
                .query_row(
                    "SELECT username, comments FROM photos WHERE id = ?1",
                    [photo_id],
                    |row| Ok((row.get::<_, String>(0)?, json_col::<Vec<Comment>>(row, 1)?)),
                )
                .optional()?;

            let Some((owner, mut comments)) = row else {
                return Ok(None);
            };

            let comment = Comment {
                username: username.to_string(),
                text: text.to_string(),
                timestamp: now,
            };
            comments.push(comment.clone());

            conn.execute(
                "UPDATE photos SET comments = ?1 WHERE id = ?2",
                rusqlite::params![serde_json::to_string(&comments)?, photo_id],
            )?;

            Ok(Some((owner, comment)))
        })
    }

    pub fn delete_photo(&self, photo_id: &str, requester: &str) -> Result<DeleteOutcome> {
        self.with_conn_mut(|conn| {
            let owner = conn
                .query_row("SELECT username FROM photos WHERE id = ?1", [photo_id], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;

            match owner {
                None => Ok(DeleteOutcome::NotFound),
                Some(owner) if owner != requester => Ok(DeleteOutcome::Forbidden),
                Some(_) => {
                    conn.execute("DELETE FROM photos WHERE id = ?1", [photo_id])?;
                    Ok(DeleteOutcome::Deleted)
                }
            }
        })
    }

    // -- Challenges --

    pub fn challenge_catalogue(&self) -> Result<Vec<Challenge>> {
        self.with_conn(|conn| query_catalogue(conn))
    }

    pub fn add_challenge(&self, icon: &str, title: &str, description: &str) -> Result<Challenge> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO challenges (icon, title, description) VALUES (?1, ?2, ?3)",
                rusqlite::params![icon, title, description],
            )?;
            Ok(Challenge {
                id: conn.last_insert_rowid(),
                icon: icon.to_string(),
                title: title.to_string(),
                description: description.to_string(),
            })
        })
    }

    /// Pin a challenge to one date, replacing any prior override for that
    /// date. Returns false when the challenge id is not in the catalogue.
    pub fn set_override(&self, date: NaiveDate, challenge_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM challenges WHERE id = ?1",
                [challenge_id],
                |r| r.get(0),
            )?;
            if exists == 0 {
                return Ok(false);
            }
            conn.execute(
                "INSERT OR REPLACE INTO challenge_overrides (vibe_date, challenge_id) VALUES (?1, ?2)",
                rusqlite::params![date.to_string(), challenge_id],
            )?;
            Ok(true)
        })
    }

    /// The challenge for a vibe day: the rotation formula over the
    /// catalogue, unless an override pins that date. `None` only when the
    /// catalogue is empty, which seeding rules out.
    pub fn select_challenge(&self, date: NaiveDate) -> Result<Option<Challenge>> {
        self.with_conn(|conn| {
            let catalogue = query_catalogue(conn)?;
            if catalogue.is_empty() {
                return Ok(None);
            }

            let overridden: Option<i64> = conn
                .query_row(
                    "SELECT challenge_id FROM challenge_overrides WHERE vibe_date = ?1",
                    [date.to_string()],
                    |r| r.get(0),
                )
                .optional()?;

            if let Some(id) = overridden {
                if let Some(found) = catalogue.iter().find(|c| c.id == id) {
                    return Ok(Some(found.clone()));
                }
            }

            let idx = challenge::rotation_index(date, catalogue.len());
            Ok(Some(catalogue[idx].clone()))
        })
    }

    // -- Notifications --

    pub fn append_notification(&self, n: &Notification) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, recipient, title, body, kind, origin, payload, created_at, read)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    n.id.to_string(),
                    n.recipient,
                    n.title,
                    n.body,
                    n.payload.kind(),
                    n.origin,
                    serde_json::to_string(&n.payload)?,
                    fmt_ts(n.timestamp),
                    n.read
                ],
            )?;
            Ok(())
        })
    }

    /// Newest-first page of the recipient's inbox, plus the unread count
    /// within that page.
    pub fn notifications_for(
        &self,
        recipient: &str,
        limit: u32,
    ) -> Result<(Vec<Notification>, usize)> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, recipient, title, body, origin, payload, created_at, read
                 FROM notifications
                 WHERE recipient = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![recipient, limit], notification_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let unread = rows.iter().filter(|n| !n.read).count();
            Ok((rows, unread))
        })
    }

    /// Mark one of the recipient's notifications read. Silently does
    /// nothing when the id is unknown or belongs to someone else.
    pub fn mark_notification_read(&self, recipient: &str, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND recipient = ?2",
                rusqlite::params![id, recipient],
            )?;
            Ok(())
        })
    }

    pub fn clear_notifications(&self, recipient: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let affected =
                conn.execute("DELETE FROM notifications WHERE recipient = ?1", [recipient])?;
            Ok(affected)
        })
    }

    // -- Device registry --

    /// Upsert the recipient's live-delivery endpoint with a fresh TTL.
    pub fn register_device(
        &self,
        username: &str,
        endpoint: &str,
        platform: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO devices (username, endpoint, platform, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![username, endpoint, platform, fmt_ts(expires_at)],
            )?;
            Ok(())
        })
    }

    /// The recipient's endpoint, if registered and not past its TTL.
    pub fn device_endpoint(&self, username: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let endpoint = conn
                .query_row(
                    "SELECT endpoint FROM devices WHERE username = ?1 AND expires_at > ?2",
                    rusqlite::params![username, fmt_ts(now)],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(endpoint)
        })
    }

    pub fn prune_expired_devices(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let affected = conn.execute(
                "DELETE FROM devices WHERE expires_at <= ?1",
                rusqlite::params![fmt_ts(now)],
            )?;
            Ok(affected)
        })
    }
}

// -- Row mapping --

fn query_user(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLS} FROM users WHERE username = ?1"))?;
    let row = stmt.query_row([username], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        username: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        profile_image: row.get(3)?,
        memories_public: row.get(4)?,
        streak_count: row.get::<_, i64>(5)? as u32,
        last_post_date: opt_date_col(row, 6)?,
        achievements: json_col(row, 7)?,
        friends: json_col(row, 8)?,
        pending_requests: json_col(row, 9)?,
        created_at: ts_col(row, 10)?,
    })
}

fn photo_from_row(row: &Row) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        username: row.get(1)?,
        vibe_date: date_col(row, 2)?,
        image_data: row.get(3)?,
        caption: row.get(4)?,
        challenge_title: row.get(5)?,
        likes: json_col(row, 6)?,
        comments: json_col(row, 7)?,
        created_at: ts_col(row, 8)?,
    })
}

fn notification_from_row(row: &Row) -> rusqlite::Result<Notification> {
    let id: String = row.get(0)?;
    let id = id
        .parse::<Uuid>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    Ok(Notification {
        id,
        recipient: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        origin: row.get(4)?,
        payload: json_col(row, 5)?,
        timestamp: ts_col(row, 6)?,
        read: row.get(7)?,
    })
}

fn query_catalogue(conn: &Connection) -> Result<Vec<Challenge>> {
    let mut stmt =
        conn.prepare("SELECT id, icon, title, description FROM challenges ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Challenge {
                id: row.get(0)?,
                icon: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn write_friends(conn: &Connection, username: &str, friends: &[String]) -> Result<()> {
    conn.execute(
        "UPDATE users SET friends = ?1 WHERE username = ?2",
        rusqlite::params![serde_json::to_string(friends)?, username],
    )?;
    Ok(())
}

fn write_pending(conn: &Connection, username: &str, pending: &[String]) -> Result<()> {
    conn.execute(
        "UPDATE users SET pending_requests = ?1 WHERE username = ?2",
        rusqlite::params![serde_json::to_string(pending)?, username],
    )?;
    Ok(())
}

// -- Column helpers --

/// Timestamps are stored as normalized RFC 3339 so lexicographic order
/// matches chronological order.
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_col(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn date_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    s.parse::<NaiveDate>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_date_col(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        None => Ok(None),
        Some(s) => s
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
    }
}

fn json_col<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    serde_json::from_str(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
