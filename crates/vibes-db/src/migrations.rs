use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                username          TEXT PRIMARY KEY,
                email             TEXT NOT NULL UNIQUE,
                password          TEXT NOT NULL,
                profile_image     TEXT,
                memories_public   INTEGER NOT NULL DEFAULT 0,
                streak_count      INTEGER NOT NULL DEFAULT 0,
                last_post_date    TEXT,
                achievements      TEXT NOT NULL DEFAULT '[]',
                friends           TEXT NOT NULL DEFAULT '[]',
                pending_requests  TEXT NOT NULL DEFAULT '[]',
                created_at        TEXT NOT NULL
            );

            CREATE TABLE photos (
                id               TEXT PRIMARY KEY,
                username         TEXT NOT NULL REFERENCES users(username),
                vibe_date        TEXT NOT NULL,
                image_data       TEXT NOT NULL,
                caption          TEXT NOT NULL DEFAULT '',
                challenge_title  TEXT NOT NULL,
                likes            TEXT NOT NULL DEFAULT '[]',
                comments         TEXT NOT NULL DEFAULT '[]',
                created_at       TEXT NOT NULL
            );

            CREATE INDEX idx_photos_owner_day ON photos(username, vibe_date);
            CREATE INDEX idx_photos_day ON photos(vibe_date);

            CREATE TABLE challenges (
                id           INTEGER PRIMARY KEY,
                icon         TEXT NOT NULL,
                title        TEXT NOT NULL,
                description  TEXT NOT NULL
            );

            CREATE TABLE challenge_overrides (
                vibe_date     TEXT PRIMARY KEY,
                challenge_id  INTEGER NOT NULL REFERENCES challenges(id)
            );

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                recipient   TEXT NOT NULL REFERENCES users(username),
                title       TEXT NOT NULL,
                body        TEXT NOT NULL,
                kind        TEXT NOT NULL,
                origin      TEXT NOT NULL DEFAULT 'system',
                payload     TEXT NOT NULL DEFAULT '{}',
                created_at  TEXT NOT NULL,
                read        INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_notifications_recipient
                ON notifications(recipient, created_at);

            CREATE TABLE devices (
                username    TEXT PRIMARY KEY REFERENCES users(username),
                endpoint    TEXT NOT NULL,
                platform    TEXT,
                expires_at  TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    seed_challenges(conn)?;

    info!("Database migrations complete");
    Ok(())
}

/// Insert the default challenge catalogue, but only when the table is
/// empty. Safe to run on every startup.
pub fn seed_challenges(conn: &Connection) -> Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM challenges", [], |r| r.get(0))?;
    if count > 0 {
        return Ok(());
    }

    let defaults: &[(i64, &str, &str, &str)] = &[
        (1, "😊", "Smile", "Show your best smile!"),
        (2, "✌️", "Peace", "Flash the peace sign!"),
        (3, "💼", "Workspace", "Your desk, no tidying up first"),
        (4, "🌅", "Morning View", "The first thing you see after waking up"),
        (5, "🍿", "Snack Time", "Your current snack"),
        (6, "🪟", "Window View", "The view out of your window"),
        (7, "👟", "Shoes", "The shoes you are wearing right now"),
        (8, "🎧", "Music", "What are you listening to?"),
        (9, "☕", "Drink", "Your current drink"),
        (10, "📱", "Phone", "Your home screen"),
    ];

    for (id, icon, title, description) in defaults {
        conn.execute(
            "INSERT INTO challenges (id, icon, title, description) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, icon, title, description],
        )?;
    }

    info!("Seeded {} default challenges", defaults.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
        seed_challenges(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM challenges", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 10);
    }
}
