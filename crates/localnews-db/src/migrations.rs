use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE districts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL UNIQUE,
                code        TEXT NOT NULL UNIQUE,
                active      INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                mobile_number   TEXT NOT NULL UNIQUE,
                otp             TEXT,
                otp_expiry      INTEGER,
                verified        INTEGER NOT NULL DEFAULT 0,
                district_id     INTEGER REFERENCES districts(id),
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_users_district ON users(district_id);

            CREATE TABLE admin_users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                email           TEXT,
                active          INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE videos (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL,
                description     TEXT,
                video_url       TEXT NOT NULL,
                thumbnail_url   TEXT,
                duration        INTEGER,
                district_id     INTEGER REFERENCES districts(id),
                posted_by       INTEGER REFERENCES admin_users(id),
                active          INTEGER NOT NULL DEFAULT 1,
                like_count      INTEGER NOT NULL DEFAULT 0,
                watch_count     INTEGER NOT NULL DEFAULT 0,
                created_at      INTEGER NOT NULL
            );

            CREATE INDEX idx_videos_created ON videos(created_at);
            CREATE INDEX idx_videos_district_active
                ON videos(district_id, active, created_at);

            CREATE TABLE interactions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                video_id        INTEGER NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                has_liked       INTEGER NOT NULL DEFAULT 0,
                has_watched     INTEGER NOT NULL DEFAULT 0,
                watch_duration  INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(user_id, video_id)
            );

            CREATE INDEX idx_interactions_video ON interactions(video_id);

            CREATE TABLE comments (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id             INTEGER NOT NULL REFERENCES users(id),
                video_id            INTEGER NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                comment_text        TEXT NOT NULL,
                visible_to_user     INTEGER NOT NULL DEFAULT 1,
                created_at          INTEGER NOT NULL
            );

            CREATE INDEX idx_comments_video_user ON comments(video_id, user_id);

            CREATE TABLE user_devices (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                device_token    TEXT NOT NULL,
                platform        TEXT NOT NULL DEFAULT 'android',
                active          INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(user_id, device_token)
            );

            CREATE TABLE sessions (
                id          TEXT PRIMARY KEY,
                subject     TEXT NOT NULL,
                expires_at  INTEGER NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
