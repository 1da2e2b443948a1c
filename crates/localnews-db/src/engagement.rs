//! Per-(user, video) interaction state and the aggregate counters derived
//! from it.
//!
//! `videos.like_count` must always equal the number of interaction rows for
//! that video with `has_liked = 1`, and `watch_count` the number with
//! `has_watched = 1`. These functions are the only writers of either side.
//! Each one runs as a single `IMMEDIATE` transaction on the writer
//! connection and adjusts counters in SQL, so concurrent toggles from
//! different users cannot lose updates and a failure leaves no partial
//! state behind.

use std::collections::HashMap;

use crate::models::InteractionRow;
use crate::{Database, OptionalExt};
use anyhow::Result;
use rusqlite::{Connection, TransactionBehavior};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    pub like_count: i64,
    pub has_liked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchRecord {
    /// True when this call flipped `has_watched` and bumped the counter.
    pub first_watch: bool,
    pub watch_duration: i64,
    pub watch_count: i64,
}

impl Database {
    /// Flip the user's like on a video and move the counter with it.
    /// Returns `None` when the video does not exist or is inactive.
    pub fn toggle_like(&self, video_id: i64, user_id: i64) -> Result<Option<LikeToggle>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if !video_is_active(&tx, video_id)? {
                return Ok(None);
            }

            let current = load_or_create(&tx, user_id, video_id)?;
            let has_liked = !current.has_liked;

            tx.execute(
                "UPDATE interactions SET has_liked = ?3, updated_at = datetime('now')
                 WHERE user_id = ?1 AND video_id = ?2",
                rusqlite::params![user_id, video_id, has_liked],
            )?;

            let counter_sql = if has_liked {
                "UPDATE videos SET like_count = like_count + 1 WHERE id = ?1"
            } else {
                "UPDATE videos SET like_count = MAX(like_count - 1, 0) WHERE id = ?1"
            };
            tx.execute(counter_sql, [video_id])?;

            let like_count: i64 =
                tx.query_row("SELECT like_count FROM videos WHERE id = ?1", [video_id], |r| r.get(0))?;
            tx.commit()?;

            debug!(
                "User {} {} video {} (like_count={})",
                user_id,
                if has_liked { "liked" } else { "unliked" },
                video_id,
                like_count
            );
            Ok(Some(LikeToggle { like_count, has_liked }))
        })
    }

    /// Record that the user watched `watch_duration` seconds of a video.
    /// The watch counter moves only on the first watch; the stored duration
    /// is the high-watermark across calls. Returns `None` when the video
    /// is missing or inactive. Callers reject negative durations before this point.
    pub fn record_watch(
        &self,
        video_id: i64,
        user_id: i64,
        watch_duration: i64,
    ) -> Result<Option<WatchRecord>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if !video_is_active(&tx, video_id)? {
                return Ok(None);
            }

            let current = load_or_create(&tx, user_id, video_id)?;
            let first_watch = !current.has_watched;
            let watch_duration = current.watch_duration.max(watch_duration);

            tx.execute(
                "UPDATE interactions SET has_watched = 1, watch_duration = ?3, updated_at = datetime('now')
                 WHERE user_id = ?1 AND video_id = ?2",
                rusqlite::params![user_id, video_id, watch_duration],
            )?;

            if first_watch {
                tx.execute(
                    "UPDATE videos SET watch_count = watch_count + 1 WHERE id = ?1",
                    [video_id],
                )?;
            }

            let watch_count: i64 =
                tx.query_row("SELECT watch_count FROM videos WHERE id = ?1", [video_id], |r| r.get(0))?;
            tx.commit()?;

            Ok(Some(WatchRecord {
                first_watch,
                watch_duration,
                watch_count,
            }))
        })
    }

    /// The user's interaction with a video, if any was ever recorded.
    pub fn get_interaction(&self, user_id: i64, video_id: i64) -> Result<Option<InteractionRow>> {
        self.with_conn(|conn| query_interaction(conn, user_id, video_id))
    }

    /// Batch-fetch one user's interactions for a set of videos.
    pub fn get_interactions(&self, user_id: i64, video_ids: &[i64]) -> Result<HashMap<i64, InteractionRow>> {
        if video_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (2..=video_ids.len() + 1).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT video_id, has_liked, has_watched, watch_duration FROM interactions
                 WHERE user_id = ?1 AND video_id IN ({})",
                placeholders.join(", ")
            );

            let params: Vec<i64> = std::iter::once(user_id).chain(video_ids.iter().copied()).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), interaction_from_row)?
                .map(|r| r.map(|row| (row.video_id, row)))
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;

            Ok(rows)
        })
    }

    /// Counters recomputed from interaction rows: (likes, watches).
    pub fn derived_counts(&self, video_id: i64) -> Result<(i64, i64)> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COALESCE(SUM(has_liked), 0), COALESCE(SUM(has_watched), 0)
                 FROM interactions WHERE video_id = ?1",
                [video_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?)
        })
    }
}

/// Inactive videos are invisible to users, so they cannot be engaged with
/// either.
fn video_is_active(conn: &Connection, video_id: i64) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM videos WHERE id = ?1 AND active = 1",
            [video_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// Create-on-first-write: a missing row is inserted with everything false.
fn load_or_create(conn: &Connection, user_id: i64, video_id: i64) -> Result<InteractionRow> {
    conn.execute(
        "INSERT OR IGNORE INTO interactions (user_id, video_id) VALUES (?1, ?2)",
        (user_id, video_id),
    )?;
    query_interaction(conn, user_id, video_id)?
        .ok_or_else(|| anyhow::anyhow!("Interaction ({}, {}) vanished mid-transaction", user_id, video_id))
}

fn query_interaction(conn: &Connection, user_id: i64, video_id: i64) -> Result<Option<InteractionRow>> {
    conn.query_row(
        "SELECT video_id, has_liked, has_watched, watch_duration FROM interactions
         WHERE user_id = ?1 AND video_id = ?2",
        (user_id, video_id),
        interaction_from_row,
    )
    .optional()
}

fn interaction_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InteractionRow> {
    Ok(InteractionRow {
        video_id: row.get(0)?,
        has_liked: row.get(1)?,
        has_watched: row.get(2)?,
        watch_duration: row.get(3)?,
    })
}
