use std::collections::HashMap;

use crate::models::{CommentRow, NewVideo, VideoRow};
use crate::{Database, OptionalExt, unix_now};
use anyhow::Result;
use rusqlite::{Connection, Row};
use tracing::info;

const VIDEO_SELECT: &str = "SELECT v.id, v.title, v.description, v.video_url, v.thumbnail_url, v.duration,
        v.district_id, d.name, v.posted_by, v.active, v.like_count, v.watch_count, v.created_at
 FROM videos v
 LEFT JOIN districts d ON v.district_id = d.id";

impl Database {
    // -- Videos --

    pub fn insert_video(&self, video: &NewVideo<'_>) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO videos (title, description, video_url, thumbnail_url, duration,
                                     district_id, posted_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    video.title,
                    video.description,
                    video.video_url,
                    video.thumbnail_url,
                    video.duration,
                    video.district_id,
                    video.posted_by,
                    unix_now(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_video(&self, id: i64) -> Result<Option<VideoRow>> {
        self.with_conn(|conn| {
            let sql = format!("{VIDEO_SELECT} WHERE v.id = ?1");
            conn.query_row(&sql, [id], video_from_row).optional()
        })
    }

    /// One page of active videos, newest first, restricted to `district_id`
    /// when given. Returns the page and the total number of matching videos.
    pub fn get_feed(
        &self,
        district_id: Option<i64>,
        page: u32,
        size: u32,
    ) -> Result<(Vec<VideoRow>, i64)> {
        self.with_conn(|conn| {
            let filter = "v.active = 1 AND (?1 IS NULL OR v.district_id = ?1)";

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM videos v WHERE {filter}"),
                [district_id],
                |r| r.get(0),
            )?;

            let sql = format!(
                "{VIDEO_SELECT} WHERE {filter} ORDER BY v.created_at DESC, v.id DESC LIMIT ?2 OFFSET ?3"
            );
            let offset = i64::from(page) * i64::from(size);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![district_id, size, offset], video_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total))
        })
    }

    /// Every video, active or not, newest first.
    pub fn list_videos(&self) -> Result<Vec<VideoRow>> {
        self.with_conn(|conn| {
            let sql = format!("{VIDEO_SELECT} ORDER BY v.created_at DESC, v.id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], video_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_videos(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM videos", [], |r| r.get(0))?))
    }

    /// Delete a video with its comments and interactions in one transaction.
    /// Returns false when the video did not exist.
    pub fn delete_video(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let comments = tx.execute("DELETE FROM comments WHERE video_id = ?1", [id])?;
            let interactions = tx.execute("DELETE FROM interactions WHERE video_id = ?1", [id])?;
            let deleted = tx.execute("DELETE FROM videos WHERE id = ?1", [id])? > 0;
            tx.commit()?;

            if deleted {
                info!(
                    "Deleted video {} ({} comments, {} interactions)",
                    id, comments, interactions
                );
            }
            Ok(deleted)
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, video_id: i64, user_id: i64, text: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO comments (video_id, user_id, comment_text, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![video_id, user_id, text, unix_now()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// A user's own comments on a video, newest first.
    pub fn get_user_comments(&self, video_id: i64, user_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| query_comments(conn, "c.video_id = ?1 AND c.user_id = ?2", &[video_id, user_id]))
    }

    /// All comments on a video including hidden ones, newest first.
    pub fn get_all_comments(&self, video_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| query_comments(conn, "c.video_id = ?1", &[video_id]))
    }

    /// Batch-count visible comments for a set of video IDs.
    pub fn count_visible_comments(&self, video_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        if video_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=video_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT video_id, COUNT(*) FROM comments
                 WHERE visible_to_user = 1 AND video_id IN ({})
                 GROUP BY video_id",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let counts = stmt
                .query_map(rusqlite::params_from_iter(video_ids), |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;

            Ok(counts)
        })
    }
}

fn query_comments(conn: &Connection, filter: &str, ids: &[i64]) -> Result<Vec<CommentRow>> {
    // JOIN users to fetch the author's mobile number in a single query
    let sql = format!(
        "SELECT c.id, c.video_id, c.user_id, u.mobile_number, c.comment_text, c.visible_to_user, c.created_at
         FROM comments c
         LEFT JOIN users u ON c.user_id = u.id
         WHERE {filter}
         ORDER BY c.created_at DESC, c.id DESC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(ids), |row| {
            Ok(CommentRow {
                id: row.get(0)?,
                video_id: row.get(1)?,
                user_id: row.get(2)?,
                mobile_number: row
                    .get::<_, Option<String>>(3)?
                    .unwrap_or_else(|| "Unknown".to_string()),
                comment_text: row.get(4)?,
                visible_to_user: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<VideoRow> {
    Ok(VideoRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        video_url: row.get(3)?,
        thumbnail_url: row.get(4)?,
        duration: row.get(5)?,
        district_id: row.get(6)?,
        district_name: row.get(7)?,
        posted_by: row.get(8)?,
        active: row.get(9)?,
        like_count: row.get(10)?,
        watch_count: row.get(11)?,
        created_at: row.get(12)?,
    })
}
