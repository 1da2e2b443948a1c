//! Likes, watches and comments, and the per-user video projection.
//!
//! Input is validated here before anything touches storage; the counter
//! bookkeeping itself is transactional in `localnews_db::engagement`.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use localnews_db::Database;
use localnews_db::engagement::{LikeToggle, WatchRecord};
use localnews_db::models::{CommentRow, InteractionRow, VideoRow};
use localnews_types::api::{FeedResponse, VideoResponse};
use localnews_types::models::{Comment, User};

pub const MAX_COMMENT_CHARS: usize = 1000;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum EngagementError {
    #[error("Video not found")]
    VideoNotFound,

    #[error("Invalid watch duration")]
    InvalidDuration,

    #[error("Comment text is required")]
    EmptyComment,

    #[error("Comment must not exceed 1000 characters")]
    CommentTooLong,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub fn toggle_like(db: &Database, video_id: i64, user_id: i64) -> Result<LikeToggle, EngagementError> {
    db.toggle_like(video_id, user_id)?
        .ok_or(EngagementError::VideoNotFound)
}

/// Watching again never re-counts; the duration only ever grows.
pub fn record_watch(
    db: &Database,
    video_id: i64,
    user_id: i64,
    watch_duration: i64,
) -> Result<WatchRecord, EngagementError> {
    if watch_duration < 0 {
        return Err(EngagementError::InvalidDuration);
    }

    let record = db
        .record_watch(video_id, user_id, watch_duration)?
        .ok_or(EngagementError::VideoNotFound)?;

    if record.first_watch {
        info!("User {} watched video {} for the first time", user_id, video_id);
    }
    Ok(record)
}

pub fn add_comment(db: &Database, video_id: i64, user_id: i64, text: &str) -> Result<i64, EngagementError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(EngagementError::EmptyComment);
    }
    if text.chars().count() > MAX_COMMENT_CHARS {
        return Err(EngagementError::CommentTooLong);
    }

    active_video(db, video_id)?;
    Ok(db.insert_comment(video_id, user_id, text)?)
}

/// A user's own comments on an existing video.
pub fn user_comments(db: &Database, video_id: i64, user_id: i64) -> Result<Vec<Comment>, EngagementError> {
    active_video(db, video_id)?;
    Ok(db
        .get_user_comments(video_id, user_id)?
        .into_iter()
        .map(comment_from_row)
        .collect())
}

/// One active video as seen by `user_id`.
pub fn video_for_user(db: &Database, video_id: i64, user_id: i64) -> Result<VideoResponse, EngagementError> {
    let video = active_video(db, video_id)?;

    let interaction = db.get_interaction(user_id, video_id)?;
    let comment_count = db
        .count_visible_comments(&[video_id])?
        .get(&video_id)
        .copied()
        .unwrap_or(0);

    Ok(project(video, interaction, comment_count))
}

/// Users only ever see, and engage with, active videos.
fn active_video(db: &Database, video_id: i64) -> Result<VideoRow, EngagementError> {
    db.get_video(video_id)?
        .filter(|v| v.active)
        .ok_or(EngagementError::VideoNotFound)
}

/// The user's district feed (every district when they have none), newest
/// first. `size` is clamped to `1..=MAX_PAGE_SIZE`.
pub fn feed_for_user(db: &Database, user: &User, page: u32, size: u32) -> Result<FeedResponse, EngagementError> {
    let size = size.clamp(1, MAX_PAGE_SIZE);
    let (rows, total) = db.get_feed(user.district_id, page, size)?;

    let ids: Vec<i64> = rows.iter().map(|v| v.id).collect();
    let interactions = db.get_interactions(user.id, &ids)?;
    let comment_counts = db.count_visible_comments(&ids)?;

    let videos = rows
        .into_iter()
        .map(|video| {
            let interaction = interactions.get(&video.id).copied();
            let comments = comment_counts.get(&video.id).copied().unwrap_or(0);
            project(video, interaction, comments)
        })
        .collect();

    let size = i64::from(size);
    Ok(FeedResponse {
        videos,
        total_elements: total,
        total_pages: (total + size - 1) / size,
        current_page: page,
    })
}

/// Join a video with the viewer's interaction row. No row means the viewer
/// has neither liked nor watched it.
pub fn project(video: VideoRow, interaction: Option<InteractionRow>, comment_count: i64) -> VideoResponse {
    let interaction = interaction.unwrap_or_default();

    VideoResponse {
        id: video.id,
        title: video.title,
        description: video.description,
        video_url: video.video_url,
        thumbnail_url: video.thumbnail_url,
        duration: video.duration,
        district_id: video.district_id,
        district_name: video.district_name,
        like_count: video.like_count,
        watch_count: video.watch_count,
        comment_count,
        has_liked: interaction.has_liked,
        has_watched: interaction.has_watched,
        created_at: timestamp(video.created_at),
    }
}

pub(crate) fn comment_from_row(row: CommentRow) -> Comment {
    Comment {
        id: row.id,
        video_id: row.video_id,
        user_id: row.user_id,
        user_name: row.mobile_number,
        comment_text: row.comment_text,
        visible_to_user: row.visible_to_user,
        created_at: timestamp(row.created_at),
    }
}

pub(crate) fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(|| {
        warn!("Corrupt timestamp {}", secs);
        DateTime::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use localnews_db::models::NewVideo;

    struct Fixture {
        db: Database,
        agra_user: User,
        other_user: User,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        db.seed_districts(&[("Agra", "AGR"), ("Kanpur", "KNP")]).unwrap();
        db.create_admin("admin", "hash", None).unwrap();

        let mut users = Vec::new();
        for (mobile, district) in [("9000000001", 1), ("9000000002", 2)] {
            let id = db.upsert_user_otp(mobile, "000000", 0).unwrap();
            db.mark_user_verified(id, district).unwrap();
            users.push(User {
                id,
                mobile_number: mobile.into(),
                verified: true,
                district_id: Some(district),
            });
        }
        let other_user = users.pop().unwrap();
        let agra_user = users.pop().unwrap();
        Fixture { db, agra_user, other_user }
    }

    fn add_video(db: &Database, title: &str, district_id: i64) -> i64 {
        db.insert_video(&NewVideo {
            title,
            description: Some("desc"),
            video_url: "https://cdn.example/v.mp4",
            thumbnail_url: None,
            duration: Some(90),
            district_id,
            posted_by: 1,
        })
        .unwrap()
    }

    #[test]
    fn double_toggle_restores_state() {
        let f = fixture();
        let video = add_video(&f.db, "v", 1);
        let before = video_for_user(&f.db, video, f.agra_user.id).unwrap();

        toggle_like(&f.db, video, f.agra_user.id).unwrap();
        let mid = video_for_user(&f.db, video, f.agra_user.id).unwrap();
        assert!(mid.has_liked);
        assert_eq!(mid.like_count, before.like_count + 1);

        toggle_like(&f.db, video, f.agra_user.id).unwrap();
        let after = video_for_user(&f.db, video, f.agra_user.id).unwrap();
        assert_eq!(after.has_liked, before.has_liked);
        assert_eq!(after.like_count, before.like_count);
    }

    #[test]
    fn like_on_missing_video() {
        let f = fixture();
        assert!(matches!(toggle_like(&f.db, 404, f.agra_user.id), Err(EngagementError::VideoNotFound)));
    }

    #[test]
    fn watch_is_counted_once_per_user() {
        let f = fixture();
        let video = add_video(&f.db, "v", 1);

        record_watch(&f.db, video, f.agra_user.id, 5).unwrap();
        let again = record_watch(&f.db, video, f.agra_user.id, 3).unwrap();
        assert_eq!(again.watch_duration, 5);
        assert_eq!(again.watch_count, 1);

        record_watch(&f.db, video, f.other_user.id, 0).unwrap();
        let view = video_for_user(&f.db, video, f.agra_user.id).unwrap();
        assert_eq!(view.watch_count, 2);
        assert!(view.has_watched);
    }

    #[test]
    fn negative_duration_is_rejected_without_writing() {
        let f = fixture();
        let video = add_video(&f.db, "v", 1);

        let err = record_watch(&f.db, video, f.agra_user.id, -1).unwrap_err();
        assert!(matches!(err, EngagementError::InvalidDuration));
        assert!(f.db.get_interaction(f.agra_user.id, video).unwrap().is_none());
    }

    #[test]
    fn projection_without_interaction_defaults_to_false() {
        let f = fixture();
        let video = add_video(&f.db, "v", 1);
        toggle_like(&f.db, video, f.other_user.id).unwrap();

        let view = video_for_user(&f.db, video, f.agra_user.id).unwrap();
        assert_eq!(view.like_count, 1);
        assert!(!view.has_liked);
        assert!(!view.has_watched);
    }

    #[test]
    fn inactive_video_is_hidden() {
        let f = fixture();
        let video = add_video(&f.db, "v", 1);
        f.db.with_conn_mut(|c| {
            c.execute("UPDATE videos SET active = 0 WHERE id = ?1", [video])?;
            Ok(())
        })
        .unwrap();

        assert!(matches!(
            video_for_user(&f.db, video, f.agra_user.id),
            Err(EngagementError::VideoNotFound)
        ));
        assert!(matches!(toggle_like(&f.db, video, f.agra_user.id), Err(EngagementError::VideoNotFound)));
        assert!(matches!(
            record_watch(&f.db, video, f.agra_user.id, 3),
            Err(EngagementError::VideoNotFound)
        ));
        assert!(matches!(
            add_comment(&f.db, video, f.agra_user.id, "still there?"),
            Err(EngagementError::VideoNotFound)
        ));
    }

    #[test]
    fn comments_are_validated() {
        let f = fixture();
        let video = add_video(&f.db, "v", 1);

        assert!(matches!(add_comment(&f.db, video, f.agra_user.id, "   "), Err(EngagementError::EmptyComment)));
        let long = "x".repeat(MAX_COMMENT_CHARS + 1);
        assert!(matches!(add_comment(&f.db, video, f.agra_user.id, &long), Err(EngagementError::CommentTooLong)));
        assert!(matches!(add_comment(&f.db, 404, f.agra_user.id, "hi"), Err(EngagementError::VideoNotFound)));

        add_comment(&f.db, video, f.agra_user.id, "  Great report  ").unwrap();
        add_comment(&f.db, video, f.other_user.id, "Thanks").unwrap();

        let mine = user_comments(&f.db, video, f.agra_user.id).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].comment_text, "Great report");
        assert_eq!(mine[0].user_name, "9000000001");

        let view = video_for_user(&f.db, video, f.agra_user.id).unwrap();
        assert_eq!(view.comment_count, 2);
    }

    #[test]
    fn feed_projects_per_user_state() {
        let f = fixture();
        let first = add_video(&f.db, "first", 1);
        let second = add_video(&f.db, "second", 1);
        add_video(&f.db, "kanpur", 2);
        toggle_like(&f.db, first, f.agra_user.id).unwrap();

        let feed = feed_for_user(&f.db, &f.agra_user, 0, 20).unwrap();
        assert_eq!(feed.total_elements, 2);
        assert_eq!(feed.total_pages, 1);
        let ids: Vec<i64> = feed.videos.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert!(feed.videos[1].has_liked);
        assert!(!feed.videos[0].has_liked);
    }

    #[test]
    fn feed_without_district_shows_everything() {
        let f = fixture();
        add_video(&f.db, "agra", 1);
        add_video(&f.db, "kanpur", 2);

        let drifter = User {
            district_id: None,
            ..f.agra_user.clone()
        };
        let feed = feed_for_user(&f.db, &drifter, 0, 0).unwrap();
        assert_eq!(feed.total_elements, 2);
        // size 0 is clamped to 1
        assert_eq!(feed.videos.len(), 1);
        assert_eq!(feed.total_pages, 2);
    }
}
