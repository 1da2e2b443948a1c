use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::{
    WithRejection,
    cookie::{Cookie, CookieJar, SameSite},
};
use tracing::{info, warn};

use localnews_db::models::{NewVideo, VideoRow};
use localnews_db::unix_now;
use localnews_types::api::{
    AdminLoginRequest, AdminLoginResponse, AdminVideoList, AdminVideoResponse, CommentsResponse,
    CreateVideoRequest, CreateVideoResponse, DashboardResponse, DistrictRef, DistrictStats,
    StatusResponse,
};
use localnews_types::models::admin_subject;

use crate::auth::{AppState, blocking, verify_password};
use crate::engagement::{comment_from_row, timestamp};
use crate::error::{ApiError, JsonBody};
use crate::middleware::{CurrentAdmin, SESSION_COOKIE};
use crate::notify::notify_new_video;

const MAX_TITLE_CHARS: usize = 255;

struct LoggedIn {
    admin_id: i64,
    username: String,
    token: String,
    session_id: String,
}

/// POST /api/admin/login
///
/// Answers with a bearer token for API clients and a session cookie for
/// the web console. Any failure is reported as a plain 401.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): JsonBody<AdminLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let logged_in = blocking(&state, move |s| {
        let Some(admin) = s.db.get_active_admin(&req.username)? else {
            warn!("Admin login for unknown or inactive account {}", req.username);
            return Err(ApiError::Unauthenticated);
        };
        if !verify_password(&req.password, &admin.password_hash) {
            warn!("Admin login with wrong password for {}", admin.username);
            return Err(ApiError::Unauthenticated);
        }

        let subject = admin_subject(&admin.username);
        let token = s.tokens.issue(&subject).map_err(anyhow::Error::from)?;

        let session_id = uuid::Uuid::new_v4().to_string();
        let expires_at = unix_now() + s.session_ttl.num_seconds();
        s.db.create_session(&session_id, &subject, expires_at)?;

        Ok(LoggedIn {
            admin_id: admin.id,
            username: admin.username,
            token,
            session_id,
        })
    })
    .await?;

    info!("Admin {} logged in", logged_in.username);

    let cookie = Cookie::build((SESSION_COOKIE, logged_in.session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((
        jar.add(cookie),
        Json(AdminLoginResponse {
            success: true,
            token: logged_in.token,
            admin_id: logged_in.admin_id,
            username: logged_in.username,
        }),
    ))
}

fn validate_video(req: &CreateVideoRequest) -> Result<(), ApiError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("Title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::Validation("Title must not exceed 255 characters".into()));
    }
    if req.video_url.trim().is_empty() {
        return Err(ApiError::Validation("Video URL is required".into()));
    }
    if req.duration.is_some_and(|d| d < 0) {
        return Err(ApiError::Validation("Duration must not be negative".into()));
    }
    Ok(())
}

/// POST /api/admin/videos
pub async fn create_video(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    WithRejection(Json(req), _): JsonBody<CreateVideoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_video(&req)?;

    let (video_id, notified) = blocking(&state, move |s| {
        let district = s
            .db
            .get_district(req.district_id)?
            .ok_or_else(|| ApiError::NotFound("District not found".into()))?;

        let title = req.title.trim();
        let video_id = s.db.insert_video(&NewVideo {
            title,
            description: req.description.as_deref(),
            video_url: req.video_url.trim(),
            thumbnail_url: req.thumbnail_url.as_deref(),
            duration: req.duration,
            district_id: district.id,
            posted_by: admin.id,
        })?;
        info!(
            "Admin {} posted video {} to {}",
            admin.username, video_id, district.name
        );

        let notified = notify_new_video(&s.db, s.notifier.as_ref(), Some(district.id), title);
        Ok((video_id, notified))
    })
    .await?;

    Ok(Json(CreateVideoResponse {
        success: true,
        message: "Video uploaded successfully".into(),
        video_id,
        notified_devices: notified,
    }))
}

fn admin_view(video: VideoRow) -> AdminVideoResponse {
    let district = match (video.district_id, video.district_name) {
        (Some(id), Some(name)) => Some(DistrictRef { id, name }),
        _ => None,
    };

    AdminVideoResponse {
        id: video.id,
        title: video.title,
        description: video.description,
        video_url: video.video_url,
        thumbnail_url: video.thumbnail_url,
        duration: video.duration,
        like_count: video.like_count,
        watch_count: video.watch_count,
        active: video.active,
        created_at: timestamp(video.created_at),
        district,
    }
}

/// GET /api/admin/videos
pub async fn list_videos(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<impl IntoResponse, ApiError> {
    let rows = blocking(&state, |s| Ok(s.db.list_videos()?)).await?;

    let videos: Vec<AdminVideoResponse> = rows.into_iter().map(admin_view).collect();
    Ok(Json(AdminVideoList {
        success: true,
        count: videos.len(),
        videos,
    }))
}

/// GET /api/admin/videos/{id}/comments, hidden ones included.
pub async fn video_comments(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(video_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = blocking(&state, move |s| {
        if s.db.get_video(video_id)?.is_none() {
            return Err(ApiError::NotFound("Video not found".into()));
        }
        Ok(s.db.get_all_comments(video_id)?)
    })
    .await?;

    Ok(Json(CommentsResponse {
        comments: rows.into_iter().map(comment_from_row).collect(),
    }))
}

/// DELETE /api/admin/videos/{id}
pub async fn delete_video(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(video_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = blocking(&state, move |s| Ok(s.db.delete_video(video_id)?)).await?;
    if !deleted {
        return Err(ApiError::NotFound("Video not found".into()));
    }

    info!("Admin {} deleted video {}", admin.username, video_id);
    Ok(Json(StatusResponse::ok("Video deleted successfully")))
}

/// GET /api/admin/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<impl IntoResponse, ApiError> {
    let (total_videos, (total_users, verified_users), districts) = blocking(&state, |s| {
        Ok((s.db.count_videos()?, s.db.count_users()?, s.db.district_counts()?))
    })
    .await?;

    let district_stats: BTreeMap<String, DistrictStats> = districts
        .into_iter()
        .map(|d| (d.name, DistrictStats { videos: d.videos, users: d.users }))
        .collect();

    Ok(Json(DashboardResponse {
        total_videos,
        total_users,
        verified_users,
        district_stats,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str, url: &str, duration: Option<i64>) -> CreateVideoRequest {
        CreateVideoRequest {
            title: title.into(),
            description: None,
            video_url: url.into(),
            thumbnail_url: None,
            district_id: 1,
            duration,
        }
    }

    #[test]
    fn video_validation() {
        assert!(validate_video(&request("Flood update", "https://cdn/v.mp4", Some(30))).is_ok());
        assert!(matches!(
            validate_video(&request("  ", "https://cdn/v.mp4", None)),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_video(&request("Flood update", "", None)),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_video(&request("Flood update", "https://cdn/v.mp4", Some(-5))),
            Err(ApiError::Validation(_))
        ));
        let long = "t".repeat(MAX_TITLE_CHARS + 1);
        assert!(validate_video(&request(&long, "https://cdn/v.mp4", None)).is_err());
    }
}
