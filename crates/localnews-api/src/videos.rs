use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use tracing::info;

use localnews_types::api::{
    CommentRequest, CommentsResponse, CreateCommentResponse, LikeResponse, RegisterDeviceRequest,
    StatusResponse, WatchRequest,
};

use crate::auth::{AppState, blocking};
use crate::engagement;
use crate::error::{ApiError, JsonBody, QueryParams};
use crate::middleware::CurrentUser;

const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_PLATFORM: &str = "android";

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// GET /api/videos/feed?page=&size=
pub async fn feed(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    WithRejection(Query(q), _): QueryParams<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let feed = blocking(&state, move |s| {
        Ok(engagement::feed_for_user(&s.db, &user, q.page, q.size)?)
    })
    .await?;

    Ok(Json(feed))
}

/// GET /api/videos/{id}
pub async fn get_video(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let video = blocking(&state, move |s| {
        Ok(engagement::video_for_user(&s.db, video_id, user.id)?)
    })
    .await?;

    Ok(Json(video))
}

/// POST /api/videos/{id}/watch
pub async fn record_watch(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<i64>,
    WithRejection(Json(req), _): JsonBody<WatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |s| {
        Ok(engagement::record_watch(&s.db, video_id, user.id, req.watch_duration)?)
    })
    .await?;

    Ok(Json(StatusResponse::ok("Watch recorded")))
}

/// POST /api/videos/{id}/like
pub async fn toggle_like(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let toggled = blocking(&state, move |s| {
        Ok(engagement::toggle_like(&s.db, video_id, user.id)?)
    })
    .await?;

    Ok(Json(LikeResponse {
        success: true,
        like_count: toggled.like_count,
        has_liked: toggled.has_liked,
    }))
}

/// POST /api/videos/{id}/comments
pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<i64>,
    WithRejection(Json(req), _): JsonBody<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id;
    let comment_id = blocking(&state, move |s| {
        Ok(engagement::add_comment(&s.db, video_id, user_id, &req.comment_text)?)
    })
    .await?;

    info!("User {} commented on video {}", user_id, video_id);
    Ok(Json(CreateCommentResponse {
        success: true,
        message: "Comment added successfully".into(),
        comment_id,
    }))
}

/// GET /api/videos/{id}/my-comments
pub async fn my_comments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let comments = blocking(&state, move |s| {
        Ok(engagement::user_comments(&s.db, video_id, user.id)?)
    })
    .await?;

    Ok(Json(CommentsResponse { comments }))
}

/// POST /api/videos/user/register-device
pub async fn register_device(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    WithRejection(Json(req), _): JsonBody<RegisterDeviceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = req.device_token.trim().to_string();
    if token.is_empty() {
        return Err(ApiError::Validation("Device token is required".into()));
    }
    let platform = req
        .platform
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PLATFORM.to_string());

    let user_id = user.id;
    blocking(&state, move |s| Ok(s.db.upsert_device(user_id, &token, &platform)?)).await?;

    info!("Registered device for user {}", user_id);
    Ok(Json(StatusResponse::ok("Device registered successfully")))
}
