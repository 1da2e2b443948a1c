use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::attach_identity;
use crate::{admin, videos};

/// Every `/api` route. Identity is attached to all of them; handlers that
/// need one say so through the `CurrentUser` / `CurrentAdmin` extractors.
pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/send-otp", post(auth::send_otp))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/districts", get(auth::districts))
        .route("/validate-token", post(auth::validate_token))
        .route("/logout", post(auth::logout));

    let video_routes = Router::new()
        .route("/feed", get(videos::feed))
        .route("/user/register-device", post(videos::register_device))
        .route("/{id}", get(videos::get_video))
        .route("/{id}/watch", post(videos::record_watch))
        .route("/{id}/like", post(videos::toggle_like))
        .route("/{id}/comments", post(videos::add_comment))
        .route("/{id}/my-comments", get(videos::my_comments));

    let admin_routes = Router::new()
        .route("/login", post(admin::login))
        .route("/videos", post(admin::create_video).get(admin::list_videos))
        .route("/videos/{id}", delete(admin::delete_video))
        .route("/videos/{id}/comments", get(admin::video_comments))
        .route("/dashboard", get(admin::dashboard));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/videos", video_routes)
        .nest("/api/admin", admin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), attach_identity))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use chrono::Duration;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{AppStateInner, hash_password};
    use crate::notify::testing::RecordingNotifier;
    use crate::otp::OtpMode;
    use crate::token::TokenService;
    use localnews_db::{Database, unix_now};

    fn app() -> (Router, Arc<RecordingNotifier>) {
        let (router, notifier, _) = app_with_state();
        (router, notifier)
    }

    fn app_with_state() -> (Router, Arc<RecordingNotifier>, AppState) {
        let db = Database::open_in_memory().unwrap();
        db.seed_districts(&[("Agra", "AGR"), ("Kanpur", "KNP")]).unwrap();
        db.create_admin("editor", &hash_password("desk-pass").unwrap(), None)
            .unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let state = Arc::new(AppStateInner {
            db,
            tokens: TokenService::new("router-test-secret", Duration::hours(10)),
            notifier: notifier.clone(),
            otp_mode: OtpMode::Strict,
            session_ttl: Duration::hours(12),
        });
        (router(state.clone()), notifier, state)
    }

    async fn call(app: &Router, method: &str, uri: &str, auth: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            req = req.header(header::AUTHORIZATION, format!("Bearer {auth}"));
        }
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };

        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn user_token(app: &Router, notifier: &RecordingNotifier, mobile: &str) -> String {
        let (status, _) = call(app, "POST", "/api/auth/send-otp", None, Some(json!({ "mobileNumber": mobile }))).await;
        assert_eq!(status, StatusCode::OK);
        let code = notifier.last_otp(mobile).unwrap();

        let (status, body) = call(
            app,
            "POST",
            "/api/auth/verify-otp",
            None,
            Some(json!({ "mobileNumber": mobile, "otp": code, "districtId": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["districtName"], "Agra");
        body["token"].as_str().unwrap().to_string()
    }

    /// Log in as the seeded admin and return the `name=value` session cookie.
    async fn admin_session(app: &Router) -> String {
        let req = Request::builder()
            .method("POST")
            .uri("/api/admin/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "username": "editor", "password": "desk-pass" }).to_string()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let set_cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn with_cookie(app: &Router, method: &str, uri: &str, cookie: &str) -> axum::response::Response {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        app.clone().oneshot(req).await.unwrap()
    }

    async fn admin_token(app: &Router) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/admin/login",
            None,
            Some(json!({ "username": "editor", "password": "desk-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn protected_routes_require_identity() {
        let (app, _) = app();
        let (status, body) = call(&app, "GET", "/api/videos/feed", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        let (status, _) = call(&app, "GET", "/api/admin/dashboard", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn user_token_cannot_reach_admin_routes() {
        let (app, notifier) = app();
        let token = user_token(&app, &notifier, "9876543210").await;
        let (status, _) = call(&app, "GET", "/api/admin/videos", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_admin_password_is_rejected() {
        let (app, _) = app();
        let (status, body) = call(
            &app,
            "POST",
            "/api/admin/login",
            None,
            Some(json!({ "username": "editor", "password": "guess" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn admin_login_sets_session_cookie() {
        let (app, _) = app();
        let req = Request::builder()
            .method("POST")
            .uri("/api/admin/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "username": "editor", "password": "desk-pass" }).to_string()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let set_cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with("localnews_session="));
        assert!(set_cookie.contains("HttpOnly"));
        let pair = set_cookie.split(';').next().unwrap().to_string();

        let req = Request::builder()
            .uri("/api/admin/dashboard")
            .header(header::COOKIE, pair)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_notifies_and_user_engages() {
        let (app, notifier) = app();
        let user = user_token(&app, &notifier, "9876543210").await;
        let admin = admin_token(&app).await;

        let (status, _) = call(
            &app,
            "POST",
            "/api/videos/user/register-device",
            Some(&user),
            Some(json!({ "deviceToken": "fcm-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            "POST",
            "/api/admin/videos",
            Some(&admin),
            Some(json!({ "title": "Market fire", "videoUrl": "https://cdn/v.mp4", "districtId": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["notifiedDevices"], 1);
        let video = body["videoId"].as_i64().unwrap();

        let (status, body) = call(&app, "POST", &format!("/api/videos/{video}/like"), Some(&user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["likeCount"], 1);
        assert_eq!(body["hasLiked"], true);

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/videos/{video}/watch"),
            Some(&user),
            Some(json!({ "watchDuration": 42 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "GET", "/api/videos/feed?page=0&size=10", Some(&user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalElements"], 1);
        assert_eq!(body["videos"][0]["hasLiked"], true);
        assert_eq!(body["videos"][0]["hasWatched"], true);
        assert_eq!(body["videos"][0]["watchCount"], 1);

        let (status, _) = call(&app, "DELETE", &format!("/api/admin/videos/{video}"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "GET", &format!("/api/videos/{video}"), Some(&user), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blank_comment_is_a_bad_request() {
        let (app, notifier) = app();
        let user = user_token(&app, &notifier, "9876543210").await;
        let admin = admin_token(&app).await;
        let (_, body) = call(
            &app,
            "POST",
            "/api/admin/videos",
            Some(&admin),
            Some(json!({ "title": "Rain", "videoUrl": "https://cdn/r.mp4", "districtId": 1 })),
        )
        .await;
        let video = body["videoId"].as_i64().unwrap();

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/videos/{video}/comments"),
            Some(&user),
            Some(json!({ "commentText": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn districts_are_public_and_sorted() {
        let (app, _) = app();
        let (status, body) = call(&app, "GET", "/api/auth/districts", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Agra", "Kanpur"]);
        assert_eq!(body[0]["code"], "AGR");
    }

    #[tokio::test]
    async fn validate_token_accepts_only_verified_users() {
        let (app, notifier, state) = app_with_state();
        let user = user_token(&app, &notifier, "9876543210").await;
        let (status, body) = call(&app, "POST", "/api/auth/validate-token", Some(&user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        // OTP requested but never verified
        call(&app, "POST", "/api/auth/send-otp", None, Some(json!({ "mobileNumber": "9123456789" }))).await;
        let pending = state.tokens.issue("9123456789").unwrap();
        let (status, body) = call(&app, "POST", "/api/auth/validate-token", Some(&pending), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let admin = admin_token(&app).await;
        let (status, _) = call(&app, "POST", "/api/auth/validate-token", Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, "POST", "/api/auth/validate-token", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid token format");
    }

    #[tokio::test]
    async fn logout_ends_the_admin_session() {
        let (app, _, state) = app_with_state();
        let cookie = admin_session(&app).await;
        let session_id = cookie.trim_start_matches("localnews_session=").to_string();
        assert!(state.db.get_session_subject(&session_id, unix_now()).unwrap().is_some());

        let resp = with_cookie(&app, "POST", "/api/auth/logout", &cookie).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cleared = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cleared.starts_with("localnews_session=;"));
        assert!(cleared.contains("Max-Age=0"));

        assert!(state.db.get_session_subject(&session_id, unix_now()).unwrap().is_none());
        let resp = with_cookie(&app, "GET", "/api/admin/dashboard", &cookie).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_without_session_still_succeeds() {
        let (app, _) = app();
        let (status, body) = call(&app, "POST", "/api/auth/logout", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn malformed_bodies_are_validation_errors() {
        let (app, notifier) = app();
        let user = user_token(&app, &notifier, "9876543210").await;
        let admin = admin_token(&app).await;
        let (_, body) = call(
            &app,
            "POST",
            "/api/admin/videos",
            Some(&admin),
            Some(json!({ "title": "Rain", "videoUrl": "https://cdn/r.mp4", "districtId": 1 })),
        )
        .await;
        let video = body["videoId"].as_i64().unwrap();

        let (status, body) = call(&app, "POST", &format!("/api/videos/{video}/watch"), Some(&user), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/verify-otp",
            None,
            Some(json!({ "mobileNumber": "9876543210", "otp": "123456" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = call(&app, "GET", "/api/videos/feed?size=lots", Some(&user), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_client_fields_are_ignored() {
        let (app, notifier) = app();
        let user = user_token(&app, &notifier, "9876543210").await;

        let (status, _) = call(
            &app,
            "POST",
            "/api/videos/user/register-device",
            Some(&user),
            Some(json!({ "deviceToken": "fcm-1", "deviceType": "ios", "appVersion": "2.1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            "POST",
            "/api/videos/user/register-device",
            Some(&user),
            Some(json!({ "platform": "android" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Device token is required");
    }
}
