use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::{
    WithRejection,
    cookie::{Cookie, CookieJar},
};
use tracing::{error, info};

use localnews_db::Database;
use localnews_types::api::{AuthResponse, SendOtpRequest, StatusResponse, VerifyOtpRequest};
use localnews_types::models::{District, Identity};

use crate::error::{ApiError, JsonBody};
use crate::middleware::{Credential, SESSION_COOKIE, credentials_from_headers, resolve};
use crate::notify::Notifier;
use crate::otp::{self, OtpError, OtpMode};
use crate::token::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    pub notifier: Arc<dyn Notifier>,
    pub otp_mode: OtpMode,
    pub session_ttl: chrono::Duration,
}

/// Run blocking work (SQLite, Argon2) off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
}

/// Hash a password with Argon2id into a PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))
}

pub fn verify_password(password: &str, phc: &str) -> bool {
    PasswordHash::new(phc)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// POST /api/auth/send-otp
pub async fn send_otp(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<SendOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mobile = req.mobile_number.clone();
    let outcome = blocking(&state, move |s| {
        Ok(otp::send_otp(&s.db, s.notifier.as_ref(), &mobile))
    })
    .await?;

    match outcome {
        Ok(true) => Ok((
            StatusCode::OK,
            Json(AuthResponse::message(
                true,
                format!("OTP sent successfully to {}", req.mobile_number),
            )),
        )),
        Ok(false) => Ok((
            StatusCode::OK,
            Json(AuthResponse::message(false, "Failed to send OTP. Please try again.")),
        )),
        Err(e) => otp_failure(e),
    }
}

/// POST /api/auth/verify-otp
pub async fn verify_otp(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<VerifyOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = blocking(&state, move |s| {
        Ok(otp::verify_otp(
            &s.db,
            &s.tokens,
            s.otp_mode,
            &req.mobile_number,
            &req.otp,
            req.district_id,
        ))
    })
    .await?;

    match outcome {
        Ok(login) => Ok((
            StatusCode::OK,
            Json(AuthResponse {
                success: true,
                message: "Authentication successful".into(),
                token: Some(login.token),
                user_id: Some(login.user_id),
                mobile_number: Some(login.mobile_number),
                district_name: Some(login.district_name),
            }),
        )),
        Err(e) => otp_failure(e),
    }
}

fn otp_failure(e: OtpError) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    if e.is_client_error() {
        return Ok((StatusCode::BAD_REQUEST, Json(AuthResponse::message(false, e.to_string()))));
    }
    match e {
        OtpError::Storage(e) => Err(ApiError::Internal(e)),
        other => Err(ApiError::Internal(anyhow::anyhow!(other.to_string()))),
    }
}

/// GET /api/auth/districts
pub async fn districts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = blocking(&state, |s| Ok(s.db.list_active_districts()?)).await?;

    let districts: Vec<District> = rows
        .into_iter()
        .map(|d| District {
            id: d.id,
            name: d.name,
            code: d.code,
        })
        .collect();

    Ok(Json(districts))
}

/// POST /api/auth/validate-token. Valid only if the bearer token is
/// unexpired and names a verified user.
pub async fn validate_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let Some(bearer) = credentials_from_headers(&headers)
        .into_iter()
        .find(|c| matches!(c, Credential::BearerToken(_)))
    else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(AuthResponse::message(false, "Invalid token format")),
        ));
    };

    let identity = blocking(&state, move |s| Ok(resolve(&s.db, &s.tokens, &bearer))).await?;

    Ok(match identity {
        Some(Identity::User(_)) => (StatusCode::OK, Json(AuthResponse::message(true, "Token is valid"))),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(AuthResponse::message(false, "Invalid or expired token")),
        ),
    })
}

/// POST /api/auth/logout. Ends the server session, if any. Bearer tokens
/// are stateless and are discarded by the client.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let id = cookie.value().to_string();
        let ended = blocking(&state, move |s| Ok(s.db.delete_session(&id)?)).await?;
        if ended {
            info!("Session ended");
        }
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Json(StatusResponse::ok("Logged out successfully"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }
}
