//! Credential resolution.
//!
//! A request may carry a server session cookie, a bearer token, or both.
//! They are tried in that order and the first one that resolves to a live
//! identity wins. Resolution never fails loudly: anything that does not
//! check out simply yields no identity, and the route decides whether that
//! is acceptable.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, error, warn};

use localnews_db::{Database, unix_now};
use localnews_types::models::{ADMIN_SUBJECT_PREFIX, Admin, Identity, User};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::token::TokenService;

pub const SESSION_COOKIE: &str = "localnews_session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    SessionCookie(String),
    BearerToken(String),
}

/// Credentials present on a request, in resolution priority order.
pub fn credentials_from_headers(headers: &HeaderMap) -> Vec<Credential> {
    let mut credentials = Vec::new();

    if let Some(cookie) = CookieJar::from_headers(headers).get(SESSION_COOKIE) {
        credentials.push(Credential::SessionCookie(cookie.value().to_string()));
    }

    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
    {
        credentials.push(Credential::BearerToken(token.to_string()));
    }

    credentials
}

/// Resolve a single credential to the identity it stands for.
pub fn resolve(db: &Database, tokens: &TokenService, credential: &Credential) -> Option<Identity> {
    let subject = match credential {
        Credential::SessionCookie(id) => match db.get_session_subject(id, unix_now()) {
            Ok(subject) => subject?,
            Err(e) => {
                error!("Session lookup failed: {}", e);
                return None;
            }
        },
        Credential::BearerToken(token) => tokens.extract_subject(token).ok()?,
    };

    resolve_subject(db, &subject)
}

/// First credential that resolves, in the order given.
pub fn resolve_first(db: &Database, tokens: &TokenService, credentials: &[Credential]) -> Option<Identity> {
    credentials.iter().find_map(|c| resolve(db, tokens, c))
}

/// `admin:<username>` must name an active admin; anything else must be the
/// mobile number of a verified user.
fn resolve_subject(db: &Database, subject: &str) -> Option<Identity> {
    let lookup = match subject.strip_prefix(ADMIN_SUBJECT_PREFIX) {
        Some(username) => db.get_active_admin(username).map(|row| {
            row.map(|a| {
                Identity::Admin(Admin {
                    id: a.id,
                    username: a.username,
                    email: a.email,
                })
            })
        }),
        None => db.get_verified_user_by_mobile(subject).map(|row| {
            row.map(|u| {
                Identity::User(User {
                    id: u.id,
                    mobile_number: u.mobile_number,
                    verified: u.verified,
                    district_id: u.district_id,
                })
            })
        }),
    };

    lookup.unwrap_or_else(|e| {
        error!("Identity lookup failed: {}", e);
        None
    })
}

/// Attach the resolved `Identity` to the request, if any. An identity that
/// is already attached is left alone.
pub async fn attach_identity(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if req.extensions().get::<Identity>().is_none() {
        let credentials = credentials_from_headers(req.headers());

        if !credentials.is_empty() {
            let st = state.clone();
            let resolved = tokio::task::spawn_blocking(move || {
                resolve_first(&st.db, &st.tokens, &credentials)
            })
            .await
            .unwrap_or_else(|e| {
                error!("spawn_blocking join error: {}", e);
                None
            });

            match resolved {
                Some(identity) => {
                    debug!("Resolved identity {}", identity.subject());
                    req.extensions_mut().insert(identity);
                }
                None => warn!("Credentials on {} did not resolve", req.uri().path()),
            }
        }
    }

    next.run(req).await
}

/// A verified mobile user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// An active admin.
#[derive(Debug, Clone)]
pub struct CurrentAdmin(pub Admin);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Identity>() {
            Some(Identity::User(user)) => Ok(Self(user.clone())),
            _ => Err(ApiError::Unauthenticated),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Identity>() {
            Some(Identity::Admin(admin)) => Ok(Self(admin.clone())),
            _ => Err(ApiError::Unauthenticated),
        }
    }
}
