use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subject prefix that marks a token or session as belonging to an admin.
pub const ADMIN_SUBJECT_PREFIX: &str = "admin:";

/// A mobile user who has completed OTP verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub mobile_number: String,
    pub verified: bool,
    pub district_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
}

/// The acting identity attached to a request once its credential resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User(User),
    Admin(Admin),
}

impl Identity {
    /// The token subject this identity is addressed by.
    pub fn subject(&self) -> String {
        match self {
            Self::User(user) => user.mobile_number.clone(),
            Self::Admin(admin) => admin_subject(&admin.username),
        }
    }
}

pub fn admin_subject(username: &str) -> String {
    format!("{ADMIN_SUBJECT_PREFIX}{username}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct District {
    pub id: i64,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub video_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub comment_text: String,
    pub visible_to_user: bool,
    pub created_at: DateTime<Utc>,
}
