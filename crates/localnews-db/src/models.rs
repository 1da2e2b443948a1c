//! Row types read straight out of SQLite. API-facing shapes live in
//! `localnews-types`; handlers convert between the two.

pub struct UserRow {
    pub id: i64,
    pub mobile_number: String,
    pub otp: Option<String>,
    pub otp_expiry: Option<i64>,
    pub verified: bool,
    pub district_id: Option<i64>,
}

pub struct AdminRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub active: bool,
}

pub struct DistrictRow {
    pub id: i64,
    pub name: String,
    pub code: String,
}

pub struct VideoRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub duration: Option<i64>,
    pub district_id: Option<i64>,
    pub district_name: Option<String>,
    pub posted_by: Option<i64>,
    pub active: bool,
    pub like_count: i64,
    pub watch_count: i64,
    pub created_at: i64,
}

pub struct NewVideo<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub video_url: &'a str,
    pub thumbnail_url: Option<&'a str>,
    pub duration: Option<i64>,
    pub district_id: i64,
    pub posted_by: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteractionRow {
    pub video_id: i64,
    pub has_liked: bool,
    pub has_watched: bool,
    pub watch_duration: i64,
}

pub struct CommentRow {
    pub id: i64,
    pub video_id: i64,
    pub user_id: i64,
    pub mobile_number: String,
    pub comment_text: String,
    pub visible_to_user: bool,
    pub created_at: i64,
}

pub struct DistrictCountRow {
    pub name: String,
    pub videos: i64,
    pub users: i64,
}
