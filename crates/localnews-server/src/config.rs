use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use localnews_api::otp::OtpMode;
use localnews_api::token::DEFAULT_TOKEN_TTL_HOURS;

/// JWT secrets that must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

const DEFAULT_SESSION_TTL_HOURS: i64 = 12;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("LOCALNEWS_JWT_SECRET is unset or still a placeholder")]
    PlaceholderSecret,

    #[error("{var} has an invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub token_ttl: chrono::Duration,
    pub session_ttl: chrono::Duration,
    pub otp_mode: OtpMode,
    pub admin_username: String,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("LOCALNEWS_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::PlaceholderSecret);
        }

        let host = lookup("LOCALNEWS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = lookup("LOCALNEWS_PORT").unwrap_or_else(|| "8080".into());
        let addr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::Invalid {
                var: "LOCALNEWS_HOST/LOCALNEWS_PORT",
                value: format!("{host}:{port}"),
            })?;

        let otp_mode = match lookup("LOCALNEWS_OTP_MODE") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                var: "LOCALNEWS_OTP_MODE",
                value,
            })?,
            None => OtpMode::default(),
        };

        Ok(Self {
            jwt_secret,
            db_path: lookup("LOCALNEWS_DB_PATH")
                .unwrap_or_else(|| "localnews.db".into())
                .into(),
            addr,
            token_ttl: hours(&lookup, "LOCALNEWS_TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS)?,
            session_ttl: hours(&lookup, "LOCALNEWS_SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?,
            otp_mode,
            admin_username: lookup("LOCALNEWS_ADMIN_USERNAME").unwrap_or_else(|| "admin".into()),
            admin_password: lookup("LOCALNEWS_ADMIN_PASSWORD").filter(|p| !p.is_empty()),
        })
    }
}

fn hours(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: i64,
) -> Result<chrono::Duration, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(chrono::Duration::hours(default));
    };
    match value.parse::<i64>() {
        Ok(h) if h > 0 => Ok(chrono::Duration::hours(h)),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}
