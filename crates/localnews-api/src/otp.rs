//! One-time-password verification of mobile numbers.
//!
//! `send_otp` creates the user on first contact and overwrites any pending
//! code; `verify_otp` promotes the user to verified, binds a district and
//! hands back a bearer token.

use std::str::FromStr;

use chrono::{Duration, Utc};
use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};

use localnews_db::Database;

use crate::notify::Notifier;
use crate::token::{TokenError, TokenService};

pub const OTP_LENGTH: usize = 6;
pub const OTP_VALIDITY_MINUTES: i64 = 10;

/// How strictly a submitted code is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OtpMode {
    /// Code must match the stored one and be unexpired.
    #[default]
    Strict,
    /// Any well-formed code is accepted. Development only.
    FormatOnly,
}

impl FromStr for OtpMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "format-only" | "format_only" => Ok(Self::FormatOnly),
            other => Err(format!("unknown OTP mode '{other}' (expected strict or format-only)")),
        }
    }
}

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("Invalid mobile number format")]
    InvalidMobileNumber,

    #[error("No OTP request found for this mobile number")]
    NoPendingRequest,

    #[error("Please enter a valid 6-digit OTP")]
    InvalidCode,

    #[error("Invalid or expired OTP")]
    CodeRejected,

    #[error("Invalid district selected")]
    InvalidDistrict,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl OtpError {
    /// Whether the failure is the caller's to fix (as opposed to ours).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Token(_) | Self::Storage(_))
    }
}

#[derive(Debug, Clone)]
pub struct VerifiedLogin {
    pub token: String,
    pub user_id: i64,
    pub mobile_number: String,
    pub district_name: String,
}

/// Ten digits, leading digit 6-9.
pub fn is_valid_mobile_number(mobile_number: &str) -> bool {
    mobile_number.len() == 10
        && mobile_number.bytes().all(|b| b.is_ascii_digit())
        && matches!(mobile_number.as_bytes()[0], b'6'..=b'9')
}

fn is_well_formed_code(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

pub fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{:0width$}", n, width = OTP_LENGTH)
}

/// Issue a fresh code for `mobile_number` and dispatch it.
///
/// Generation and storage always happen; the returned flag reports only
/// whether delivery succeeded.
pub fn send_otp(db: &Database, notifier: &dyn Notifier, mobile_number: &str) -> Result<bool, OtpError> {
    if !is_valid_mobile_number(mobile_number) {
        return Err(OtpError::InvalidMobileNumber);
    }

    let code = generate_code();
    let expiry = Utc::now() + Duration::minutes(OTP_VALIDITY_MINUTES);
    db.upsert_user_otp(mobile_number, &code, expiry.timestamp())?;

    let sent = notifier.send_otp(mobile_number, &code);
    if sent {
        info!("OTP issued for {}", mobile_number);
    } else {
        warn!("OTP delivery failed for {}", mobile_number);
    }
    Ok(sent)
}

pub fn verify_otp(
    db: &Database,
    tokens: &TokenService,
    mode: OtpMode,
    mobile_number: &str,
    code: &str,
    district_id: i64,
) -> Result<VerifiedLogin, OtpError> {
    let user = db
        .get_user_by_mobile(mobile_number)?
        .ok_or(OtpError::NoPendingRequest)?;

    if !is_well_formed_code(code) {
        return Err(OtpError::InvalidCode);
    }

    let now = Utc::now().timestamp();
    if mode == OtpMode::Strict {
        let unexpired = user.otp_expiry.is_some_and(|exp| now < exp);
        if user.otp.as_deref() != Some(code) || !unexpired {
            return Err(OtpError::CodeRejected);
        }
    }

    let district = db.get_district(district_id)?.ok_or(OtpError::InvalidDistrict)?;

    let token = tokens.issue(&user.mobile_number)?;

    // The read above may be stale by now; the conditional update is what
    // consumes the code, so only one concurrent caller can win.
    match mode {
        OtpMode::Strict => {
            if !db.redeem_user_otp(user.id, district.id, code, now)? {
                return Err(OtpError::CodeRejected);
            }
        }
        OtpMode::FormatOnly => db.mark_user_verified(user.id, district.id)?,
    }

    info!("User {} verified in district {}", user.id, district.name);
    Ok(VerifiedLogin {
        token,
        user_id: user.id,
        mobile_number: user.mobile_number,
        district_name: district.name,
    })
}
