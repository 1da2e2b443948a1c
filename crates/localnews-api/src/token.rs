use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::debug;

use localnews_types::api::Claims;

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 10;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, malformed encoding, missing claims or past expiry.
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Failed to sign token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// Issues and checks stateless HS256 bearer tokens. There is no revocation
/// list: a token stays valid until its expiry.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        self.issue_with_expiry(subject, now, now + self.ttl)
    }

    fn issue_with_expiry(
        &self,
        subject: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Subject of a token whose signature and expiry both check out.
    pub fn extract_subject(&self, token: &str) -> Result<String, TokenError> {
        self.decode(token).map(|claims| claims.sub)
    }

    pub fn validate(&self, token: &str, expected_subject: &str) -> bool {
        self.decode(token)
            .map(|claims| claims.sub == expected_subject)
            .unwrap_or(false)
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Token rejected: {}", e);
                TokenError::InvalidToken
            })?;

        // jsonwebtoken still accepts `exp == now`; a token is only good
        // strictly before its expiry.
        if claims.exp <= Utc::now().timestamp() {
            debug!("Token rejected: expired at {}", claims.exp);
            return Err(TokenError::InvalidToken);
        }
        Ok(claims)
    }
}
