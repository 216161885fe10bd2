//! Session cookies carrying an HS256 JWT.
//!
//! The token's claims are the user's public fields plus `exp`; signature and
//! expiry are checked by `jsonwebtoken`.

use axum::http::{header, HeaderMap};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::UserView;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("session secret must not be empty")]
    EmptySecret,

    #[error("malformed session token")]
    Malformed,

    #[error("session signature mismatch")]
    BadSignature,

    #[error("session expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for SessionError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => SessionError::Expired,
            ErrorKind::InvalidSignature => SessionError::BadSignature,
            _ => SessionError::Malformed,
        }
    }
}

/// Contents of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(flatten)]
    pub user: UserView,
    /// Expiry, Unix epoch seconds
    pub exp: i64,
}

/// Issues and verifies session tokens.
pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    max_age_secs: u64,
    secure: bool,
}

impl SessionSigner {
    pub fn new(secret: &str, max_age_secs: u64, secure: bool) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::EmptySecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            max_age_secs,
            secure,
        })
    }

    /// Issue a token for `user` valid for the configured lifetime.
    pub fn issue(&self, user: &UserView) -> Result<String, SessionError> {
        self.issue_at(user, chrono::Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `now` (Unix seconds).
    pub fn issue_at(&self, user: &UserView, now: i64) -> Result<String, SessionError> {
        let max_age = i64::try_from(self.max_age_secs).unwrap_or(i64::MAX);
        let claims = SessionClaims {
            user: user.clone(),
            exp: now.saturating_add(max_age),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }

    /// `Set-Cookie` value carrying a fresh session for `user`.
    pub fn cookie_for(&self, user: &UserView) -> Result<String, SessionError> {
        Ok(self.cookie(&self.issue(user)?, self.max_age_secs))
    }

    /// `Set-Cookie` value that removes the session.
    pub fn clear_cookie(&self) -> String {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: u64) -> String {
        let mut cookie =
            format!("{SESSION_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Claims from the request's session cookie, if present and valid.
    pub fn from_headers(&self, headers: &HeaderMap) -> Option<SessionClaims> {
        let token = token_from_headers(headers)?;
        match self.verify(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                warn!(reason = %e, "session_rejected");
                None
            }
        }
    }
}

/// Value of the session cookie among the request's `Cookie` headers.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}
