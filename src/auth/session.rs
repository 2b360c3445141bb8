//! Signed session tokens.
//!
//! Sessions are stateless HS256 tokens carrying the account profile. Browser
//! clients get the token in a cookie at login; API clients may instead send
//! it as a bearer header, which takes precedence.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::permissions::Role;

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "maildeck_session";

const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    name: String,
    role: Role,
    iat: i64,
    exp: i64,
}

/// An authenticated caller, decoded from a session token.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// Encode/decode key pair derived from the session secret.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    /// Issue a token valid for 24 hours.
    pub fn issue(&self, user: &SessionUser) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            iat: now,
            exp: now + SESSION_TTL_SECS,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<SessionUser, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let claims = data.claims;
        Ok(SessionUser {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        })
    }
}

/// The session attached to a request, if any.
///
/// `Authorization: Bearer` wins over the cookie; a present but invalid token
/// reads as no session rather than an error, so gated handlers answer 401
/// uniformly.
pub fn session_from_request(
    keys: &SessionKeys,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Option<SessionUser> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let token = bearer
        .map(str::to_string)
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))?;
    keys.verify(&token).ok()
}
