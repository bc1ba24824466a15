use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use helpdesk_db::UserRow;
use helpdesk_types::Role;
use helpdesk_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "helpdesk_session";

/// Verified identity of the caller. Handlers receive it as an explicit
/// argument instead of looking it up, so tests can build one directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub login: String,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: Uuid, login: impl Into<String>, role: Role) -> Self {
        Self { user_id, login: login.into(), role }
    }

    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("{} role required", role)))
        }
    }
}

impl From<&UserRow> for Session {
    fn from(user: &UserRow) -> Self {
        Self::new(user.id, user.login.clone(), user.role)
    }
}

impl From<Claims> for Session {
    fn from(claims: Claims) -> Self {
        Self::new(claims.sub, claims.login, claims.role)
    }
}

/// HS256 signing material plus the lifetime stamped into new tokens.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn sign(&self, session: &Session) -> anyhow::Result<String> {
        let expires = Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| anyhow::anyhow!("session lifetime overflows the clock"))?;
        let claims = Claims {
            sub: session.user_id,
            login: session.login.clone(),
            role: session.role,
            exp: usize::try_from(expires.timestamp())?,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Option<Session> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .ok()
            .map(|data| data.claims.into())
    }
}

/// Bearer header first, then the session cookie.
pub fn session_from_headers(headers: &HeaderMap, keys: &SessionKeys) -> Option<Session> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    match bearer {
        Some(token) => keys.verify(token),
        None => CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .and_then(|cookie| keys.verify(cookie.value())),
    }
}

/// Rejects the request with 401 unless it carries a valid session, which is
/// then handed to the handler as an `Extension<Session>`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session =
        session_from_headers(req.headers(), &state.keys).ok_or(ApiError::Unauthenticated)?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
