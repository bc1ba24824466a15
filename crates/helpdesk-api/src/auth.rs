use std::sync::Arc;

use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand_core::OsRng;
use tracing::{info, warn};

use helpdesk_db::{Database, UserRow};
use helpdesk_types::Role;
use helpdesk_types::api::{LoginRequest, LoginResponse, RegisterRequest, UserResponse};

use crate::Settings;
use crate::admin::{NewAccount, create_account};
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::{SESSION_COOKIE, Session, SessionKeys};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub keys: SessionKeys,
    pub settings: Settings,
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// Checks a login/password pair against the stored Argon2id hash.
pub fn authenticate(db: &Database, login: &str, password: &str) -> Result<UserRow, ApiError> {
    let user = db
        .get_user_by_login(login)?
        .ok_or(ApiError::InvalidCredentials)?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow!("Stored hash for '{}' is malformed: {}", login, e))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    Ok(user)
}

/// Self-service signup. Always creates a `USER` account.
pub fn register_user(db: &Database, req: &RegisterRequest) -> Result<UserRow, ApiError> {
    let login = req.login.trim();
    if login.len() < 3 || login.len() > 32 {
        return Err(ApiError::validation("login must be 3 to 32 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::validation("password must be at least 8 characters"));
    }

    create_account(
        db,
        NewAccount {
            login,
            password: &req.password,
            nickname: req.nickname.as_deref(),
            role: Role::User,
        },
    )
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

fn signed_in(state: &AppState, user: &UserRow) -> Result<(Cookie<'static>, LoginResponse), ApiError> {
    let session = Session::from(user);
    let token = state.keys.sign(&session)?;
    let response = LoginResponse {
        user_id: user.id,
        login: user.login.clone(),
        role: user.role,
        token: token.clone(),
        redirect: user.role.dashboard_path().to_string(),
    };
    Ok((session_cookie(token), response))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let attempted = req.login.clone();
    let user = blocking(move || authenticate(&db.db, &req.login, &req.password))
        .await
        .inspect_err(|_| warn!("Failed login for '{}'", attempted))?;

    let (cookie, response) = signed_in(&state, &user)?;
    info!("{} signed in as {}", user.login, user.role);
    Ok((jar.add(cookie), Json(response)))
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user = blocking(move || register_user(&db.db, &req)).await?;

    let (cookie, response) = signed_in(&state, &user)?;
    Ok((StatusCode::CREATED, jar.add(cookie), Json(response)))
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (StatusCode::NO_CONTENT, clear_session(jar))
}

/// Current caller, re-read from the store so deleted accounts show up as 404.
pub async fn me(
    State(state): State<AppState>,
    axum::Extension(session): axum::Extension<Session>,
) -> Result<Json<UserResponse>, ApiError> {
    let db = state.clone();
    let user = blocking(move || {
        db.db
            .get_user_by_id(session.user_id)?
            .ok_or_else(|| ApiError::not_found("user not found"))
    })
    .await?;
    Ok(Json(user.into()))
}
