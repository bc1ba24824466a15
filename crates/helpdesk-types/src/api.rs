use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ApplicationStatus, Author, Role, UserSummary};

// -- Session Claims --

/// Claims carried by the signed session token. Shared by the JSON API
/// middleware and the HTML pages, which both accept the same token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub login: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub login: String,
    pub role: Role,
    pub token: String,
    /// Dashboard the client should open next.
    pub redirect: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

// -- Accounts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Account as returned to clients. The credential hash never leaves the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub login: String,
    pub nickname: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// -- Applications --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateApplicationRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Both fields stay textual so that unknown statuses map to 403 and
/// unresolvable ids map to 404 instead of a body rejection.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionRequest {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub status: ApplicationStatus,
    pub owner: UserSummary,
    pub engineer: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub application_id: Uuid,
    pub content: String,
    pub author: Author,
    pub author_login: Option<String>,
    pub author_nickname: Option<String>,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
