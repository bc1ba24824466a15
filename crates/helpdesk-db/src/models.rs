//! Database row types. Columns are decoded into domain values at the query
//! boundary; conversion into API payloads happens here so the handlers never
//! see a credential hash.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use helpdesk_types::api::{ApplicationResponse, MessageResponse, UserResponse};
use helpdesk_types::{ApplicationStatus, Author, Role, UserSummary, display_name};

pub struct UserRow {
    pub id: Uuid,
    pub login: String,
    pub password: String,
    pub nickname: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

pub struct NewUser<'a> {
    pub id: Uuid,
    pub login: &'a str,
    pub password_hash: &'a str,
    pub nickname: Option<&'a str>,
    pub role: Role,
}

pub struct ApplicationRow {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub status: ApplicationStatus,
    pub owner: UserSummary,
    pub engineer: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
}

pub struct MessageRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub content: String,
    pub author: Author,
    pub author_login: Option<String>,
    pub author_nickname: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for UserResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            login: row.login,
            nickname: row.nickname,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

impl From<ApplicationRow> for ApplicationResponse {
    fn from(row: ApplicationRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            status: row.status,
            owner: row.owner,
            engineer: row.engineer,
            created_at: row.created_at,
        }
    }
}

impl From<MessageRow> for MessageResponse {
    fn from(row: MessageRow) -> Self {
        let author_name = display_name(row.author_nickname.as_deref(), row.author_login.as_deref());
        Self {
            id: row.id,
            application_id: row.application_id,
            content: row.content,
            author: row.author,
            author_login: row.author_login,
            author_nickname: row.author_nickname,
            author_name,
            created_at: row.created_at,
        }
    }
}
