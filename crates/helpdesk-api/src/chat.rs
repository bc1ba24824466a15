use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::{debug, warn};
use uuid::Uuid;

use helpdesk_db::{ApplicationRow, Database};
use helpdesk_types::Author;
use helpdesk_types::api::{MessageResponse, SendMessageRequest};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::Session;

fn resolve(db: &Database, application_id: &str) -> Result<ApplicationRow, ApiError> {
    let not_found = || ApiError::not_found("application not found");
    let id: Uuid = application_id.trim().parse().map_err(|_| not_found())?;
    db.get_application(id)?.ok_or_else(not_found)
}

/// Full history of a ticket's chat, oldest first. Any signed-in role may read.
pub fn list_messages(
    db: &Database,
    _session: &Session,
    application_id: &str,
) -> Result<Vec<MessageResponse>, ApiError> {
    let app = resolve(db, application_id)?;
    let rows = db.get_messages(app.id)?;
    Ok(rows.into_iter().map(MessageResponse::from).collect())
}

/// Appends a message authored by the caller. Engineers post as the
/// engineer side; every other role posts as the user side.
///
/// Archived tickets still accept posts unless `enforce_closed` is set.
pub fn post_message(
    db: &Database,
    session: &Session,
    enforce_closed: bool,
    application_id: &str,
    content: &str,
) -> Result<MessageResponse, ApiError> {
    let app = resolve(db, application_id)?;
    let id = app.id;

    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::validation("message cannot be empty"));
    }
    if app.status.is_archived() {
        if enforce_closed {
            return Err(ApiError::forbidden("ticket is closed"));
        }
        warn!("{} posted to archived application {}", session.login, id);
    }

    let author = Author::for_role(session.role, session.user_id);
    let row = db.insert_message(Uuid::new_v4(), id, author, content)?;
    debug!("Message {} on application {} by {}", row.id, id, session.login);
    Ok(row.into())
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(application_id): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let messages = blocking(move || list_messages(&db.db, &session, &application_id)).await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(application_id): Path<String>,
    Extension(session): Extension<Session>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let enforce = state.settings.enforce_closed_chat;
    let message =
        blocking(move || post_message(&db.db, &session, enforce, &application_id, &req.content))
            .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
