use axum::{Extension, Json, extract::State, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use helpdesk_db::Database;
use helpdesk_types::api::{ApplicationResponse, CreateApplicationRequest, TransitionRequest};
use helpdesk_types::{ApplicationStatus, Desk, Role};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::Session;

fn not_found() -> ApiError {
    ApiError::not_found("application not found")
}

pub fn create_application(
    db: &Database,
    session: &Session,
    title: &str,
    content: &str,
) -> Result<ApplicationResponse, ApiError> {
    session.require(Role::User)?;
    let (title, content) = (title.trim(), content.trim());
    if title.is_empty() || content.is_empty() {
        return Err(ApiError::validation("title and content are required"));
    }

    let app = db.insert_application(Uuid::new_v4(), session.user_id, title, content)?;
    info!("{} opened application {}", session.login, app.id);
    Ok(app.into())
}

/// The caller's own tickets, newest first.
pub fn list_own(db: &Database, session: &Session) -> Result<Vec<ApplicationResponse>, ApiError> {
    session.require(Role::User)?;
    let rows = db.list_applications_for_owner(session.user_id)?;
    Ok(rows.into_iter().map(ApplicationResponse::from).collect())
}

/// Every ticket, newest first.
pub fn list_all(db: &Database, session: &Session) -> Result<Vec<ApplicationResponse>, ApiError> {
    session.require(Role::Engineer)?;
    let rows = db.list_applications()?;
    Ok(rows.into_iter().map(ApplicationResponse::from).collect())
}

/// Moves a ticket along its lifecycle from one of the two desks.
///
/// Checks run in a fixed order: target allowed for the desk (403), ticket
/// resolves and, on the user desk, belongs to the caller (404), then the
/// current status may move to the target (403). The engineer desk assigns
/// the caller if nobody is assigned yet.
///
/// Lookup and update are separate statements; two concurrent transitions on
/// the same ticket both succeed and the later write wins.
pub fn transition(
    db: &Database,
    session: &Session,
    desk: Desk,
    id: &str,
    status: &str,
) -> Result<ApplicationResponse, ApiError> {
    session.require(desk.role())?;

    let target = status
        .parse::<ApplicationStatus>()
        .ok()
        .filter(|s| desk.allowed_targets().contains(s))
        .ok_or_else(|| ApiError::forbidden(format!("status '{}' is not allowed", status)))?;

    let id: Uuid = id.trim().parse().map_err(|_| not_found())?;
    let existing = db.get_application(id)?.ok_or_else(not_found)?;
    if desk == Desk::User && existing.owner.id != session.user_id {
        return Err(not_found());
    }
    if !existing.status.can_transition_to(target) {
        return Err(ApiError::forbidden(format!(
            "application cannot move from {} to {}",
            existing.status, target
        )));
    }

    let engineer = (desk == Desk::Engineer).then_some(session.user_id);
    let updated = db
        .update_application_status(id, target, engineer)?
        .ok_or_else(not_found)?;

    info!("{} moved application {} {} -> {}", session.login, id, existing.status, target);
    Ok(updated.into())
}

// -- User desk --

pub async fn user_list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let apps = blocking(move || list_own(&db.db, &session)).await?;
    Ok(Json(apps))
}

pub async fn user_create(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Json(req), _): WithRejection<Json<CreateApplicationRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let app = blocking(move || create_application(&db.db, &session, &req.title, &req.content)).await?;
    Ok(Json(app))
}

pub async fn user_transition(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Json(req), _): WithRejection<Json<TransitionRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let app = blocking(move || transition(&db.db, &session, Desk::User, &req.id, &req.status)).await?;
    Ok(Json(app))
}

// -- Engineer desk --

pub async fn engineer_list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let apps = blocking(move || list_all(&db.db, &session)).await?;
    Ok(Json(apps))
}

pub async fn engineer_transition(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Json(req), _): WithRejection<Json<TransitionRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let app =
        blocking(move || transition(&db.db, &session, Desk::Engineer, &req.id, &req.status)).await?;
    Ok(Json(app))
}
