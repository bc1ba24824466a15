//! Browser-facing routes. Every form posts to one of these handlers, which
//! runs the same core operation as the JSON API and answers with a `303` back
//! to the dashboard so the page reloads its data. A rejected action renders
//! the dashboard again with the error and the matching status code.

use std::collections::HashMap;

use anyhow::anyhow;
use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use helpdesk_db::Database;
use helpdesk_types::api::{CreateUserRequest, MessageResponse};
use helpdesk_types::{Desk, Role};
use helpdesk_ui::templates::ROLE_CHOICES;
use helpdesk_ui::{
    AccountRow, AdminPage, Dashboard, EngineerPage, LoginPage, UserPage, ViewQuery, ViewState,
};

use crate::admin::{create_user, delete_account, list_accounts};
use crate::applications::{create_application, list_all, list_own, transition};
use crate::auth::{AppState, authenticate, clear_session, session_cookie};
use crate::blocking;
use crate::chat::post_message;
use crate::error::ApiError;
use crate::middleware::{Session, session_from_headers};

const LOGIN_PATH: &str = "/login";
const ADMIN_PATH: &str = "/admin";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TicketForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub open: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub open: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    pub desk: Desk,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub open: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountForm {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub role: Role,
}

/// Unsent ticket text, kept when creation is rejected.
#[derive(Debug, Default)]
struct Draft {
    title: String,
    content: String,
}

fn render(page: &impl Template) -> Result<String, ApiError> {
    page.render()
        .map_err(|e| ApiError::Internal(anyhow!("Template render failed: {}", e)))
}

/// Signed-in caller with `role`, or the redirect that replaces the page:
/// the login form when nobody is signed in, the caller's own dashboard when
/// the role does not match.
fn gate(state: &AppState, headers: &HeaderMap, role: Role) -> Result<Session, Response> {
    let session = session_from_headers(headers, &state.keys)
        .ok_or_else(|| Redirect::to(LOGIN_PATH).into_response())?;
    if session.role != role {
        return Err(Redirect::to(session.role.dashboard_path()).into_response());
    }
    Ok(session)
}

fn load_dashboard(
    db: &Database,
    session: &Session,
    desk: Desk,
    view: &ViewState,
) -> Result<Dashboard, ApiError> {
    let applications = match desk {
        Desk::User => list_own(db, session)?,
        Desk::Engineer => list_all(db, session)?,
    };

    let mut chats = HashMap::new();
    for app in applications.iter().filter(|a| view.shows(a.status) && view.is_open(a.id)) {
        let messages = db.get_messages(app.id)?;
        chats.insert(app.id, messages.into_iter().map(MessageResponse::from).collect());
    }

    Ok(Dashboard::build(desk, view, applications, chats))
}

async fn render_desk(
    state: &AppState,
    session: Session,
    desk: Desk,
    view: ViewState,
    failure: Option<ApiError>,
    draft: Draft,
) -> Result<Response, ApiError> {
    let status = failure.as_ref().map_or(StatusCode::OK, ApiError::status_code);
    let error = failure.map(|e| e.public_message());
    let refresh_secs = state.settings.refresh.meta_refresh_secs();

    let db = state.clone();
    let html = blocking(move || {
        let dashboard = load_dashboard(&db.db, &session, desk, &view)?;
        let who = Some(session.login.as_str());
        match desk {
            Desk::User => render(&UserPage {
                who,
                refresh_secs,
                error: error.as_deref(),
                dashboard: &dashboard,
                draft_title: &draft.title,
                draft_content: &draft.content,
            }),
            Desk::Engineer => render(&EngineerPage {
                who,
                refresh_secs,
                error: error.as_deref(),
                dashboard: &dashboard,
            }),
        }
    })
    .await?;

    Ok((status, Html(html)).into_response())
}

async fn render_admin(
    state: &AppState,
    session: Session,
    failure: Option<ApiError>,
) -> Result<Response, ApiError> {
    let status = failure.as_ref().map_or(StatusCode::OK, ApiError::status_code);
    let error = failure.map(|e| e.public_message());
    let refresh_secs = state.settings.refresh.meta_refresh_secs();

    let db = state.clone();
    let html = blocking(move || {
        let accounts: Vec<AccountRow> = list_accounts(&db.db, &session)?
            .into_iter()
            .map(|user| AccountRow::from_user(user, session.user_id))
            .collect();
        render(&AdminPage {
            who: Some(session.login.as_str()),
            refresh_secs,
            error: error.as_deref(),
            accounts: &accounts,
            roles: &ROLE_CHOICES,
        })
    })
    .await?;

    Ok((status, Html(html)).into_response())
}

/// Redirect back to `to` on success. Rule violations re-render through
/// `rerender`; store failures propagate as a plain error response.
async fn settle<F, Fut>(
    outcome: Result<(), ApiError>,
    to: String,
    rerender: F,
) -> Result<Response, ApiError>
where
    F: FnOnce(ApiError) -> Fut,
    Fut: Future<Output = Result<Response, ApiError>>,
{
    match outcome {
        Ok(()) => Ok(Redirect::to(&to).into_response()),
        Err(ApiError::Internal(e)) => Err(ApiError::Internal(e)),
        Err(rejected) => {
            warn!("Form action rejected: {}", rejected);
            rerender(rejected).await
        }
    }
}

// -- Entry --

pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Redirect {
    match session_from_headers(&headers, &state.keys) {
        Some(session) => Redirect::to(session.role.dashboard_path()),
        None => Redirect::to(LOGIN_PATH),
    }
}

pub async fn login_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(session) = session_from_headers(&headers, &state.keys) {
        return Ok(Redirect::to(session.role.dashboard_path()).into_response());
    }
    let html = render(&LoginPage { who: None, refresh_secs: None, error: None, login: "" })?;
    Ok(Html(html).into_response())
}

pub async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let db = state.clone();
    let login = form.login.clone();
    let outcome = blocking(move || authenticate(&db.db, &form.login, &form.password)).await;

    match outcome {
        Ok(user) => {
            let session = Session::from(&user);
            let token = state.keys.sign(&session)?;
            info!("{} signed in as {}", user.login, user.role);
            let jar = jar.add(session_cookie(token));
            Ok((jar, Redirect::to(user.role.dashboard_path())).into_response())
        }
        Err(ApiError::Internal(e)) => Err(ApiError::Internal(e)),
        Err(rejected) => {
            warn!("Failed login for '{}'", login);
            let message = rejected.public_message();
            let html = render(&LoginPage {
                who: None,
                refresh_secs: None,
                error: Some(&message),
                login: &login,
            })?;
            Ok((rejected.status_code(), Html(html)).into_response())
        }
    }
}

pub async fn logout_submit(jar: CookieJar) -> impl IntoResponse {
    (clear_session(jar), Redirect::to(LOGIN_PATH))
}

// -- User desk --

pub async fn user_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ViewQuery>,
) -> Result<Response, ApiError> {
    let session = match gate(&state, &headers, Role::User) {
        Ok(session) => session,
        Err(redirect) => return Ok(redirect),
    };
    render_desk(&state, session, Desk::User, ViewState::from(&query), None, Draft::default()).await
}

pub async fn user_create_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<TicketForm>,
) -> Result<Response, ApiError> {
    let session = match gate(&state, &headers, Role::User) {
        Ok(session) => session,
        Err(redirect) => return Ok(redirect),
    };
    let view = ViewState::parse(form.archived, &form.open);
    let draft = Draft { title: form.title, content: form.content };

    let db = state.clone();
    let (s, title, content) = (session.clone(), draft.title.clone(), draft.content.clone());
    let outcome = blocking(move || create_application(&db.db, &s, &title, &content).map(drop)).await;

    let to = view.href(Desk::User.path());
    settle(outcome, to, |err| render_desk(&state, session, Desk::User, view, Some(err), draft)).await
}

pub async fn user_close_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Form(query): Form<ViewQuery>,
) -> Result<Response, ApiError> {
    let session = match gate(&state, &headers, Role::User) {
        Ok(session) => session,
        Err(redirect) => return Ok(redirect),
    };
    let view = ViewState::from(&query);

    let db = state.clone();
    let s = session.clone();
    let outcome =
        blocking(move || transition(&db.db, &s, Desk::User, &id, "CLOSED").map(drop)).await;

    let to = view.href(Desk::User.path());
    settle(outcome, to, |err| {
        render_desk(&state, session, Desk::User, view, Some(err), Draft::default())
    })
    .await
}

// -- Engineer desk --

pub async fn engineer_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ViewQuery>,
) -> Result<Response, ApiError> {
    let session = match gate(&state, &headers, Role::Engineer) {
        Ok(session) => session,
        Err(redirect) => return Ok(redirect),
    };
    let view = ViewState::from(&query);
    render_desk(&state, session, Desk::Engineer, view, None, Draft::default()).await
}

pub async fn engineer_set_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Form(form): Form<StatusForm>,
) -> Result<Response, ApiError> {
    let session = match gate(&state, &headers, Role::Engineer) {
        Ok(session) => session,
        Err(redirect) => return Ok(redirect),
    };
    let view = ViewState::parse(form.archived, &form.open);

    let db = state.clone();
    let s = session.clone();
    let outcome =
        blocking(move || transition(&db.db, &s, Desk::Engineer, &id, &form.status).map(drop))
            .await;

    let to = view.href(Desk::Engineer.path());
    settle(outcome, to, |err| {
        render_desk(&state, session, Desk::Engineer, view, Some(err), Draft::default())
    })
    .await
}

// -- Chat --

/// Shared by both desks; `desk` names the dashboard the form came from.
pub async fn chat_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Form(form): Form<ChatForm>,
) -> Result<Response, ApiError> {
    let desk = form.desk;
    let session = match gate(&state, &headers, desk.role()) {
        Ok(session) => session,
        Err(redirect) => return Ok(redirect),
    };
    let view = ViewState::parse(form.archived, &form.open);
    let enforce = state.settings.enforce_closed_chat;

    let single = desk == Desk::User;
    let to = match id.trim().parse::<Uuid>() {
        Ok(application_id) => view.with_open(application_id, single).href(desk.path()),
        Err(_) => view.href(desk.path()),
    };

    let db = state.clone();
    let s = session.clone();
    let outcome =
        blocking(move || post_message(&db.db, &s, enforce, &id, &form.content).map(drop)).await;

    settle(outcome, to, |err| {
        render_desk(&state, session, desk, view, Some(err), Draft::default())
    })
    .await
}

// -- Admin --

pub async fn admin_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session = match gate(&state, &headers, Role::Admin) {
        Ok(session) => session,
        Err(redirect) => return Ok(redirect),
    };
    render_admin(&state, session, None).await
}

pub async fn admin_create_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<AccountForm>,
) -> Result<Response, ApiError> {
    let session = match gate(&state, &headers, Role::Admin) {
        Ok(session) => session,
        Err(redirect) => return Ok(redirect),
    };
    let req = CreateUserRequest {
        login: form.login,
        password: form.password,
        nickname: Some(form.nickname),
        role: Some(form.role),
    };

    let db = state.clone();
    let s = session.clone();
    let outcome = blocking(move || create_user(&db.db, &s, &req).map(drop)).await;

    settle(outcome, ADMIN_PATH.to_string(), |err| render_admin(&state, session, Some(err))).await
}

pub async fn admin_delete_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let session = match gate(&state, &headers, Role::Admin) {
        Ok(session) => session,
        Err(redirect) => return Ok(redirect),
    };

    let db = state.clone();
    let s = session.clone();
    let outcome = blocking(move || delete_account(&db.db, &s, &id)).await;

    settle(outcome, ADMIN_PATH.to_string(), |err| render_admin(&state, session, Some(err))).await
}
