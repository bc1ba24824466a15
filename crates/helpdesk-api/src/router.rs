use axum::{
    Json, Router, middleware,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{admin, applications, chat, pages};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Every route the server exposes. CORS is left to the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/admin/users", get(admin::get_users).post(admin::post_user))
        .route("/admin/users/{id}", delete(admin::delete_user))
        .route(
            "/user/applications",
            get(applications::user_list)
                .post(applications::user_create)
                .patch(applications::user_transition),
        )
        .route(
            "/engineer/applications",
            get(applications::engineer_list).patch(applications::engineer_transition),
        )
        .route(
            "/applications/{id}/chat",
            get(chat::get_messages).post(chat::send_message),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let page_routes = Router::new()
        .route("/", get(pages::index))
        .route("/login", get(pages::login_page).post(pages::login_submit))
        .route("/logout", post(pages::logout_submit))
        .route("/user", get(pages::user_dashboard))
        .route("/user/tickets", post(pages::user_create_ticket))
        .route("/user/tickets/{id}/close", post(pages::user_close_ticket))
        .route("/engineer", get(pages::engineer_dashboard))
        .route("/engineer/tickets/{id}/status", post(pages::engineer_set_status))
        .route("/tickets/{id}/chat", post(pages::chat_post))
        .route("/admin", get(pages::admin_dashboard))
        .route("/admin/accounts", post(pages::admin_create_account))
        .route("/admin/accounts/{id}/delete", post(pages::admin_delete_account))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(page_routes)
        .layer(TraceLayer::new_for_http())
}
