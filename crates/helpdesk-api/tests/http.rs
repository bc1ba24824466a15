use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use helpdesk_api::auth::hash_password;
use helpdesk_api::middleware::{SESSION_COOKIE, Session, SessionKeys};
use helpdesk_api::{AppState, AppStateInner, Settings, router};
use helpdesk_db::{Database, NewUser};
use helpdesk_types::Role;

struct Harness {
    state: AppState,
}

impl Harness {
    fn new(settings: Settings) -> Self {
        let state = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            keys: SessionKeys::new("test-secret", chrono::Duration::hours(1)),
            settings,
        });
        Self { state }
    }

    fn app(&self) -> Router {
        router(self.state.clone())
    }

    fn account(&self, login: &str, role: Role) -> (Uuid, String) {
        let row = self
            .state
            .db
            .create_user(&NewUser {
                id: Uuid::new_v4(),
                login,
                password_hash: "not-a-real-hash",
                nickname: None,
                role,
            })
            .unwrap();
        let token = self.state.keys.sign(&Session::from(&row)).unwrap();
        (row.id, token)
    }

    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let res = self.app().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn form(&self, uri: &str, token: &str, body: &str) -> axum::response::Response {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.app().oneshot(req).await.unwrap()
    }

    async fn page(&self, uri: &str, token: Option<&str>) -> (StatusCode, Option<String>, String) {
        let mut req = Request::builder().uri(uri);
        if let Some(token) = token {
            req = req.header(header::COOKIE, format!("{SESSION_COOKIE}={token}"));
        }
        let res = self.app().oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = res.status();
        let location = res
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, location, String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn location(res: &axum::response::Response) -> &str {
    res.headers().get(header::LOCATION).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn printer_ticket_lifecycle() {
    let h = Harness::new(Settings::default());
    let (alice_id, alice) = h.account("alice", Role::User);
    let (eve_id, eve) = h.account("eve", Role::Engineer);

    let (status, created) = h
        .call(
            "POST",
            "/user/applications",
            Some(&alice),
            Some(json!({ "title": "Printer broken", "content": "No power" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], "PENDING");
    assert_eq!(created["owner"]["id"], alice_id.to_string());
    let id = created["id"].as_str().unwrap().to_string();

    let (status, queue) = h.call("GET", "/engineer/applications", Some(&eve), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue.as_array().unwrap().len(), 1);

    let (status, reviewed) = h
        .call(
            "PATCH",
            "/engineer/applications",
            Some(&eve),
            Some(json!({ "id": id, "status": "UNDER_REVIEW" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["status"], "UNDER_REVIEW");
    assert_eq!(reviewed["engineer"]["id"], eve_id.to_string());

    let (status, body) = h
        .call(
            "PATCH",
            "/user/applications",
            Some(&alice),
            Some(json!({ "id": id, "status": "UNDER_REVIEW" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let chat = format!("/applications/{id}/chat");
    let (status, _) = h
        .call("POST", &chat, Some(&alice), Some(json!({ "content": "Still dead" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = h
        .call("POST", &chat, Some(&eve), Some(json!({ "content": "Replacing the fuse" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, log) = h.call("GET", &chat, Some(&alice), None).await;
    let log = log.as_array().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0]["author"]["kind"], "user");
    assert_eq!(log[1]["author"]["kind"], "engineer");
    assert_eq!(log[1]["author_name"], "eve");

    let (status, closed) = h
        .call("PATCH", "/user/applications", Some(&alice), Some(json!({ "id": id, "status": "CLOSED" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["status"], "CLOSED");
    assert_eq!(closed["engineer"]["id"], eve_id.to_string());
}

#[tokio::test]
async fn auth_and_role_failures() {
    let h = Harness::new(Settings::default());
    let (_, alice) = h.account("alice", Role::User);
    let (_, eve) = h.account("eve", Role::Engineer);

    let (status, body) = h.call("GET", "/user/applications", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
    let (status, _) = h.call("GET", "/user/applications", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = h.call("GET", "/engineer/applications", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = h.call("GET", "/admin/users", Some(&eve), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h
        .call(
            "PATCH",
            "/engineer/applications",
            Some(&eve),
            Some(json!({ "id": Uuid::new_v4().to_string(), "status": "CLOSED" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h
        .call("GET", &format!("/applications/{}/chat", Uuid::new_v4()), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    let h = Harness::new(Settings::default());
    let (_, eve) = h.account("eve", Role::Engineer);

    let (status, body) = h
        .call("PATCH", "/engineer/applications", Some(&eve), Some(json!({ "id": "x" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("status"));

    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"login\": "))
        .unwrap();
    let res = h.app().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());

    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .body(Body::from(json!({ "login": "eve", "password": "pw" }).to_string()))
        .unwrap();
    let res = h.app().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleted_account_token_is_unauthenticated() {
    let h = Harness::new(Settings::default());
    let (alice_id, alice) = h.account("alice", Role::User);
    h.state.db.delete_user(alice_id).unwrap();

    let (status, body) = h
        .call(
            "POST",
            "/user/applications",
            Some(&alice),
            Some(json!({ "title": "Printer broken", "content": "No power" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn pending_is_never_accepted_and_assignee_sticks() {
    let h = Harness::new(Settings::default());
    let (_, alice) = h.account("alice", Role::User);
    let (eve_id, eve) = h.account("eve", Role::Engineer);
    let (_, sam) = h.account("sam", Role::Engineer);

    let (_, created) = h
        .call("POST", "/user/applications", Some(&alice), Some(json!({ "title": "t", "content": "c" })))
        .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = h
        .call("PATCH", "/user/applications", Some(&alice), Some(json!({ "id": id, "status": "PENDING" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = h
        .call("PATCH", "/engineer/applications", Some(&eve), Some(json!({ "id": id, "status": "PENDING" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    h.call("PATCH", "/engineer/applications", Some(&eve), Some(json!({ "id": id, "status": "UNDER_REVIEW" })))
        .await;
    let (status, closed) = h
        .call("PATCH", "/engineer/applications", Some(&sam), Some(json!({ "id": id, "status": "CLOSED" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["engineer"]["id"], eve_id.to_string());

    let (status, _) = h
        .call("PATCH", "/engineer/applications", Some(&eve), Some(json!({ "id": id, "status": "UNDER_REVIEW" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn chat_rules() {
    let h = Harness::new(Settings::default());
    let (_, alice) = h.account("alice", Role::User);

    let (_, created) = h
        .call("POST", "/user/applications", Some(&alice), Some(json!({ "title": "t", "content": "c" })))
        .await;
    let id = created["id"].as_str().unwrap().to_string();
    let chat = format!("/applications/{id}/chat");

    let (status, _) = h.call("POST", &chat, Some(&alice), Some(json!({ "content": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, log) = h.call("GET", &chat, Some(&alice), None).await;
    assert!(log.as_array().unwrap().is_empty());

    h.call("PATCH", "/user/applications", Some(&alice), Some(json!({ "id": id, "status": "CLOSED" })))
        .await;
    let (status, _) = h.call("POST", &chat, Some(&alice), Some(json!({ "content": "thanks" }))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn closed_chat_enforcement_rejects_posts() {
    let h = Harness::new(Settings { enforce_closed_chat: true, ..Settings::default() });
    let (_, alice) = h.account("alice", Role::User);

    let (_, created) = h
        .call("POST", "/user/applications", Some(&alice), Some(json!({ "title": "t", "content": "c" })))
        .await;
    let id = created["id"].as_str().unwrap().to_string();
    h.call("PATCH", "/user/applications", Some(&alice), Some(json!({ "id": id, "status": "CLOSED" })))
        .await;

    let (status, _) = h
        .call("POST", &format!("/applications/{id}/chat"), Some(&alice), Some(json!({ "content": "hi" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn login_sets_cookie_and_redirect() {
    let h = Harness::new(Settings::default());
    let hash = hash_password("s3cret-pass").unwrap();
    h.state
        .db
        .create_user(&NewUser {
            id: Uuid::new_v4(),
            login: "eve",
            password_hash: &hash,
            nickname: None,
            role: Role::Engineer,
        })
        .unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "login": "eve", "password": "s3cret-pass" }).to_string()))
        .unwrap();
    let res = h.app().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with(&format!("{SESSION_COOKIE}=")));
    let body: Value =
        serde_json::from_slice(&res.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(body["role"], "ENGINEER");
    assert_eq!(body["redirect"], "/engineer");

    let (status, body) = h
        .call("POST", "/auth/login", None, Some(json!({ "login": "eve", "password": "wrong" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid login or password");
}

#[tokio::test]
async fn admin_delete_rules() {
    let h = Harness::new(Settings::default());
    let (root_id, root) = h.account("root", Role::Admin);
    let (bob_id, _) = h.account("bob", Role::User);

    let (status, _) = h.call("DELETE", &format!("/admin/users/{root_id}"), Some(&root), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = h.call("DELETE", &format!("/admin/users/{bob_id}"), Some(&root), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "user deleted");

    let (status, _) = h.call("DELETE", &format!("/admin/users/{bob_id}"), Some(&root), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pages_redirect_by_session() {
    let h = Harness::new(Settings::default());
    let (_, alice) = h.account("alice", Role::User);

    let (status, location, _) = h.page("/user", None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/login"));

    let (status, location, _) = h.page("/engineer", Some(&alice)).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/user"));

    let (_, location, _) = h.page("/", Some(&alice)).await;
    assert_eq!(location.as_deref(), Some("/user"));

    let (status, _, html) = h.page("/user", Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("No tickets here."));
}

#[tokio::test]
async fn dashboard_forms_post_then_redirect() {
    let h = Harness::new(Settings::default());
    let (_, alice) = h.account("alice", Role::User);

    let res = h
        .form("/user/tickets", &alice, "title=Printer+broken&content=No+power&archived=false&open=")
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/user");

    let (_, _, html) = h.page("/user", Some(&alice)).await;
    assert!(html.contains("Printer broken"));

    let res = h.form("/user/tickets", &alice, "title=&content=draft+kept").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let html = String::from_utf8_lossy(&res.into_body().collect().await.unwrap().to_bytes())
        .into_owned();
    assert!(html.contains("title and content are required"));
    assert!(html.contains("draft kept"));
}
