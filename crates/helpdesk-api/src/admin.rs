use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use helpdesk_db::{Database, NewUser, UserRow};
use helpdesk_types::Role;
use helpdesk_types::api::{CreateUserRequest, UserResponse};

use crate::auth::{AppState, hash_password};
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::Session;

pub struct NewAccount<'a> {
    pub login: &'a str,
    pub password: &'a str,
    pub nickname: Option<&'a str>,
    pub role: Role,
}

/// Shared by the admin form, self-registration and the start-up bootstrap.
pub fn create_account(db: &Database, account: NewAccount<'_>) -> Result<UserRow, ApiError> {
    let login = account.login.trim();
    if login.is_empty() || account.password.is_empty() {
        return Err(ApiError::validation("login and password are required"));
    }
    if db.get_user_by_login(login)?.is_some() {
        return Err(ApiError::validation("login already exists"));
    }

    let password_hash = hash_password(account.password)?;
    let nickname = account.nickname.map(str::trim).filter(|n| !n.is_empty());

    let user = db.create_user(&NewUser {
        id: Uuid::new_v4(),
        login,
        password_hash: &password_hash,
        nickname,
        role: account.role,
    })?;

    info!("Created {} account '{}'", user.role, user.login);
    Ok(user)
}

pub fn list_accounts(db: &Database, session: &Session) -> Result<Vec<UserResponse>, ApiError> {
    session.require(Role::Admin)?;
    Ok(db.list_users()?.into_iter().map(UserResponse::from).collect())
}

pub fn create_user(
    db: &Database,
    session: &Session,
    req: &CreateUserRequest,
) -> Result<UserResponse, ApiError> {
    session.require(Role::Admin)?;
    let user = create_account(
        db,
        NewAccount {
            login: &req.login,
            password: &req.password,
            nickname: req.nickname.as_deref(),
            role: req.role.unwrap_or_default(),
        },
    )?;
    Ok(user.into())
}

/// Accounts that own, handle or wrote anything are kept; deleting them would
/// orphan ticket history.
pub fn delete_account(db: &Database, session: &Session, id: &str) -> Result<(), ApiError> {
    session.require(Role::Admin)?;
    let id: Uuid = id.trim().parse().map_err(|_| ApiError::not_found("user not found"))?;

    if id == session.user_id {
        return Err(ApiError::validation("you cannot delete your own account"));
    }
    let user = db
        .get_user_by_id(id)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    if db.count_user_references(id)? > 0 {
        return Err(ApiError::validation("user is referenced by tickets or messages"));
    }
    if !db.delete_user(id)? {
        return Err(ApiError::not_found("user not found"));
    }

    info!("{} deleted account '{}'", session.login, user.login);
    Ok(())
}

pub async fn get_users(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let users = blocking(move || list_accounts(&db.db, &session)).await?;
    Ok(Json(users))
}

pub async fn post_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Json(req), _): WithRejection<Json<CreateUserRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user = blocking(move || create_user(&db.db, &session, &req)).await?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || delete_account(&db.db, &session, &id)).await?;
    Ok(Json(json!({ "message": "user deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(db: &Database) -> Session {
        let row = db
            .create_user(&NewUser {
                id: Uuid::new_v4(),
                login: "root",
                password_hash: "unused",
                nickname: None,
                role: Role::Admin,
            })
            .unwrap();
        Session::from(&row)
    }

    fn request(login: &str, role: Option<Role>) -> CreateUserRequest {
        CreateUserRequest {
            login: login.into(),
            password: "pw".into(),
            nickname: Some("  ".into()),
            role,
        }
    }

    #[test]
    fn create_defaults_to_user_role() {
        let db = Database::open_in_memory().unwrap();
        let root = admin(&db);
        let user = create_user(&db, &root, &request("alice", None)).unwrap();
        assert_eq!(user.role, Role::User);
        assert_eq!(user.nickname, None);

        let eng = create_user(&db, &root, &request("eve", Some(Role::Engineer))).unwrap();
        assert_eq!(eng.role, Role::Engineer);
        assert_eq!(list_accounts(&db, &root).unwrap().len(), 3);
    }

    #[test]
    fn duplicate_login_always_fails() {
        let db = Database::open_in_memory().unwrap();
        let root = admin(&db);
        create_user(&db, &root, &request("alice", None)).unwrap();

        for role in [None, Some(Role::Engineer), Some(Role::Admin)] {
            let err = create_user(&db, &root, &request("alice", role)).unwrap_err();
            assert!(matches!(err, ApiError::Validation(ref m) if m == "login already exists"));
        }
        assert_eq!(list_accounts(&db, &root).unwrap().len(), 2);
    }

    #[test]
    fn racing_creates_of_one_login_fail_as_validation() {
        let db = Database::open_in_memory().unwrap();
        let results: Vec<Result<Uuid, ApiError>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        let account = NewAccount {
                            login: "alice",
                            password: "pw",
                            nickname: None,
                            role: Role::User,
                        };
                        create_account(&db, account).map(|user| user.id)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for err in results.into_iter().filter_map(Result::err) {
            assert!(matches!(err, ApiError::Validation(ref m) if m == "login already exists"));
        }
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn non_admins_are_forbidden() {
        let db = Database::open_in_memory().unwrap();
        let engineer = Session::new(Uuid::new_v4(), "eve", Role::Engineer);
        assert!(matches!(list_accounts(&db, &engineer), Err(ApiError::Forbidden(_))));
        assert!(matches!(
            create_user(&db, &engineer, &request("x", None)),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn delete_rules() {
        let db = Database::open_in_memory().unwrap();
        let root = admin(&db);
        let alice = create_user(&db, &root, &request("alice", None)).unwrap();
        let bob = create_user(&db, &root, &request("bob", None)).unwrap();
        db.insert_application(Uuid::new_v4(), alice.id, "t", "c").unwrap();

        assert!(matches!(
            delete_account(&db, &root, &root.user_id.to_string()),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            delete_account(&db, &root, &alice.id.to_string()),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(delete_account(&db, &root, "not-a-uuid"), Err(ApiError::NotFound(_))));

        delete_account(&db, &root, &bob.id.to_string()).unwrap();
        assert!(matches!(
            delete_account(&db, &root, &bob.id.to_string()),
            Err(ApiError::NotFound(_))
        ));
    }
}
