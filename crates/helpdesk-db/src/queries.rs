use std::str::FromStr;

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use helpdesk_types::{ApplicationStatus, Author, Role, UserSummary};

use crate::Database;
use crate::error::classify;
use crate::models::{ApplicationRow, MessageRow, NewUser, UserRow};

const USER_COLUMNS: &str = "id, login, password, nickname, role, created_at";

const APPLICATION_SELECT: &str = "
    SELECT a.id, a.title, a.content, a.status, a.created_at,
           a.user_id, o.login, o.nickname,
           a.engineer_id, e.login, e.nickname
    FROM applications a
    JOIN users o ON o.id = a.user_id
    LEFT JOIN users e ON e.id = a.engineer_id";

// Author columns come from whichever side wrote the message; a dangling
// reference leaves login/nickname NULL.
const MESSAGE_SELECT: &str = "
    SELECT m.id, m.application_id, m.content, m.created_at,
           m.user_id, m.engineer_id, u.login, u.nickname
    FROM messages m
    LEFT JOIN users u ON u.id = COALESCE(m.user_id, m.engineer_id)";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<UserRow> {
        let created_at = timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, login, password, nickname, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id.to_string(),
                    user.login,
                    user.password_hash,
                    user.nickname,
                    user.role.as_str(),
                    created_at,
                ],
            )
            .map_err(classify)?;
            query_user(conn, "id", &user.id.to_string())?
                .ok_or_else(|| anyhow!("User {} vanished after insert", user.id))
        })
    }

    pub fn get_user_by_login(&self, login: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "login", login))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn has_user_with_role(&self, role: Role) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE role = ?1",
                [role.as_str()],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Tickets owned or assigned plus messages authored on either side.
    pub fn count_user_references(&self, id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM applications WHERE user_id = ?1 OR engineer_id = ?1)
                  + (SELECT COUNT(*) FROM messages WHERE user_id = ?1 OR engineer_id = ?1)",
                [id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Returns false when no row matched.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }

    // -- Applications --

    pub fn insert_application(
        &self,
        id: Uuid,
        owner_id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<ApplicationRow> {
        let created_at = timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO applications (id, title, content, status, user_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    title,
                    content,
                    ApplicationStatus::Pending.as_str(),
                    owner_id.to_string(),
                    created_at,
                ],
            )
            .map_err(classify)?;
            query_application(conn, id)?
                .ok_or_else(|| anyhow!("Application {} vanished after insert", id))
        })
    }

    pub fn get_application(&self, id: Uuid) -> Result<Option<ApplicationRow>> {
        self.with_conn(|conn| query_application(conn, id))
    }

    /// Newest first, like both dashboards show them.
    pub fn list_applications_for_owner(&self, owner_id: Uuid) -> Result<Vec<ApplicationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{APPLICATION_SELECT} WHERE a.user_id = ?1 ORDER BY a.created_at DESC, a.rowid DESC"
            ))?;
            let rows = stmt
                .query_map([owner_id.to_string()], map_application)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_applications(&self) -> Result<Vec<ApplicationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{APPLICATION_SELECT} ORDER BY a.created_at DESC, a.rowid DESC"
            ))?;
            let rows = stmt
                .query_map([], map_application)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Writes the new status. When `engineer_id` is given it only fills an
    /// empty assignee slot, so the first engineer stays assigned.
    pub fn update_application_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        engineer_id: Option<Uuid>,
    ) -> Result<Option<ApplicationRow>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE applications
                 SET status = ?2, engineer_id = COALESCE(engineer_id, ?3)
                 WHERE id = ?1",
                params![id.to_string(), status.as_str(), engineer_id.map(|e| e.to_string())],
            )
            .map_err(classify)?;
            if updated == 0 {
                return Ok(None);
            }
            query_application(conn, id)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: Uuid,
        application_id: Uuid,
        author: Author,
        content: &str,
    ) -> Result<MessageRow> {
        let created_at = timestamp();
        let (user_id, engineer_id) = match author {
            Author::User(uid) => (Some(uid.to_string()), None),
            Author::Engineer(eid) => (None, Some(eid.to_string())),
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, application_id, user_id, engineer_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    application_id.to_string(),
                    user_id,
                    engineer_id,
                    content,
                    created_at,
                ],
            )
            .map_err(classify)?;
            let mut stmt = conn.prepare(&format!("{MESSAGE_SELECT} WHERE m.id = ?1"))?;
            stmt.query_row([id.to_string()], map_message)
                .optional()?
                .ok_or_else(|| anyhow!("Message {} vanished after insert", id))
        })
    }

    /// Oldest first; insertion order breaks timestamp ties.
    pub fn get_messages(&self, application_id: Uuid) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT} WHERE m.application_id = ?1 ORDER BY m.created_at ASC, m.rowid ASC"
            ))?;
            let rows = stmt
                .query_map([application_id.to_string()], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_messages(&self, application_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE application_id = ?1",
                [application_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

/// RFC 3339 with fixed microsecond precision sorts lexically in time order.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    let row = stmt.query_row([value], map_user).optional()?;
    Ok(row)
}

fn query_application(conn: &Connection, id: Uuid) -> Result<Option<ApplicationRow>> {
    let mut stmt = conn.prepare(&format!("{APPLICATION_SELECT} WHERE a.id = ?1"))?;
    let row = stmt.query_row([id.to_string()], map_application).optional()?;
    Ok(row)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: parse_col(row, 0)?,
        login: row.get(1)?,
        password: row.get(2)?,
        nickname: row.get(3)?,
        role: parse_col(row, 4)?,
        created_at: parse_col(row, 5)?,
    })
}

fn map_application(row: &Row<'_>) -> rusqlite::Result<ApplicationRow> {
    let engineer = match parse_opt_col::<Uuid>(row, 8)? {
        Some(id) => Some(UserSummary {
            id,
            login: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            nickname: row.get(10)?,
        }),
        None => None,
    };

    Ok(ApplicationRow {
        id: parse_col(row, 0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        status: parse_col(row, 3)?,
        created_at: parse_col(row, 4)?,
        owner: UserSummary {
            id: parse_col(row, 5)?,
            login: row.get(6)?,
            nickname: row.get(7)?,
        },
        engineer,
    })
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    let author = match (parse_opt_col(row, 4)?, parse_opt_col(row, 5)?) {
        (Some(uid), None) => Author::User(uid),
        (None, Some(eid)) => Author::Engineer(eid),
        _ => {
            return Err(rusqlite::Error::InvalidColumnType(
                4,
                "user_id/engineer_id".into(),
                rusqlite::types::Type::Null,
            ));
        }
    };

    Ok(MessageRow {
        id: parse_col(row, 0)?,
        application_id: parse_col(row, 1)?,
        content: row.get(2)?,
        created_at: parse_col::<DateTime<Utc>>(row, 3)?,
        author,
        author_login: row.get(6)?,
        author_nickname: row.get(7)?,
    })
}

/// Decode a TEXT column through `FromStr`, reporting bad values as a
/// conversion failure on that column.
fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match row.get::<_, Option<String>>(idx)? {
        Some(text) => text.parse().map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        }),
        None => Ok(None),
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
