use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, applications, messages)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                login       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                nickname    TEXT,
                role        TEXT NOT NULL DEFAULT 'USER'
                            CHECK (role IN ('USER', 'ENGINEER', 'ADMIN')),
                created_at  TEXT NOT NULL
            );

            CREATE TABLE applications (
                id           TEXT PRIMARY KEY,
                title        TEXT NOT NULL,
                content      TEXT NOT NULL,
                status       TEXT NOT NULL DEFAULT 'PENDING'
                             CHECK (status IN ('PENDING', 'UNDER_REVIEW', 'CLOSED', 'REJECTED')),
                user_id      TEXT NOT NULL REFERENCES users(id),
                engineer_id  TEXT REFERENCES users(id),
                created_at   TEXT NOT NULL
            );

            CREATE INDEX idx_applications_user
                ON applications(user_id, created_at);

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                application_id  TEXT NOT NULL REFERENCES applications(id),
                user_id         TEXT REFERENCES users(id),
                engineer_id     TEXT REFERENCES users(id),
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                CHECK ((user_id IS NULL) <> (engineer_id IS NULL))
            );

            CREATE INDEX idx_messages_application
                ON messages(application_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
