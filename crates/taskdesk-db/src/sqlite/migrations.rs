use rusqlite::Connection;

use super::SqliteResultExt;
use crate::DbError;

pub(crate) const LATEST_VERSION: i64 = 2;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .to_db()?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        // v1: users and their tasks
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                 id            TEXT PRIMARY KEY,
                 name          TEXT NOT NULL,
                 email         TEXT NOT NULL UNIQUE,
                 password_hash TEXT NOT NULL,
                 created_at    TEXT NOT NULL,
                 updated_at    TEXT NOT NULL
             );

             CREATE TABLE IF NOT EXISTS tasks (
                 id              TEXT PRIMARY KEY,
                 user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                 title           TEXT NOT NULL,
                 description     TEXT,
                 status          TEXT NOT NULL DEFAULT 'pending'
                                     CHECK(status IN ('pending', 'in_progress', 'completed')),
                 deadline        TEXT NOT NULL,
                 attachment_path TEXT,
                 created_at      TEXT NOT NULL,
                 updated_at      TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);",
        )
        .to_db()?;

        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (1, datetime('now'))",
            [],
        )
        .to_db()?;
    }

    if current_version < 2 {
        // v2: token revocation for logout/refresh
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS revoked_tokens (
                 token_id   TEXT PRIMARY KEY,
                 expires_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_revoked_tokens_expiry ON revoked_tokens(expires_at);",
        )
        .to_db()?;

        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (2, datetime('now'))",
            [],
        )
        .to_db()?;
    }

    Ok(())
}
