use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use taskdesk_core::user::{CreateUser, User, UserCredentials};

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_credentials(row: &Row) -> rusqlite::Result<UserCredentials> {
    Ok(UserCredentials {
        user: row_to_user(row)?,
        password_hash: row.get("password_hash")?,
    })
}

impl SqliteDatabase {
    pub fn create_user_sync(&self, input: &CreateUser) -> Result<User, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, input.name, input.email, input.password_hash, now, now],
            )
            .to_db()?;
            conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
                .to_db()
        })
    }

    pub fn get_user_sync(&self, id: &str) -> Result<User, DbError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("user {id}")),
                    other => DbError::Internal(other.to_string()),
                })
        })
    }

    pub fn find_user_by_email_sync(&self, email: &str) -> Result<Option<UserCredentials>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM users WHERE email = ?1",
                params![email],
                row_to_credentials,
            )
            .optional()
            .to_db()
        })
    }
}
