use chrono::{DateTime, Utc};
use rusqlite::params;

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

impl SqliteDatabase {
    pub fn revoke_token_sync(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO revoked_tokens (token_id, expires_at) VALUES (?1, ?2)",
                params![token_id, expires_at],
            )
            .to_db()?;
            Ok(())
        })
    }

    pub fn is_token_revoked_sync(&self, token_id: &str) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM revoked_tokens WHERE token_id = ?1",
                    params![token_id],
                    |row| row.get(0),
                )
                .to_db()?;
            Ok(count > 0)
        })
    }

    pub fn purge_expired_revocations_sync(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        self.with_conn(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM revoked_tokens WHERE expires_at < ?1",
                    params![now],
                )
                .to_db()?;
            Ok(removed as u64)
        })
    }
}
