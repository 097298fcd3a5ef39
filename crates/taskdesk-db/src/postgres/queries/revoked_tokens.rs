use chrono::{DateTime, Utc};

use super::super::{pg_err, PostgresDatabase};
use crate::DbError;

impl PostgresDatabase {
    pub(crate) async fn pg_revoke_token(
        &self,
        token_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO revoked_tokens (token_id, expires_at) VALUES ($1, $2)
             ON CONFLICT (token_id) DO NOTHING",
        )
        .bind(token_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(pg_err)?;
        Ok(())
    }

    pub(crate) async fn pg_is_token_revoked(&self, token_id: &str) -> Result<bool, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM revoked_tokens WHERE token_id = $1")
            .bind(token_id)
            .fetch_one(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(count > 0)
    }

    pub(crate) async fn pg_purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(result.rows_affected())
    }
}
