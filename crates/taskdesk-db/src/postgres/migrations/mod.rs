use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};

use crate::DbError;

/// Advisory lock id held while migrating ("taskdesk" as hex).
const MIGRATION_LOCK_KEY: i64 = 0x7461736B_6465736B;

/// Schema steps, applied in order. Each runs in its own transaction together
/// with its `schema_version` row.
const STEPS: &[(i32, &str)] = &[
    (1, include_str!("sql/V1__initial.sql")),
    (2, include_str!("sql/V2__revoked_tokens.sql")),
];

fn migration_err(e: sqlx::Error) -> DbError {
    DbError::Internal(format!("migration: {e}"))
}

pub async fn run(pool: &PgPool) -> Result<(), DbError> {
    // The lock is session-scoped, so take it and release it on one connection.
    let mut conn = pool.acquire().await.map_err(migration_err)?;
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await
        .map_err(migration_err)?;

    let result = apply_pending(&mut conn).await;

    if let Err(e) = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await
    {
        tracing::warn!(error = %e, "failed to release migration lock");
    }

    result
}

async fn apply_pending(conn: &mut PoolConnection<Postgres>) -> Result<(), DbError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(&mut **conn)
    .await
    .map_err(migration_err)?;

    let current: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(&mut **conn)
        .await
        .map_err(migration_err)?;

    for &(version, sql) in STEPS.iter().filter(|(v, _)| *v > current) {
        let mut tx = sqlx::Connection::begin(&mut **conn)
            .await
            .map_err(migration_err)?;
        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .map_err(migration_err)?;
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES ($1, NOW())")
            .bind(version)
            .execute(&mut *tx)
            .await
            .map_err(migration_err)?;
        tx.commit().await.map_err(migration_err)?;
        tracing::info!(version, "applied postgres migration");
    }

    Ok(())
}
