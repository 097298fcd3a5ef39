pub(crate) mod migrations;
pub mod queries;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use taskdesk_core::task::{CreateTask, Task, UpdateTask};
use taskdesk_core::user::{CreateUser, User, UserCredentials};

use crate::{Database, DbError};

/// Map a sqlx::Error into a DbError; unique violations become `Conflict`.
pub(crate) fn pg_err(e: sqlx::Error) -> DbError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::Conflict(e.to_string())
        }
        _ => DbError::Internal(e.to_string()),
    }
}

/// Create a DbError::NotFound with the given entity description.
pub(crate) fn pg_not_found(entity: &str) -> DbError {
    DbError::NotFound(entity.to_string())
}

#[derive(Clone)]
pub struct PostgresDatabase {
    pub(crate) pool: PgPool,
}

impl PostgresDatabase {
    /// Connect to a Postgres database and run migrations.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(pg_err)?;

        let db = Self { pool };
        migrations::run(&db.pool).await?;
        Ok(db)
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    // -- Users --
    async fn create_user(&self, input: &CreateUser) -> Result<User, DbError> {
        self.pg_create_user(input).await
    }
    async fn get_user(&self, id: &str) -> Result<User, DbError> {
        self.pg_get_user(id).await
    }
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserCredentials>, DbError> {
        self.pg_find_user_by_email(email).await
    }

    // -- Tasks --
    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError> {
        self.pg_create_task(input).await
    }
    async fn get_task(&self, id: &str) -> Result<Task, DbError> {
        self.pg_get_task(id).await
    }
    async fn list_tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>, DbError> {
        self.pg_list_tasks_for_user(user_id).await
    }
    async fn update_task(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError> {
        self.pg_update_task(id, update).await
    }
    async fn delete_task(&self, id: &str) -> Result<(), DbError> {
        self.pg_delete_task(id).await
    }
    async fn list_attachment_paths(&self) -> Result<Vec<String>, DbError> {
        self.pg_list_attachment_paths().await
    }

    // -- Revoked tokens --
    async fn revoke_token(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<(), DbError> {
        self.pg_revoke_token(token_id, expires_at).await
    }
    async fn is_token_revoked(&self, token_id: &str) -> Result<bool, DbError> {
        self.pg_is_token_revoked(token_id).await
    }
    async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        self.pg_purge_expired_revocations(now).await
    }
}
