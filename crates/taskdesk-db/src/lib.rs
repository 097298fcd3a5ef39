#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::PostgresDatabase;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use taskdesk_core::task::{CreateTask, Task, UpdateTask};
use taskdesk_core::user::{CreateUser, User, UserCredentials};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Internal(String),
}

/// The relational store behind users, tasks and revoked tokens.
#[async_trait]
pub trait Database: Send + Sync {
    // -- Users --
    async fn create_user(&self, input: &CreateUser) -> Result<User, DbError>;
    async fn get_user(&self, id: &str) -> Result<User, DbError>;
    /// Look up a user together with the stored password hash.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserCredentials>, DbError>;

    // -- Tasks --
    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError>;
    async fn get_task(&self, id: &str) -> Result<Task, DbError>;
    async fn list_tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>, DbError>;
    async fn update_task(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError>;
    async fn delete_task(&self, id: &str) -> Result<(), DbError>;
    /// Every attachment key currently referenced by a task row.
    async fn list_attachment_paths(&self) -> Result<Vec<String>, DbError>;

    // -- Revoked tokens --
    async fn revoke_token(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<(), DbError>;
    async fn is_token_revoked(&self, token_id: &str) -> Result<bool, DbError>;
    /// Drop revocations whose token would have expired anyway. Returns rows removed.
    async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, DbError>;
}

/// Which backend to open and where.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// Postgres connection URL. When `None`, SQLite is used.
    pub database_url: Option<String>,
    /// SQLite file path. Defaults to `<data_dir>/taskdesk.db`.
    pub sqlite_path: Option<String>,
}

impl DbConfig {
    /// `TASKDESK_DATABASE_URL` is taken as given. The shared `DATABASE_URL`
    /// is only honoured when it names a Postgres server, since other tools
    /// leave unrelated values there.
    pub fn from_env() -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            database_url: non_empty("TASKDESK_DATABASE_URL")
                .or_else(|| non_empty("DATABASE_URL").filter(|url| is_postgres_url(url))),
            sqlite_path: std::env::var("TASKDESK_SQLITE_PATH").ok(),
        }
    }

    pub fn is_postgres(&self) -> bool {
        self.database_url.as_deref().is_some_and(is_postgres_url)
    }
}

fn is_postgres_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://")
}

/// Open the configured backend and run its migrations.
pub async fn open_database(config: &DbConfig) -> Result<Arc<dyn Database>, DbError> {
    if config.is_postgres() {
        #[cfg(feature = "postgres")]
        {
            let url = config.database_url.as_deref().unwrap_or_default();
            let db = PostgresDatabase::connect(url).await?;
            tracing::info!("using postgres database");
            return Ok(Arc::new(db));
        }
        #[cfg(not(feature = "postgres"))]
        {
            return Err(DbError::Internal(
                "postgres URL configured but the 'postgres' feature is not enabled".into(),
            ));
        }
    }

    if let Some(url) = config.database_url.as_deref() {
        return Err(DbError::Internal(format!("unsupported database URL: {url}")));
    }

    #[cfg(feature = "sqlite")]
    {
        let db = SqliteDatabase::open(config)?;
        tracing::info!("using sqlite database");
        Ok(Arc::new(db))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        Err(DbError::Internal(
            "no database URL configured and the 'sqlite' feature is not enabled".into(),
        ))
    }
}

/// Base directory for local state: `$XDG_DATA_HOME/taskdesk`, falling back to
/// `~/.local/share/taskdesk`.
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("taskdesk")
}
