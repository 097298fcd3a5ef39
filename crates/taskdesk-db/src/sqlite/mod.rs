pub(crate) mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode};

use taskdesk_core::task::{CreateTask, Task, UpdateTask};
use taskdesk_core::user::{CreateUser, User, UserCredentials};

use crate::{Database, DbConfig, DbError};

/// `.to_db()?` maps a rusqlite result into `DbError` inside the query modules.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("taskdesk.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(|conn| {
            migrations::run(conn)?;
            Ok(())
        })
    }

    /// Run a synchronous query on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&SqliteDatabase) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

/// Map a `rusqlite::Error` into a `DbError`; unique-constraint failures become `Conflict`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    match &e {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == ErrorCode::ConstraintViolation
                && code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            DbError::Conflict(e.to_string())
        }
        _ => DbError::Internal(e.to_string()),
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    // -- Users --
    async fn create_user(&self, input: &CreateUser) -> Result<User, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_user_sync(&input)).await
    }
    async fn get_user(&self, id: &str) -> Result<User, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_user_sync(&id)).await
    }
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserCredentials>, DbError> {
        let email = email.to_string();
        self.blocking(move |db| db.find_user_by_email_sync(&email))
            .await
    }

    // -- Tasks --
    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_task_sync(&input)).await
    }
    async fn get_task(&self, id: &str) -> Result<Task, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_task_sync(&id)).await
    }
    async fn list_tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>, DbError> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.list_tasks_for_user_sync(&user_id))
            .await
    }
    async fn update_task(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError> {
        let id = id.to_string();
        let update = update.clone();
        self.blocking(move |db| db.update_task_sync(&id, &update))
            .await
    }
    async fn delete_task(&self, id: &str) -> Result<(), DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.delete_task_sync(&id)).await
    }
    async fn list_attachment_paths(&self) -> Result<Vec<String>, DbError> {
        self.blocking(|db| db.list_attachment_paths_sync()).await
    }

    // -- Revoked tokens --
    async fn revoke_token(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<(), DbError> {
        let token_id = token_id.to_string();
        self.blocking(move |db| db.revoke_token_sync(&token_id, expires_at))
            .await
    }
    async fn is_token_revoked(&self, token_id: &str) -> Result<bool, DbError> {
        let token_id = token_id.to_string();
        self.blocking(move |db| db.is_token_revoked_sync(&token_id))
            .await
    }
    async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        self.blocking(move |db| db.purge_expired_revocations_sync(now))
            .await
    }
}
