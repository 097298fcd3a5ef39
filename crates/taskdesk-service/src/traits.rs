use async_trait::async_trait;
use taskdesk_core::attachment::{AttachmentFile, Upload};
use taskdesk_core::task::{TaskInput, TaskView};
use taskdesk_core::ValidationErrors;
use taskdesk_db::DbError;
use taskdesk_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// The bare message, without the variant prefix added by `Display`.
    pub fn message(&self) -> String {
        match self {
            ServiceError::Validation(errors) => errors.message(),
            ServiceError::Unauthenticated(msg)
            | ServiceError::Forbidden(msg)
            | ServiceError::NotFound(msg)
            | ServiceError::Internal(msg) => msg.clone(),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(e: ValidationErrors) -> Self {
        ServiceError::Validation(e)
    }
}

impl From<DbError> for ServiceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => ServiceError::NotFound(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => ServiceError::NotFound(crate::FILE_NOT_FOUND.into()),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

/// Task operations as seen by one authenticated user.
///
/// Implemented by `HttpService`, which talks to a running taskdesk-server
/// with a bearer token.
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<TaskView>, ServiceError>;
    async fn get_task(&self, id: &str) -> Result<TaskView, ServiceError>;
    async fn create_task(
        &self,
        input: &TaskInput,
        upload: Option<Upload>,
    ) -> Result<TaskView, ServiceError>;
    async fn update_task(
        &self,
        id: &str,
        input: &TaskInput,
        upload: Option<Upload>,
    ) -> Result<TaskView, ServiceError>;
    async fn delete_task(&self, id: &str) -> Result<(), ServiceError>;
    async fn preview_attachment(&self, id: &str) -> Result<AttachmentFile, ServiceError>;
}
