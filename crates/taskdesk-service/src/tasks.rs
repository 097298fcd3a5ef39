use std::collections::HashSet;
use std::sync::Arc;

use taskdesk_core::attachment::{AttachmentFile, Upload, PDF_CONTENT_TYPE};
use taskdesk_core::task::{CreateTask, Task, TaskFields, TaskInput, TaskView, UpdateTask};
use taskdesk_core::{Caller, ValidationErrors};
use taskdesk_db::{Database, DbError};
use taskdesk_store::{attachment_key, key_file_name, ObjectStore, StoreError, ATTACHMENT_PREFIX};
use tracing::{info, warn};

use crate::{ServiceError, ATTACHMENT_NOT_FOUND, FILE_NOT_FOUND, TASK_NOT_FOUND, UNAUTHORIZED};

/// Owns the task lifecycle: validation, ownership checks, and keeping task
/// rows and their stored attachments consistent.
#[derive(Clone)]
pub struct TaskManager {
    db: Arc<dyn Database>,
    store: Arc<dyn ObjectStore>,
    public_url: String,
}

impl TaskManager {
    /// `public_url` prefixes the preview links handed to clients; an empty
    /// string yields root-relative links.
    pub fn new(db: Arc<dyn Database>, store: Arc<dyn ObjectStore>, public_url: impl Into<String>) -> Self {
        Self {
            db,
            store,
            public_url: public_url.into(),
        }
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    fn view(&self, task: &Task) -> TaskView {
        TaskView::from_task(task, &self.public_url)
    }

    /// Fetch a task and check it belongs to `caller`. Existence is checked first.
    async fn load_owned(&self, caller: &Caller, id: &str) -> Result<Task, ServiceError> {
        let task = match self.db.get_task(id).await {
            Ok(task) => task,
            Err(DbError::NotFound(_)) => return Err(ServiceError::NotFound(TASK_NOT_FOUND.into())),
            Err(e) => return Err(e.into()),
        };
        if !caller.owns(&task.user_id) {
            return Err(ServiceError::Forbidden(UNAUTHORIZED.into()));
        }
        Ok(task)
    }

    pub async fn list(&self, caller: &Caller) -> Result<Vec<TaskView>, ServiceError> {
        let tasks = self.db.list_tasks_for_user(&caller.user_id).await?;
        Ok(tasks.iter().map(|t| self.view(t)).collect())
    }

    pub async fn show(&self, caller: &Caller, id: &str) -> Result<TaskView, ServiceError> {
        let task = self.load_owned(caller, id).await?;
        Ok(self.view(&task))
    }

    pub async fn create(
        &self,
        caller: &Caller,
        input: &TaskInput,
        upload: Option<Upload>,
    ) -> Result<TaskView, ServiceError> {
        let fields = validate_submission(input, upload.as_ref())?;

        let attachment_path = match upload {
            Some(upload) => Some(self.stage_upload(upload).await?),
            None => None,
        };

        let created = self
            .db
            .create_task(&CreateTask {
                user_id: caller.user_id.clone(),
                title: fields.title,
                description: fields.description,
                status: fields.status,
                deadline: fields.deadline,
                attachment_path: attachment_path.clone(),
            })
            .await;
        let task = match created {
            Ok(task) => task,
            Err(e) => {
                if let Some(key) = &attachment_path {
                    self.discard(key).await;
                }
                return Err(e.into());
            }
        };

        info!(task_id = %task.id, user_id = %caller.user_id, attachment = task.attachment_path.is_some(), "task created");
        Ok(self.view(&task))
    }

    /// Whole-record update. With an upload the attachment is replaced: the new
    /// object is written under a fresh key, the row is pointed at it, and only
    /// then is the old object removed.
    pub async fn update(
        &self,
        caller: &Caller,
        id: &str,
        input: &TaskInput,
        upload: Option<Upload>,
    ) -> Result<TaskView, ServiceError> {
        let fields = validate_submission(input, upload.as_ref())?;
        let existing = self.load_owned(caller, id).await?;

        let new_path = match upload {
            Some(upload) => Some(self.stage_upload(upload).await?),
            None => None,
        };

        let updated = self
            .db
            .update_task(
                id,
                &UpdateTask {
                    title: fields.title,
                    description: fields.description,
                    status: fields.status,
                    deadline: fields.deadline,
                    attachment_path: new_path.clone(),
                },
            )
            .await;
        let task = match updated {
            Ok(task) => task,
            Err(e) => {
                if let Some(key) = &new_path {
                    self.discard(key).await;
                }
                return Err(match e {
                    // deleted between the ownership check and the write
                    DbError::NotFound(_) => ServiceError::NotFound(TASK_NOT_FOUND.into()),
                    other => other.into(),
                });
            }
        };

        if new_path.is_some() {
            if let Some(old) = existing.attachment_path.as_deref() {
                if Some(old) != new_path.as_deref() {
                    self.discard(old).await;
                }
            }
        }

        info!(task_id = %task.id, replaced_attachment = new_path.is_some(), "task updated");
        Ok(self.view(&task))
    }

    /// Remove the row, then its attachment. A failed object delete leaves an
    /// orphan for `prune_orphaned_attachments`.
    pub async fn delete(&self, caller: &Caller, id: &str) -> Result<(), ServiceError> {
        let task = self.load_owned(caller, id).await?;
        match self.db.delete_task(id).await {
            Ok(()) => {}
            Err(DbError::NotFound(_)) => return Err(ServiceError::NotFound(TASK_NOT_FOUND.into())),
            Err(e) => return Err(e.into()),
        }
        if let Some(path) = task.attachment_path.as_deref() {
            self.discard(path).await;
        }
        info!(task_id = %id, "task deleted");
        Ok(())
    }

    /// Bytes of the task's attachment, for the preview endpoint.
    pub async fn attachment(&self, caller: &Caller, id: &str) -> Result<AttachmentFile, ServiceError> {
        let task = self.load_owned(caller, id).await?;
        let Some(path) = task.attachment_path.as_deref() else {
            return Err(ServiceError::NotFound(ATTACHMENT_NOT_FOUND.into()));
        };
        let data = match self.store.get(path).await {
            Ok(data) => data,
            Err(StoreError::NotFound(_)) => {
                warn!(task_id = %id, path, "attachment referenced but missing from store");
                return Err(ServiceError::NotFound(FILE_NOT_FOUND.into()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(AttachmentFile {
            filename: key_file_name(path).to_string(),
            content_type: PDF_CONTENT_TYPE.to_string(),
            data,
        })
    }

    /// Delete stored attachments that no task references. Returns the removed keys.
    ///
    /// An upload whose row has not been written yet also looks unreferenced,
    /// so run this while no writes are in flight.
    pub async fn prune_orphaned_attachments(&self) -> Result<Vec<String>, ServiceError> {
        let referenced: HashSet<String> = self.db.list_attachment_paths().await?.into_iter().collect();
        let mut removed = Vec::new();
        for key in self.store.list(ATTACHMENT_PREFIX).await? {
            if referenced.contains(&key) {
                continue;
            }
            self.store.delete(&key).await?;
            info!(key = %key, "pruned orphaned attachment");
            removed.push(key);
        }
        Ok(removed)
    }

    async fn stage_upload(&self, upload: Upload) -> Result<String, ServiceError> {
        let key = attachment_key();
        self.store.put(&key, upload.data).await?;
        Ok(key)
    }

    /// Best-effort object removal; failures only leak storage.
    async fn discard(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, error = %e, "failed to remove attachment");
        }
    }
}

/// Field and upload checks, reported together.
fn validate_submission(input: &TaskInput, upload: Option<&Upload>) -> Result<TaskFields, ServiceError> {
    let mut errors = ValidationErrors::new();
    let fields = match input.validate() {
        Ok(fields) => Some(fields),
        Err(e) => {
            errors.extend(e);
            None
        }
    };
    if let Some(Err(e)) = upload.map(Upload::validate) {
        errors.extend(e);
    }
    match fields {
        Some(fields) if errors.is_empty() => Ok(fields),
        _ => Err(ServiceError::Validation(errors)),
    }
}
