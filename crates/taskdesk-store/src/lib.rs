mod local;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object missing: {0}")]
    NotFound(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("attachment store: {0}")]
    Internal(String),
}

/// Private blob storage for task attachments.
///
/// Keys are assigned by [`attachment_key`], never by clients, and the objects
/// are only reachable through the authenticated preview endpoint.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, replacing whatever was there.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Fetch the bytes at `key`; a missing object is `StoreError::NotFound`.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    async fn get_opt(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.get(key).await.map(Some).or_else(|e| match e {
            StoreError::NotFound(_) => Ok(None),
            other => Err(other),
        })
    }

    /// Remove `key`. Removing a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Keys starting with `prefix`, in lexical order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.get_opt(key).await.map(|found| found.is_some())
    }
}

/// Prefix under which every attachment lives.
pub const ATTACHMENT_PREFIX: &str = "private/";

/// A fresh, unreferenced key for a new PDF attachment.
pub fn attachment_key() -> String {
    format!("{ATTACHMENT_PREFIX}{}.pdf", uuid::Uuid::new_v4())
}

/// File name component of a key (`private/abc.pdf` → `abc.pdf`).
pub fn key_file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Reject keys that could escape the store root.
pub(crate) fn check_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part == ".." || part == ".");
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Connection settings for a private S3-compatible bucket.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Where attachments are kept: the bucket when one is fully configured,
/// otherwise a directory on local disk.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub s3: Option<S3Settings>,
    /// Required when `s3` is `None`.
    pub data_dir: Option<PathBuf>,
}

fn env_value(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
}

impl StoreConfig {
    /// Read `TASKDESK_S3_*` (falling back to the `AWS_*` names) and
    /// `TASKDESK_DATA_DIR`. A partial S3 configuration is ignored.
    pub fn from_env() -> Self {
        let s3 = (|| {
            Some(S3Settings {
                endpoint: env_value(&["TASKDESK_S3_ENDPOINT", "AWS_ENDPOINT_URL"])?,
                region: env_value(&["TASKDESK_S3_REGION", "AWS_REGION"])
                    .unwrap_or_else(|| "us-east-1".into()),
                bucket: env_value(&["TASKDESK_S3_BUCKET", "AWS_BUCKET"])?,
                access_key_id: env_value(&["TASKDESK_S3_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID"])?,
                secret_access_key: env_value(&[
                    "TASKDESK_S3_SECRET_ACCESS_KEY",
                    "AWS_SECRET_ACCESS_KEY",
                ])?,
            })
        })();
        Self {
            s3,
            data_dir: env_value(&["TASKDESK_DATA_DIR"]).map(PathBuf::from),
        }
    }
}

/// Open the attachment store described by `config`.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    match &config.s3 {
        #[cfg(feature = "s3")]
        Some(settings) => {
            tracing::info!(bucket = %settings.bucket, "attachments stored in s3");
            Ok(Arc::new(S3Store::new(settings)?))
        }
        #[cfg(not(feature = "s3"))]
        Some(_) => Err(StoreError::Internal(
            "bucket configured but built without the 's3' feature".into(),
        )),
        None => {
            let dir = config.data_dir.as_ref().ok_or_else(|| {
                StoreError::Internal("no bucket and no attachment directory configured".into())
            })?;
            let store = LocalStore::at(dir.clone());
            tracing::info!(dir = %store.base_dir().display(), "attachments stored on disk");
            Ok(Arc::new(store))
        }
    }
}
