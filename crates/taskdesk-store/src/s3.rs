use async_trait::async_trait;
use bytes::Bytes;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::Bucket;

use crate::{check_key, ObjectStore, S3Settings, StoreError};

/// Attachments kept in a private S3-compatible bucket (AWS, MinIO, Garage).
pub struct S3Store {
    bucket: Box<Bucket>,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store").finish_non_exhaustive()
    }
}

impl S3Store {
    pub fn new(settings: &S3Settings) -> Result<Self, StoreError> {
        let credentials = Credentials::new(
            Some(&settings.access_key_id),
            Some(&settings.secret_access_key),
            None,
            None,
            None,
        )
        .map_err(|e| StoreError::Internal(format!("s3 credentials: {e}")))?;
        if settings.bucket.is_empty() {
            return Err(StoreError::Internal("s3 bucket name is empty".into()));
        }
        let region = Region::Custom {
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
        };

        // MinIO and Garage only serve path-style URLs.
        let mut bucket = Bucket::new(&settings.bucket, region, credentials)
            .map_err(|e| StoreError::Internal(format!("s3 bucket: {e}")))?;
        bucket.set_path_style();

        Ok(Self { bucket })
    }
}

fn content_type_for_key(key: &str) -> &'static str {
    if key.to_ascii_lowercase().ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

fn map_s3_error(e: S3Error) -> StoreError {
    StoreError::Internal(format!("s3: {e}"))
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        check_key(key)?;
        let response = self
            .bucket
            .put_object_with_content_type(key, &data, content_type_for_key(key))
            .await
            .map_err(map_s3_error)?;
        if response.status_code() >= 300 {
            return Err(StoreError::Internal(format!(
                "s3 put {key}: status {}",
                response.status_code()
            )));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        check_key(key)?;
        let response = match self.bucket.get_object(key).await {
            Ok(r) => r,
            Err(S3Error::HttpFailWithBody(404, _)) => {
                return Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => return Err(map_s3_error(e)),
        };
        match response.status_code() {
            404 => Err(StoreError::NotFound(key.to_string())),
            code if code >= 400 => Err(StoreError::Internal(format!("s3 get {key}: status {code}"))),
            _ => Ok(Bytes::from(response.to_vec())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        check_key(key)?;
        match self.bucket.delete_object(key).await {
            Ok(_) | Err(S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(map_s3_error(e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let results = self
            .bucket
            .list(prefix.to_string(), None)
            .await
            .map_err(map_s3_error)?;

        let mut keys: Vec<String> = results
            .into_iter()
            .flat_map(|page| page.contents.into_iter().map(|object| object.key))
            .collect();
        keys.sort();
        Ok(keys)
    }
}
