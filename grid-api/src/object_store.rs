/// Read access to the blob store that holds configuration and grid objects.
/// Writing is the job of the upstream batch jobs.
use crate::config::ObjectStoreType;
use crate::paths::ObjectPath;
use async_trait::async_trait;
use bytes::Bytes;
use google_cloud_storage::client::Storage;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("object {0} not found")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("gcs error: {0}")]
    Gcs(String),

    #[error("object {0} does not map to a path under the store root")]
    InvalidPath(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, path: &ObjectPath) -> Result<Bytes, StoreError>;
}

pub async fn get_store(store_type: ObjectStoreType) -> Result<Arc<dyn ObjectStore>, StoreError> {
    match store_type {
        ObjectStoreType::Filesystem { base_dir } => Ok(Arc::new(FilesystemStore::new(&base_dir))),
        ObjectStoreType::Gcs => Ok(Arc::new(GcsStore::new().await?)),
    }
}

/// Serves `gs://bucket/object` from `<base_dir>/bucket/object` and `file://`
/// paths directly.
pub struct FilesystemStore {
    base_dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(base_dir: &str) -> Self {
        FilesystemStore {
            base_dir: PathBuf::from(base_dir),
        }
    }

    fn local_path(&self, path: &ObjectPath) -> Result<PathBuf, StoreError> {
        let object = path.object();
        let relative = Path::new(object.trim_start_matches('/'));
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(StoreError::InvalidPath(path.to_string()));
        }

        if path.is_local() {
            Ok(Path::new("/").join(relative))
        } else {
            Ok(self.base_dir.join(path.bucket()).join(relative))
        }
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn get(&self, path: &ObjectPath) -> Result<Bytes, StoreError> {
        let local = self.local_path(path)?;
        match tokio::fs::read(&local).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub struct GcsStore {
    client: Storage,
}

impl GcsStore {
    /// Uses application default credentials.
    pub async fn new() -> Result<Self, StoreError> {
        let client = Storage::builder()
            .build()
            .await
            .map_err(|e| StoreError::Gcs(e.to_string()))?;
        Ok(GcsStore { client })
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn get(&self, path: &ObjectPath) -> Result<Bytes, StoreError> {
        if path.is_local() {
            return Err(StoreError::Gcs(format!("{path} is not a gs:// path")));
        }

        let not_found_or = |e: google_cloud_storage::Error| {
            if e.http_status_code() == Some(404) {
                StoreError::NotFound(path.to_string())
            } else {
                StoreError::Gcs(e.to_string())
            }
        };

        let mut response = self
            .client
            .read_object(format!("projects/_/buckets/{}", path.bucket()), path.object())
            .send()
            .await
            .map_err(not_found_or)?;

        let mut contents = Vec::new();
        while let Some(chunk) = response.next().await.transpose().map_err(not_found_or)? {
            contents.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(contents))
    }
}
