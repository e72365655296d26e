//! Remote object store seam.
//!
//! The publisher talks to a [`RemoteStore`]; production wraps an
//! `object_store` backend (S3, or a local directory for offline runs).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{stream, StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::StorageConfig;
use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum RemoteStoreError {
    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),

    #[error("Failed to read '{path}': {source}")]
    ReadLocal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create local store directory '{path}': {source}")]
    CreateLocal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No destination configured (set storage.bucket or storage.localPath)")]
    NotConfigured,

    #[error("Storage credentials: {0}")]
    Credentials(#[from] SecretError),
}

/// Key/value blob store with prefix listing.
///
/// Keys are `/`-separated without a leading slash. Listing follows
/// pagination and returns every key under `prefix/`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, RemoteStoreError>;

    /// Deletes the given keys in one batch request where the backend
    /// supports it.
    async fn delete_keys(&self, keys: &[String]) -> Result<(), RemoteStoreError>;

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), RemoteStoreError>;

    async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), RemoteStoreError>;
}

/// [`RemoteStore`] over any `object_store` backend.
pub struct ObjectStoreRemote {
    inner: Arc<dyn ObjectStore>,
    content_types: bool,
}

impl ObjectStoreRemote {
    /// Wraps a backend that accepts object attributes (S3, in-memory).
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            content_types: true,
        }
    }

    /// Wraps a backend that rejects attributes, such as the local
    /// filesystem. Content types are dropped.
    pub fn without_content_types(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            content_types: false,
        }
    }

    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.inner
    }

    fn put_options(&self, content_type: &str) -> PutOptions {
        let mut attributes = Attributes::new();
        if self.content_types {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }
        PutOptions {
            attributes,
            ..Default::default()
        }
    }
}

#[async_trait]
impl RemoteStore for ObjectStoreRemote {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, RemoteStoreError> {
        let prefix = ObjectPath::from(prefix);
        let keys = self
            .inner
            .list(Some(&prefix))
            .map_ok(|meta| meta.location.to_string())
            .try_collect::<Vec<_>>()
            .await?;
        Ok(keys)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<(), RemoteStoreError> {
        let locations: Vec<object_store::Result<ObjectPath>> = keys
            .iter()
            .map(|k| Ok(ObjectPath::from(k.as_str())))
            .collect();
        self.inner
            .delete_stream(stream::iter(locations).boxed())
            .try_collect::<Vec<_>>()
            .await?;
        Ok(())
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), RemoteStoreError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| RemoteStoreError::ReadLocal {
                path: path.to_path_buf(),
                source,
            })?;
        self.put_bytes(key, bytes, content_type).await
    }

    async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), RemoteStoreError> {
        self.inner
            .put_opts(
                &ObjectPath::from(key),
                PutPayload::from(bytes),
                self.put_options(content_type),
            )
            .await?;
        Ok(())
    }
}

/// Builds the configured store. A local path wins over a bucket.
///
/// S3 settings not given in the config (credentials, session token)
/// come from the usual `AWS_*` environment variables.
pub fn create_remote_store(
    storage: &StorageConfig,
) -> Result<Arc<dyn RemoteStore>, RemoteStoreError> {
    if let Some(local_path) = storage.local_path.as_deref().filter(|p| !p.is_empty()) {
        let path = Path::new(local_path);
        std::fs::create_dir_all(path).map_err(|source| RemoteStoreError::CreateLocal {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Publishing to local directory: {}", path.display());
        let store = LocalFileSystem::new_with_prefix(path)?;
        return Ok(Arc::new(ObjectStoreRemote::without_content_types(Arc::new(
            store,
        ))));
    }

    if storage.bucket.is_empty() {
        return Err(RemoteStoreError::NotConfigured);
    }

    tracing::info!("Publishing to S3 bucket: {}", storage.bucket);
    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(&storage.bucket)
        .with_region(&storage.region);

    if let Some(endpoint) = storage.endpoint.as_deref() {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"));
    }
    if let Some(key_id) = storage.access_key_id.resolve()? {
        builder = builder.with_access_key_id(key_id.expose_secret());
    }
    if let Some(secret) = storage.secret_access_key.resolve()? {
        builder = builder.with_secret_access_key(secret.expose_secret());
    }

    Ok(Arc::new(ObjectStoreRemote::new(Arc::new(builder.build()?))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use tempfile::TempDir;

    fn memory_remote() -> ObjectStoreRemote {
        ObjectStoreRemote::new(Arc::new(InMemory::new()))
    }

    #[tokio::test]
    async fn test_put_list_delete() {
        let remote = memory_remote();
        for key in [
            "tiles/gruyere/14/1/1.png",
            "tiles/gruyere/15/2/2.png",
            "tiles/gruyere-east/14/1/1.png",
            "tiles/koth/14/1/1.png",
        ] {
            remote
                .put_bytes(key, b"png".to_vec(), "image/png")
                .await
                .unwrap();
        }

        let mut keys = remote.list_keys("tiles/gruyere").await.unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec!["tiles/gruyere/14/1/1.png", "tiles/gruyere/15/2/2.png"]
        );

        remote.delete_keys(&keys).await.unwrap();
        assert!(remote.list_keys("tiles/gruyere").await.unwrap().is_empty());
        assert_eq!(remote.list_keys("tiles/koth").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_file_missing_source() {
        let remote = memory_remote();
        let err = remote
            .put_file("tiles/x.png", Path::new("/nonexistent/x.png"), "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteStoreError::ReadLocal { .. }));
    }

    #[tokio::test]
    async fn test_local_store_from_config() {
        let dir = TempDir::new().unwrap();
        let storage = StorageConfig {
            local_path: Some(dir.path().join("published").to_string_lossy().into_owned()),
            ..Default::default()
        };
        let remote = create_remote_store(&storage).unwrap();
        remote
            .put_bytes("tiles/koth/boundaries.kml", b"<kml/>".to_vec(), "text/xml")
            .await
            .unwrap();

        let written = dir.path().join("published/tiles/koth/boundaries.kml");
        assert_eq!(std::fs::read(written).unwrap(), b"<kml/>");
    }

    #[test]
    fn test_unconfigured_store() {
        let storage = StorageConfig::default();
        assert!(matches!(
            create_remote_store(&storage),
            Err(RemoteStoreError::NotConfigured)
        ));
    }
}
