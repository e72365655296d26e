//! Remote store wrapper that fails on demand.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use orthotile::publish::{RemoteStore, RemoteStoreError};

/// Delegates to `inner` until `fail_after` file uploads have succeeded,
/// then rejects every further upload.
pub struct FlakyStore {
    inner: Arc<dyn RemoteStore>,
    fail_after: usize,
    puts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn RemoteStore>, fail_after: usize) -> Self {
        Self {
            inner,
            fail_after,
            puts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RemoteStore for FlakyStore {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, RemoteStoreError> {
        self.inner.list_keys(prefix).await
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<(), RemoteStoreError> {
        self.inner.delete_keys(keys).await
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), RemoteStoreError> {
        if self.puts.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
            return Err(RemoteStoreError::ObjectStore(object_store::Error::Generic {
                store: "flaky",
                source: "connection reset by peer".into(),
            }));
        }
        self.inner.put_file(key, path, content_type).await
    }

    async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), RemoteStoreError> {
        self.inner.put_bytes(key, bytes, content_type).await
    }
}
