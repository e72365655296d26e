//! Prefix replace: delete everything under a prefix, then upload a
//! directory tree in its place.
//!
//! This is not atomic. If an upload fails after the delete, the prefix is
//! left partially populated until the next successful run; the error
//! carries how far the replace got.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::{stream, StreamExt, TryStreamExt};
use thiserror::Error;
use walkdir::WalkDir;

use super::layout::RemoteLayout;
use super::store::{RemoteStore, RemoteStoreError};
use crate::sanitize::redact_prefix;

/// Most object stores cap a batch delete at 1000 keys.
pub const MAX_DELETE_BATCH: usize = 1000;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to scan '{path}': {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Scan of '{path}' did not finish: {reason}")]
    ScanAborted { path: PathBuf, reason: String },

    #[error("Failed to list existing objects under '{prefix}': {source}")]
    List {
        prefix: String,
        #[source]
        source: RemoteStoreError,
    },

    #[error("Delete failed after removing {deleted} existing objects: {source}")]
    Delete {
        deleted: usize,
        #[source]
        source: RemoteStoreError,
    },

    #[error(
        "Upload failed after deleting {deleted} existing objects ({uploaded} of {total} files uploaded): {source}"
    )]
    Upload {
        deleted: usize,
        uploaded: usize,
        total: usize,
        #[source]
        source: RemoteStoreError,
    },
}

impl PublishError {
    /// Objects already removed from the destination when the error hit.
    pub fn deleted(&self) -> usize {
        match self {
            PublishError::Scan { .. }
            | PublishError::ScanAborted { .. }
            | PublishError::List { .. } => 0,
            PublishError::Delete { deleted, .. } | PublishError::Upload { deleted, .. } => *deleted,
        }
    }
}

/// Callbacks for replace progress.
pub trait ReplaceObserver: Send + Sync {
    /// All existing objects under the prefix are gone.
    fn deleted(&self, _count: usize) {}

    /// Called after each successful upload.
    fn uploaded(&self, _done: usize, _total: usize) {}
}

pub struct NoopObserver;

impl ReplaceObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceReport {
    pub deleted_count: usize,
    pub uploaded_count: usize,
    pub total_file_count: usize,
    pub files_per_second: f64,
    pub upload_seconds: f64,
    pub upload_eta_seconds: u64,
}

impl ReplaceReport {
    fn new(deleted: usize, uploaded: usize, total: usize, upload_seconds: f64) -> Self {
        let files_per_second = uploaded as f64 / upload_seconds.max(1.0);
        let remaining = total.saturating_sub(uploaded);
        let upload_eta_seconds = if remaining == 0 || files_per_second <= 0.0 {
            0
        } else {
            (remaining as f64 / files_per_second).ceil() as u64
        };

        Self {
            deleted_count: deleted,
            uploaded_count: uploaded,
            total_file_count: total,
            files_per_second,
            upload_seconds,
            upload_eta_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LocalFile {
    pub path: PathBuf,
    pub key: String,
}

/// Content type for an upload: image types as guessed from the extension,
/// everything else as a generic binary.
pub fn content_type_for(path: &Path) -> String {
    match mime_guess::from_path(path).first() {
        Some(mime) if mime.type_() == mime_guess::mime::IMAGE => mime.essence_str().to_string(),
        _ => DEFAULT_CONTENT_TYPE.to_string(),
    }
}

fn join_key(prefix: &str, relative: &str) -> String {
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", prefix, relative)
    }
}

/// Regular files under `root`, sorted, with their destination keys.
pub(crate) fn collect_files(root: &Path, prefix: &str) -> Result<Vec<LocalFile>, PublishError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| PublishError::Scan {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let relative: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        files.push(LocalFile {
            key: join_key(prefix, &relative.join("/")),
            path: entry.into_path(),
        });
    }

    Ok(files)
}

/// [`collect_files`] on the blocking pool. A full zoom range can hold
/// millions of files.
async fn scan_files(root: &Path, prefix: &str) -> Result<Vec<LocalFile>, PublishError> {
    let owned_root = root.to_path_buf();
    let owned_prefix = prefix.to_string();
    tokio::task::spawn_blocking(move || collect_files(&owned_root, &owned_prefix))
        .await
        .map_err(|e| PublishError::ScanAborted {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?
}

pub struct Publisher {
    pub(crate) store: Arc<dyn RemoteStore>,
    pub(crate) layout: RemoteLayout,
    upload_concurrency: usize,
}

impl Publisher {
    pub fn new(store: Arc<dyn RemoteStore>, layout: RemoteLayout, upload_concurrency: usize) -> Self {
        Self {
            store,
            layout,
            upload_concurrency: upload_concurrency.max(1),
        }
    }

    pub fn layout(&self) -> &RemoteLayout {
        &self.layout
    }

    /// Replaces everything under `prefix` with the files in `local_dir`.
    ///
    /// The local tree is scanned before anything is deleted, so an
    /// unreadable tiles directory leaves the destination untouched.
    pub async fn replace(
        &self,
        local_dir: &Path,
        prefix: &str,
        observer: &dyn ReplaceObserver,
    ) -> Result<ReplaceReport, PublishError> {
        let prefix = prefix.trim_matches('/');
        let files = scan_files(local_dir, prefix).await?;
        let total = files.len();

        let existing = self
            .store
            .list_keys(prefix)
            .await
            .map_err(|source| PublishError::List {
                prefix: prefix.to_string(),
                source,
            })?;

        let mut deleted = 0;
        for batch in existing.chunks(MAX_DELETE_BATCH) {
            self.store
                .delete_keys(batch)
                .await
                .map_err(|source| PublishError::Delete { deleted, source })?;
            deleted += batch.len();
        }
        tracing::info!(
            prefix = %redact_prefix(prefix),
            deleted,
            "Removed existing objects"
        );
        observer.deleted(deleted);

        let started = Instant::now();
        let uploaded = AtomicUsize::new(0);

        let result = stream::iter(files)
            .map(|file| {
                let store = &self.store;
                let uploaded = &uploaded;
                async move {
                    let content_type = content_type_for(&file.path);
                    store.put_file(&file.key, &file.path, &content_type).await?;
                    let done = uploaded.fetch_add(1, Ordering::SeqCst) + 1;
                    observer.uploaded(done, total);
                    Ok::<(), RemoteStoreError>(())
                }
            })
            .buffer_unordered(self.upload_concurrency)
            .try_for_each(|()| async { Ok(()) })
            .await;

        let uploaded = uploaded.load(Ordering::SeqCst);
        if let Err(source) = result {
            return Err(PublishError::Upload {
                deleted,
                uploaded,
                total,
                source,
            });
        }

        let report = ReplaceReport::new(deleted, uploaded, total, started.elapsed().as_secs_f64());
        tracing::info!(
            prefix = %redact_prefix(prefix),
            uploaded,
            files_per_second = report.files_per_second,
            "Upload complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::ObjectStoreRemote;
    use async_trait::async_trait;
    use object_store::memory::InMemory;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records the size of every delete batch.
    struct BatchCountingStore {
        inner: ObjectStoreRemote,
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl RemoteStore for BatchCountingStore {
        async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, RemoteStoreError> {
            self.inner.list_keys(prefix).await
        }

        async fn delete_keys(&self, keys: &[String]) -> Result<(), RemoteStoreError> {
            self.batches.lock().unwrap().push(keys.len());
            self.inner.delete_keys(keys).await
        }

        async fn put_file(
            &self,
            key: &str,
            path: &Path,
            content_type: &str,
        ) -> Result<(), RemoteStoreError> {
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

    fn layout() -> RemoteLayout {
        RemoteLayout {
            prefix: "tiles".to_string(),
            cdn_domain: "cdn.example.com".to_string(),
            origin_includes_prefix: true,
        }
    }

    fn require_send<F: std::future::Future + Send>(future: F) -> F {
        future
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("14/1/2.png")), "image/png");
        assert_eq!(content_type_for(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("tilemapresource.xml")), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for(Path::new("noextension")), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_collect_files_posix_keys_sorted() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("15/3")).unwrap();
        std::fs::create_dir_all(root.join("14/1")).unwrap();
        std::fs::create_dir_all(root.join("14/empty")).unwrap();
        std::fs::write(root.join("15/3/4.png"), b"b").unwrap();
        std::fs::write(root.join("14/1/2.png"), b"a").unwrap();

        let files = collect_files(root, "tiles/gruyere").unwrap();
        let keys: Vec<&str> = files.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["tiles/gruyere/14/1/2.png", "tiles/gruyere/15/3/4.png"]);
    }

    #[test]
    fn test_collect_files_missing_root() {
        let result = collect_files(Path::new("/nonexistent/tiles"), "tiles");
        assert!(matches!(result, Err(PublishError::Scan { .. })));
    }

    #[tokio::test]
    async fn test_delete_batches_capped() {
        let store = Arc::new(BatchCountingStore {
            inner: ObjectStoreRemote::new(Arc::new(InMemory::new())),
            batches: Mutex::new(Vec::new()),
        });
        for i in 0..2500 {
            store
                .put_bytes(
                    &format!("tiles/gruyere/18/{}/{}.png", i / 100, i),
                    b"old".to_vec(),
                    "image/png",
                )
                .await
                .unwrap();
        }
        store
            .put_bytes("tiles/koth/18/1/1.png", b"other".to_vec(), "image/png")
            .await
            .unwrap();

        let empty = TempDir::new().unwrap();
        let publisher = Publisher::new(store.clone(), layout(), 4);
        let report = publisher
            .replace(empty.path(), "tiles/gruyere", &NoopObserver)
            .await
            .unwrap();

        assert_eq!(*store.batches.lock().unwrap(), vec![1000, 1000, 500]);
        assert_eq!(report.deleted_count, 2500);
        assert_eq!(report.uploaded_count, 0);
        assert!(store.list_keys("tiles/gruyere").await.unwrap().is_empty());
        assert_eq!(store.list_keys("tiles/koth").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_future_can_be_spawned() {
        let tiles = TempDir::new().unwrap();
        std::fs::create_dir_all(tiles.path().join("14/1")).unwrap();
        std::fs::write(tiles.path().join("14/1/2.png"), b"png").unwrap();

        let publisher = Arc::new(Publisher::new(
            Arc::new(ObjectStoreRemote::new(Arc::new(InMemory::new()))),
            layout(),
            2,
        ));
        let root = tiles.path().to_path_buf();
        let task = tokio::spawn(async move {
            require_send(publisher.replace(&root, "tiles/gruyere", &NoopObserver)).await
        });

        let report = task.await.unwrap().unwrap();
        assert_eq!(report.uploaded_count, 1);
        assert_eq!(report.total_file_count, 1);
    }

    #[tokio::test]
    async fn test_replace_missing_tree_is_scan_error() {
        let publisher = Publisher::new(
            Arc::new(ObjectStoreRemote::new(Arc::new(InMemory::new()))),
            layout(),
            2,
        );
        let err = publisher
            .replace(Path::new("/nonexistent/tiles"), "tiles/gruyere", &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Scan { .. }));
        assert_eq!(err.deleted(), 0);
    }

    #[test]
    fn test_report_rates() {
        let report = ReplaceReport::new(5, 100, 100, 0.2);
        assert_eq!(report.files_per_second, 100.0);
        assert_eq!(report.upload_eta_seconds, 0);

        let partial = ReplaceReport::new(0, 50, 150, 10.0);
        assert_eq!(partial.files_per_second, 5.0);
        assert_eq!(partial.upload_eta_seconds, 20);
    }

    #[test]
    fn test_error_deleted_count() {
        let err = PublishError::Upload {
            deleted: 7,
            uploaded: 3,
            total: 10,
            source: RemoteStoreError::NotConfigured,
        };
        assert_eq!(err.deleted(), 7);
        assert!(err.to_string().starts_with(
            "Upload failed after deleting 7 existing objects (3 of 10 files uploaded)"
        ));
    }
}
