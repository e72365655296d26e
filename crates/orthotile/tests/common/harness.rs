//! Test harness for isolated service runs.
//!
//! The `TestHarness` struct wires a [`TileService`] to:
//! - temporary upload and work directories
//! - an in-memory object store
//! - a [`ScriptedRunner`] instead of the GDAL tools

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use object_store::memory::InMemory;
use tempfile::TempDir;

use orthotile::jobs::{JobRegistry, JobSnapshot};
use orthotile::publish::{ObjectStoreRemote, RemoteStore};
use orthotile::{Config, TileService};

use super::tools::ScriptedRunner;

pub const CDN_DOMAIN: &str = "tiles.example.com";

pub struct TestHarness {
    /// Keeps the temp tree alive for the test's duration.
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub work_root: PathBuf,
    pub config: Config,
    pub runner: Arc<ScriptedRunner>,
    /// The destination as the service sees it, without any failure wrapper.
    pub remote: Arc<dyn RemoteStore>,
    pub registry: Arc<JobRegistry>,
    pub service: TileService,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_runner(ScriptedRunner::default())
    }

    pub fn with_runner(runner: ScriptedRunner) -> Self {
        Self::build(runner, |remote| remote)
    }

    /// Builds with the store the service uses wrapped by `wrap`.
    pub fn build(
        runner: ScriptedRunner,
        wrap: impl FnOnce(Arc<dyn RemoteStore>) -> Arc<dyn RemoteStore>,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");
        let work_root = temp_dir.path().join("work");
        std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");

        let mut config = Config::default();
        config.work_directory = work_root.to_string_lossy().into_owned();
        config.cdn.domain = CDN_DOMAIN.to_string();
        config.upload_concurrency = 4;

        let runner = Arc::new(runner);
        let remote: Arc<dyn RemoteStore> =
            Arc::new(ObjectStoreRemote::new(Arc::new(InMemory::new())));
        let registry = Arc::new(JobRegistry::new());
        let service = TileService::new(
            config.clone(),
            runner.clone(),
            wrap(Arc::clone(&remote)),
            Arc::clone(&registry),
        );

        Self {
            temp_dir,
            upload_dir,
            work_root,
            config,
            runner,
            remote,
            registry,
            service,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes an upload of `len` bytes. Large sizes are sparse.
    pub fn write_raster(&self, file_name: &str, len: u64) -> PathBuf {
        let path = self.upload_dir.join(file_name);
        let file = std::fs::File::create(&path).expect("Failed to create raster");
        file.set_len(len).expect("Failed to size raster");
        path
    }

    /// Puts objects under the destination, as an earlier run would have.
    pub async fn seed_remote(&self, keys: &[&str]) {
        for key in keys {
            self.remote
                .put_bytes(key, b"old".to_vec(), "image/png")
                .await
                .expect("Failed to seed remote store");
        }
    }

    pub async fn remote_keys(&self, prefix: &str) -> Vec<String> {
        let mut keys = self.remote.list_keys(prefix).await.expect("list failed");
        keys.sort();
        keys
    }

    /// Job working directories that still exist.
    pub fn leftover_work_dirs(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.work_root) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Polls until the job is terminal and returns every snapshot seen.
    pub async fn wait_for_terminal(&self, job_id: &str) -> Vec<JobSnapshot> {
        let mut seen = Vec::new();
        for _ in 0..1000 {
            let snapshot = self.service.status(job_id).expect("job should exist");
            let done = snapshot.status.is_terminal();
            seen.push(snapshot);
            if done {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish; last seen: {:?}", job_id, seen.last());
    }
}
