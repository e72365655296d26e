//! Submission and polling entry points.
//!
//! A transport (HTTP handler, CLI) calls [`TileService::submit`] with an
//! uploaded raster already on local disk and gets a job id back straight
//! away. The job then runs on its own task; callers follow it with
//! [`TileService::status`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{OrthotileError, ServiceError, ValidationError};
use crate::jobs::{JobRegistry, JobSnapshot, NewJob};
use crate::pipeline::{Pipeline, PipelineConfig, PipelineContext, WorkDir};
use crate::publish::{create_remote_store, Publisher, RemoteLayout, RemoteStore};
use crate::tools::{ProcessRunner, ToolRunner};

const RASTER_EXTENSIONS: &[&str] = &["tif", "tiff"];
const RASTER_EXPECTED: &str = "a GeoTIFF (.tif or .tiff)";
const OVERLAY_EXPECTED: &str = "a KML (.kml)";

const STAGED_PRIMARY: &str = "input.tif";
const STAGED_HILLSHADE: &str = "hillshade.tif";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageMode {
    Move,
    Copy,
}

/// A raster file handed over by the caller.
#[derive(Debug, Clone)]
pub struct RasterUpload {
    /// Name the client gave the file; used for extension checks only.
    pub file_name: String,
    pub path: PathBuf,
    mode: StageMode,
}

impl RasterUpload {
    /// The file is moved into the job's working directory. Use for
    /// temporary upload files the caller no longer needs.
    pub fn moved(path: impl Into<PathBuf>) -> Self {
        Self::with_mode(path.into(), StageMode::Move)
    }

    /// The file is copied, leaving the caller's file in place.
    pub fn copied(path: impl Into<PathBuf>) -> Self {
        Self::with_mode(path.into(), StageMode::Copy)
    }

    fn with_mode(path: PathBuf, mode: StageMode) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            file_name,
            path,
            mode,
        }
    }

    /// Overrides the client-facing file name.
    pub fn named(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub site: String,
    pub primary: RasterUpload,
    pub hillshade: Option<RasterUpload>,
    /// Hillshade blend opacity in `[0, 1]`. Ignored without a hillshade.
    pub opacity: f64,
}

fn has_extension(file_name: &str, allowed: &[&str]) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| allowed.iter().any(|a| e.eq_ignore_ascii_case(a)))
}

fn check_raster(upload: &RasterUpload) -> Result<(), ValidationError> {
    if !has_extension(&upload.file_name, RASTER_EXTENSIONS) {
        return Err(ValidationError::InvalidExtension {
            file_name: upload.file_name.clone(),
            expected: RASTER_EXPECTED,
        });
    }
    if !upload.path.is_file() {
        return Err(ValidationError::MissingFile(upload.path.clone()));
    }
    Ok(())
}

async fn stage(upload: &RasterUpload, dest: &Path) -> Result<(), ValidationError> {
    let stage_err = |source| ValidationError::Stage {
        path: dest.to_path_buf(),
        source,
    };

    match upload.mode {
        StageMode::Copy => {
            tokio::fs::copy(&upload.path, dest).await.map_err(stage_err)?;
        }
        StageMode::Move => {
            if tokio::fs::rename(&upload.path, dest).await.is_err() {
                // Different filesystem: copy, then drop the original.
                tokio::fs::copy(&upload.path, dest).await.map_err(stage_err)?;
                if let Err(e) = tokio::fs::remove_file(&upload.path).await {
                    log::warn!(
                        "Staged upload but could not remove {}: {}",
                        upload.path.display(),
                        e
                    );
                }
            }
        }
    }
    Ok(())
}

/// Returns a moved upload to where the caller left it.
async fn unstage(upload: &RasterUpload, dest: &Path) {
    if upload.mode != StageMode::Move {
        return;
    }
    if tokio::fs::rename(dest, &upload.path).await.is_ok() {
        return;
    }
    if let Err(e) = tokio::fs::copy(dest, &upload.path).await {
        log::warn!(
            "Could not restore upload {}: {}",
            upload.path.display(),
            e
        );
    }
}

/// Stages every upload in order. On failure, moved uploads already staged
/// are put back before the error is returned.
async fn stage_all(uploads: &[(&RasterUpload, PathBuf)]) -> Result<(), ValidationError> {
    for (staged, (upload, dest)) in uploads.iter().enumerate() {
        if let Err(e) = stage(upload, dest).await {
            for (upload, dest) in &uploads[..staged] {
                unstage(upload, dest).await;
            }
            return Err(e);
        }
    }
    Ok(())
}

pub struct TileService {
    config: Arc<Config>,
    registry: Arc<JobRegistry>,
    pipeline: Arc<Pipeline>,
    publisher: Arc<Publisher>,
}

impl TileService {
    /// Production constructor: real subprocesses and the configured store.
    pub fn from_config(config: Config) -> Result<Self, OrthotileError> {
        let store = create_remote_store(&config.storage)?;
        Ok(Self::new(
            config,
            Arc::new(ProcessRunner::new()),
            store,
            Arc::new(JobRegistry::new()),
        ))
    }

    pub fn new(
        config: Config,
        runner: Arc<dyn ToolRunner>,
        store: Arc<dyn RemoteStore>,
        registry: Arc<JobRegistry>,
    ) -> Self {
        let publisher = Arc::new(Publisher::new(
            store,
            RemoteLayout::from_config(&config),
            config.upload_concurrency,
        ));
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(PipelineConfig::from_config(&config)),
            runner,
            Arc::clone(&publisher),
        ));

        Self {
            config: Arc::new(config),
            registry,
            pipeline,
            publisher,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn sites(&self) -> &[String] {
        &self.config.sites
    }

    pub fn overlay_categories(&self) -> &[String] {
        &self.config.overlay_categories
    }

    fn check_site(&self, site: &str) -> Result<(), ValidationError> {
        if self.config.sites.iter().any(|s| s == site) {
            Ok(())
        } else {
            Err(ValidationError::UnknownSite {
                site: site.to_string(),
                allowed: self.config.sites.join(", "),
            })
        }
    }

    /// Validates the request, stages the rasters and starts the job.
    ///
    /// Nothing is registered unless validation and staging succeed.
    pub async fn submit(&self, request: SubmitRequest) -> Result<String, ValidationError> {
        let site = request.site.trim().to_string();
        self.check_site(&site)?;

        if !request.opacity.is_finite() || !(0.0..=1.0).contains(&request.opacity) {
            return Err(ValidationError::InvalidOpacity(request.opacity));
        }

        check_raster(&request.primary)?;
        if let Some(hillshade) = &request.hillshade {
            check_raster(hillshade)?;
        }

        let root = PathBuf::from(&self.config.work_directory);
        let dir_name = format!("job-{}", Uuid::new_v4().simple());
        let work_dir = WorkDir::create(&root, &dir_name)
            .await
            .map_err(|source| ValidationError::Stage {
                path: root.join(&dir_name),
                source,
            })?;

        let primary = work_dir.join(STAGED_PRIMARY);
        let hillshade = request
            .hillshade
            .as_ref()
            .map(|_| work_dir.join(STAGED_HILLSHADE));

        let mut uploads = vec![(&request.primary, primary.clone())];
        if let (Some(upload), Some(dest)) = (&request.hillshade, &hillshade) {
            uploads.push((upload, dest.clone()));
        }

        let staged = match stage_all(&uploads).await {
            Ok(()) => tokio::fs::metadata(&primary)
                .await
                .map(|m| m.len())
                .map_err(|source| ValidationError::Stage {
                    path: primary.clone(),
                    source,
                }),
            Err(e) => Err(e),
        };

        let input_bytes = match staged {
            Ok(bytes) => bytes,
            Err(e) => {
                work_dir.release().await;
                return Err(e);
            }
        };

        let job = self.registry.create(NewJob {
            site: site.clone(),
            input_bytes,
            hillshade_opacity: hillshade.as_ref().map(|_| request.opacity),
        });
        let job_id = job.job_id().to_string();

        info!(
            "Job {} accepted for site {} ({} bytes{})",
            job_id,
            site,
            input_bytes,
            if hillshade.is_some() {
                ", with hillshade"
            } else {
                ""
            }
        );

        let ctx = PipelineContext::new(job, site, primary, hillshade, request.opacity, work_dir);
        // Detached; the job record is the only result channel.
        drop(self.pipeline.spawn(ctx));

        Ok(job_id)
    }

    pub fn status(&self, job_id: &str) -> Result<JobSnapshot, ServiceError> {
        self.registry
            .snapshot(job_id)
            .ok_or_else(|| ServiceError::UnknownJob(job_id.to_string()))
    }

    pub fn jobs(&self) -> Vec<JobSnapshot> {
        self.registry.list()
    }

    /// Publishes a KML overlay for a site and returns its public URL.
    pub async fn publish_overlay(
        &self,
        site: &str,
        category: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ServiceError> {
        self.check_site(site)?;

        if !self.config.overlay_categories.iter().any(|c| c == category) {
            return Err(ValidationError::UnknownOverlayCategory {
                category: category.to_string(),
                allowed: self.config.overlay_categories.join(", "),
            }
            .into());
        }

        if !has_extension(file_name, &["kml"]) {
            return Err(ValidationError::InvalidExtension {
                file_name: file_name.to_string(),
                expected: OVERLAY_EXPECTED,
            }
            .into());
        }

        Ok(self.publisher.publish_overlay(site, category, bytes).await?)
    }
}
