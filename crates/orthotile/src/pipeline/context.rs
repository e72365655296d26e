use std::path::PathBuf;
use std::time::Instant;

use crate::jobs::JobHandle;
use crate::publish::ReplaceReport;

use super::workdir::WorkDir;

pub struct PipelineContext {
    // Input
    pub job: JobHandle,
    pub site: String,
    pub primary: PathBuf,
    pub hillshade: Option<PathBuf>,
    pub opacity: f64,
    pub work_dir: WorkDir,
    pub started: Instant,

    // Align result, only with a hillshade
    pub aligned_hillshade: Option<PathBuf>,

    // Blend result; tiling falls back to the primary raster when unset
    pub blended: Option<PathBuf>,

    // Tiling result
    pub tiles_dir: Option<PathBuf>,

    // Publish result
    pub report: Option<ReplaceReport>,
}

impl PipelineContext {
    pub fn new(
        job: JobHandle,
        site: impl Into<String>,
        primary: PathBuf,
        hillshade: Option<PathBuf>,
        opacity: f64,
        work_dir: WorkDir,
    ) -> Self {
        Self {
            job,
            site: site.into(),
            primary,
            hillshade,
            opacity,
            work_dir,
            started: Instant::now(),
            aligned_hillshade: None,
            blended: None,
            tiles_dir: None,
            report: None,
        }
    }

    /// Raster the tiling step reads.
    pub fn tiling_source(&self) -> &PathBuf {
        self.blended.as_ref().unwrap_or(&self.primary)
    }
}
