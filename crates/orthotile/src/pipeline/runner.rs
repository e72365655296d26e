use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info_span, Instrument};

use crate::jobs::{checkpoint, JobOutcome, JobStatus};
use crate::publish::Publisher;
use crate::raster::{BlendCommand, GridAligner, TilingCommand};
use crate::sanitize;
use crate::tools::ToolRunner;

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::progress::UploadProgress;

const ALIGNED_HILLSHADE: &str = "hillshade_aligned.tif";
const BLENDED: &str = "blended.tif";
const TILES_DIR: &str = "tiles";

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    runner: Arc<dyn ToolRunner>,
    aligner: GridAligner,
    blend: BlendCommand,
    tiling: TilingCommand,
    publisher: Arc<Publisher>,
}

impl Pipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        runner: Arc<dyn ToolRunner>,
        publisher: Arc<Publisher>,
    ) -> Self {
        let aligner = GridAligner::new(
            Arc::clone(&runner),
            &config.info_executable,
            &config.warp_executable,
            config.align_timeout,
        );
        let blend = config.blend_command();
        let tiling = config.tiling_command();

        Self {
            config,
            runner,
            aligner,
            blend,
            tiling,
            publisher,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the job on its own task.
    ///
    /// The pipeline itself runs on an inner task; if that task panics the
    /// outer one records the job as failed. The working directory has
    /// already been removed by then, when the context was dropped during
    /// unwinding.
    pub fn spawn(self: &Arc<Self>, ctx: PipelineContext) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        let job = ctx.job.clone();

        tokio::spawn(async move {
            let inner = tokio::spawn(async move { pipeline.run(ctx).await });
            if let Err(e) = inner.await {
                tracing::error!(job_id = %job.job_id(), "Pipeline task aborted: {}", e);
                job.fail(format!("Pipeline task aborted: {}", e));
            }
        })
    }

    /// Runs every stage, then releases the working directory and records
    /// the terminal state, in that order.
    pub async fn run(&self, mut ctx: PipelineContext) {
        let span = info_span!("pipeline",
            job_id = %ctx.job.job_id(),
            site = %ctx.site,
            input = %sanitize::redact_path(&ctx.primary),
            hillshade = ctx.hillshade.is_some(),
        );

        async move {
            let result = self.execute(&mut ctx).await;

            let PipelineContext { job, work_dir, .. } = ctx;
            work_dir.release().await;

            match result {
                Ok((outcome, message)) => {
                    tracing::info!(
                        uploaded = outcome.uploaded_count,
                        deleted = outcome.deleted_count,
                        elapsed_seconds = outcome.elapsed_seconds,
                        "Job complete"
                    );
                    job.complete(outcome, message);
                }
                Err(e) => {
                    tracing::warn!("Job failed: {}", e);
                    job.fail(e.to_string());
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
    ) -> Result<(JobOutcome, String), PipelineError> {
        if ctx.hillshade.is_some() {
            self.step_align(ctx)
                .instrument(info_span!("align_hillshade"))
                .await?;
            self.step_blend(ctx)
                .instrument(info_span!("blend_hillshade"))
                .await?;
        }

        self.step_tile(ctx)
            .instrument(info_span!("generate_tiles"))
            .await?;

        self.step_publish(ctx)
            .instrument(info_span!("publish_tiles"))
            .await?;

        Ok(self.outcome(ctx))
    }

    pub(crate) async fn step_align(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let Some(hillshade) = ctx.hillshade.clone() else {
            return Ok(());
        };

        ctx.job.advance(
            JobStatus::Aligning,
            checkpoint::ALIGNING,
            "Aligning hillshade to orthoimage grid...",
        );

        let output = ctx.work_dir.join(ALIGNED_HILLSHADE);
        let aligned = self.aligner.align(&ctx.primary, &hillshade, &output).await?;
        ctx.aligned_hillshade = Some(aligned);
        Ok(())
    }

    pub(crate) async fn step_blend(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let Some(aligned) = ctx.aligned_hillshade.clone() else {
            return Ok(());
        };

        ctx.job.advance(
            JobStatus::Blending,
            checkpoint::BLENDING,
            format!(
                "Blending hillshade at {:.0}% opacity...",
                ctx.opacity * 100.0
            ),
        );

        let output = ctx.work_dir.join(BLENDED);
        let invocation = self
            .blend
            .invocation(&ctx.primary, &aligned, ctx.opacity, &output);
        self.runner
            .run(&invocation, self.config.calc_timeout)
            .await
            .map_err(PipelineError::blend)?;

        ctx.blended = Some(output);
        Ok(())
    }

    pub(crate) async fn step_tile(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        ctx.job.advance(
            JobStatus::Tiling,
            checkpoint::TILING,
            format!(
                "Generating tiles (zoom {})...",
                self.tiling.zoom_range()
            ),
        );

        let tiles_dir = ctx.work_dir.join(TILES_DIR);
        let invocation = self.tiling.invocation(ctx.tiling_source(), &tiles_dir);
        self.runner
            .run(&invocation, self.config.tiling_timeout)
            .await
            .map_err(PipelineError::tiling)?;

        ctx.tiles_dir = Some(tiles_dir);
        Ok(())
    }

    pub(crate) async fn step_publish(
        &self,
        ctx: &mut PipelineContext,
    ) -> Result<(), PipelineError> {
        let tiles_dir = ctx
            .tiles_dir
            .clone()
            .unwrap_or_else(|| ctx.work_dir.join(TILES_DIR));

        ctx.job.advance(
            JobStatus::Uploading,
            checkpoint::UPLOADING,
            "Replacing existing tiles...",
        );

        let prefix = self.publisher.layout().site_prefix(&ctx.site);
        let observer = UploadProgress::new(&ctx.job);
        let report = self
            .publisher
            .replace(&tiles_dir, &prefix, &observer)
            .await?;

        ctx.report = Some(report);
        Ok(())
    }

    fn outcome(&self, ctx: &PipelineContext) -> (JobOutcome, String) {
        let (deleted, uploaded, total, upload_eta) = ctx
            .report
            .as_ref()
            .map(|r| {
                (
                    r.deleted_count,
                    r.uploaded_count,
                    r.total_file_count,
                    r.upload_eta_seconds,
                )
            })
            .unwrap_or_default();

        let outcome = JobOutcome {
            deleted_count: deleted,
            uploaded_count: uploaded,
            total_tiles: total,
            elapsed_seconds: ctx.started.elapsed().as_secs(),
            upload_eta_seconds: upload_eta,
            tile_url: self.publisher.layout().tile_url_template(&ctx.site),
        };
        let message = format!(
            "Done. {} tiles uploaded ({} old objects replaced).",
            uploaded, deleted
        );
        (outcome, message)
    }
}
