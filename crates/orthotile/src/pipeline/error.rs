use thiserror::Error;

use crate::publish::PublishError;
use crate::raster::AlignmentError;
use crate::tools::ToolError;

/// Stage failure. The `Display` text becomes the job's message.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Hillshade alignment failed: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("Hillshade blend failed: {0}")]
    Blend(ToolError),

    #[error("Hillshade blend timed out after {seconds}s")]
    BlendTimeout { seconds: u64 },

    #[error("Tile generation failed: {0}")]
    Tiling(ToolError),

    #[error("Tile generation timed out after {seconds}s")]
    TilingTimeout { seconds: u64 },

    #[error("Tile upload failed: {0}")]
    Publish(#[from] PublishError),
}

impl PipelineError {
    pub fn blend(err: ToolError) -> Self {
        match err {
            ToolError::Timeout { seconds, .. } => PipelineError::BlendTimeout { seconds },
            other => PipelineError::Blend(other),
        }
    }

    pub fn tiling(err: ToolError) -> Self {
        match err {
            ToolError::Timeout { seconds, .. } => PipelineError::TilingTimeout { seconds },
            other => PipelineError::Tiling(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiling_failure_message_carries_stderr() {
        let err = PipelineError::tiling(ToolError::Failed {
            tool: "gdal2tiles.py".to_string(),
            code: 1,
            stderr: "disk full".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Tile generation failed: gdal2tiles.py exited with code 1: disk full"
        );
    }

    #[test]
    fn test_timeouts_are_distinct() {
        let tiling = PipelineError::tiling(ToolError::Timeout {
            tool: "gdal2tiles.py".to_string(),
            seconds: 3600,
        });
        assert!(matches!(tiling, PipelineError::TilingTimeout { seconds: 3600 }));
        assert_eq!(tiling.to_string(), "Tile generation timed out after 3600s");

        let blend = PipelineError::blend(ToolError::Timeout {
            tool: "gdal_calc.py".to_string(),
            seconds: 1800,
        });
        assert!(matches!(blend, PipelineError::BlendTimeout { seconds: 1800 }));
    }
}
