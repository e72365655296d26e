//! The per-job stage sequence: optional hillshade align and blend, tile
//! generation, then the remote replace.

pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;
pub mod workdir;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::PipelineError;
pub use progress::UploadProgress;
pub use runner::Pipeline;
pub use workdir::WorkDir;
