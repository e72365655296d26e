pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod pipeline;
pub mod publish;
pub mod raster;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod tools;

pub use config::{load_config, load_effective_config, Config};
pub use error::{ConfigError, OrthotileError, Result, ServiceError, ValidationError};
pub use jobs::{JobHandle, JobRegistry, JobSnapshot, JobStatus};
pub use logging::{init_logging, LogFormat};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext, PipelineError};
pub use publish::{create_remote_store, Publisher, RemoteLayout, RemoteStore, RemoteStoreError};
pub use secrets::{SecretError, SecretSource};
pub use service::{RasterUpload, SubmitRequest, TileService};
pub use tools::{ProcessRunner, ToolError, ToolRunner};
