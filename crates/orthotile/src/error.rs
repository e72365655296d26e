use std::path::PathBuf;
use thiserror::Error;

use crate::publish::RemoteStoreError;
use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum OrthotileError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid submission: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("Remote store error: {0}")]
    RemoteStore(#[from] RemoteStoreError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to resolve secret: {0}")]
    Secret(#[from] SecretError),
}

/// Rejections raised before a job is created.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid site '{site}'. Must be one of: {allowed}")]
    UnknownSite { site: String, allowed: String },

    #[error("Invalid overlay category '{category}'. Must be one of: {allowed}")]
    UnknownOverlayCategory { category: String, allowed: String },

    #[error("Blend opacity must be between 0 and 1, got {0}")]
    InvalidOpacity(f64),

    #[error("File '{file_name}' must be {expected}")]
    InvalidExtension {
        file_name: String,
        expected: &'static str,
    },

    #[error("No file provided at '{0}'")]
    MissingFile(PathBuf),

    #[error("Failed to stage upload into '{path}': {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Job not found: {0}")]
    UnknownJob(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Overlay upload failed: {0}")]
    RemoteStore(#[from] RemoteStoreError),
}

pub type Result<T> = std::result::Result<T, OrthotileError>;
