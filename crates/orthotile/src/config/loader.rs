use std::path::Path;

use crate::config::schema::{Config, CONFIG_VERSION, MAX_ZOOM};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Environment variables that override the matching config fields.
pub const ENV_BUCKET: &str = "S3_BUCKET";
pub const ENV_PREFIX: &str = "S3_PREFIX";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_CDN_DOMAIN: &str = "CLOUDFRONT_DOMAIN";
pub const ENV_WORK_DIR: &str = "TILE_WORK_DIR";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads the file when given, otherwise starts from defaults, then applies
/// environment overrides and re-checks the result.
pub fn load_effective_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    validate_config(&config)?;
    Ok(config)
}

impl Config {
    /// Applies `S3_BUCKET`, `S3_PREFIX`, `AWS_REGION`, `CLOUDFRONT_DOMAIN`
    /// and `TILE_WORK_DIR` when they are set to non-empty values.
    pub fn apply_env_overrides(&mut self) {
        let lookup = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(bucket) = lookup(ENV_BUCKET) {
            self.storage.bucket = bucket;
        }
        if let Some(prefix) = lookup(ENV_PREFIX) {
            self.storage.prefix = prefix;
        }
        if let Some(region) = lookup(ENV_REGION) {
            self.storage.region = region;
        }
        if let Some(domain) = lookup(ENV_CDN_DOMAIN) {
            self.cdn.domain = domain;
        }
        if let Some(dir) = lookup(ENV_WORK_DIR) {
            self.work_directory = dir;
        }
    }
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.sites.is_empty() {
        return Err(ConfigError::Validation {
            message: "At least one site must be configured".to_string(),
        });
    }

    let tools = &config.tools;
    if tools.zoom_min > tools.zoom_max || tools.zoom_max > MAX_ZOOM {
        return Err(ConfigError::Validation {
            message: format!(
                "Invalid zoom range {}-{} (must be ordered and at most {})",
                tools.zoom_min, tools.zoom_max, MAX_ZOOM
            ),
        });
    }

    for (name, secs) in [
        ("tilingTimeoutSecs", tools.tiling_timeout_secs),
        ("calcTimeoutSecs", tools.calc_timeout_secs),
        ("alignTimeoutSecs", tools.align_timeout_secs),
    ] {
        if secs == 0 {
            return Err(ConfigError::Validation {
                message: format!("{} must be greater than zero", name),
            });
        }
    }

    if tools.processes == 0 || config.upload_concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "processes and uploadConcurrency must be at least 1".to_string(),
        });
    }

    Ok(())
}
