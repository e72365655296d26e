//! Storage credential resolution.
//!
//! A credential in the config can be given three ways, checked in order:
//!
//! 1. `value`: inline, for local runs against a dev bucket
//! 2. `file`: a mounted secret file (`/run/secrets/aws_secret_access_key`)
//! 3. `envVar`: the name of an environment variable to read
//!
//! Missing credentials are not an error here. The S3 builder falls back to
//! its own environment and instance-profile lookup when none are configured.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Failed to read secret from file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where a single credential comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

impl SecretSource {
    pub fn from_env_var(name: impl Into<String>) -> Self {
        Self {
            env_var: Some(name.into()),
            ..Default::default()
        }
    }

    /// True when any of the three sources is set to a non-empty string.
    pub fn is_configured(&self) -> bool {
        [&self.value, &self.file, &self.env_var]
            .into_iter()
            .any(|s| s.as_deref().is_some_and(|s| !s.is_empty()))
    }

    /// Resolves the credential. `Ok(None)` means nothing was configured.
    pub fn resolve(&self) -> Result<Option<SecretString>> {
        if let Some(value) = non_empty(&self.value) {
            return Ok(Some(SecretString::from(value.to_string())));
        }

        if let Some(path) = non_empty(&self.file) {
            let expanded = expand_home(path);
            return std::fs::read_to_string(&expanded)
                .map(|content| Some(SecretString::from(content.trim().to_string())))
                .map_err(|source| SecretError::FileRead {
                    path: expanded,
                    source,
                });
        }

        if let Some(name) = non_empty(&self.env_var) {
            return match std::env::var(name) {
                Ok(value) => Ok(Some(SecretString::from(value.trim().to_string()))),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Ok(None)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Expands a leading `~` to the current user's home directory.
///
/// `~user/path` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
