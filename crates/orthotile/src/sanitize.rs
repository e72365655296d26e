//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Work directories live under temp paths that embed upload names, and
//! store prefixes can carry bucket layout. Spans only ever see the parts
//! needed to correlate a job.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Returns the last segment of an object key prefix.
///
/// - `tiles/gruyere` → `…/gruyere`
/// - `gruyere` → `gruyere`
pub fn redact_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((_, last)) => format!("…/{}", last),
        None => trimmed.to_string(),
    }
}
