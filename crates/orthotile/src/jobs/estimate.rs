//! Time and progress estimates for tile jobs.
//!
//! Tiling dominates a job's runtime and the tiling tool reports nothing
//! useful while it runs, so progress during tiling is interpolated from
//! elapsed time against an up-front estimate based on input size.

use chrono::{DateTime, Utc};

/// Fixed progress checkpoints, in percent.
pub mod checkpoint {
    pub const QUEUED: u8 = 0;
    pub const ALIGNING: u8 = 2;
    pub const BLENDING: u8 = 5;
    pub const TILING: u8 = 10;
    pub const UPLOADING: u8 = 70;
    pub const OLD_TILES_DELETED: u8 = 80;
    pub const COMPLETE: u8 = 100;
}

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Fifteen minutes of processing per GiB of input.
const SECONDS_PER_GIB: f64 = 900.0;

/// Inputs smaller than this many GiB are estimated as if they were this size.
const MIN_ESTIMATE_GIB: f64 = 0.1;

pub const MIN_ESTIMATE_SECS: u64 = 120;
pub const MAX_ESTIMATE_SECS: u64 = 3600;

/// Initial whole-job estimate from the primary raster's size.
pub fn estimate_initial_seconds(input_bytes: u64) -> u64 {
    let gib = (input_bytes as f64 / BYTES_PER_GIB).max(MIN_ESTIMATE_GIB);
    let seconds = (gib * SECONDS_PER_GIB).round() as u64;
    seconds.clamp(MIN_ESTIMATE_SECS, MAX_ESTIMATE_SECS)
}

/// Seconds between `started_at` and `now`, never negative.
pub fn elapsed_seconds(started_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - started_at).num_milliseconds().max(0);
    millis as f64 / 1000.0
}

/// Remaining seconds of the initial estimate, floored at zero.
pub fn live_eta_seconds(started_at: DateTime<Utc>, estimate_secs: u64, now: DateTime<Utc>) -> u64 {
    let remaining = estimate_secs as f64 - elapsed_seconds(started_at, now);
    remaining.max(0.0).round() as u64
}

/// Interpolated percent while tiling: moves from 10 towards 70 as the
/// estimate runs out, and holds at 70 once it has.
pub fn live_tiling_progress(elapsed_secs: f64, estimate_secs: u64) -> u8 {
    let elapsed = elapsed_secs.max(0.0);
    let remaining = (estimate_secs as f64 - elapsed).max(0.0);
    let total = elapsed + remaining;
    if total <= 0.0 {
        return checkpoint::TILING;
    }

    let span = f64::from(checkpoint::UPLOADING - checkpoint::TILING);
    let pct = f64::from(checkpoint::TILING) + span * elapsed / total;
    (pct.floor() as u8).min(checkpoint::UPLOADING)
}

/// Human-readable duration: `45s`, `2m 05s`, `1h 02m 05s`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
