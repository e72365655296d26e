use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::estimate::{elapsed_seconds, format_duration, live_eta_seconds, live_tiling_progress};

/// Stage of a tile job.
///
/// Jobs only move forward through this list; `Error` can be entered from
/// any non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Aligning,
    Blending,
    Tiling,
    Uploading,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Aligning => 1,
            JobStatus::Blending => 2,
            JobStatus::Tiling => 3,
            JobStatus::Uploading => 4,
            JobStatus::Complete => 5,
            JobStatus::Error => 6,
        }
    }

    /// Whether moving from `self` to `next` keeps the status path monotonic.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == JobStatus::Error || next.rank() > self.rank()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Aligning => write!(f, "aligning"),
            JobStatus::Blending => write!(f, "blending"),
            JobStatus::Tiling => write!(f, "tiling"),
            JobStatus::Uploading => write!(f, "uploading"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// Results recorded when a job completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub deleted_count: usize,
    pub uploaded_count: usize,
    pub total_tiles: usize,
    pub elapsed_seconds: u64,
    pub upload_eta_seconds: u64,
    /// XYZ template, e.g. `https://cdn.example.com/tiles/gruyere/{z}/{x}/{y}.png`.
    pub tile_url: String,
}

/// Stored state of one job. Only the job's [`JobHandle`](super::JobHandle)
/// writes to it.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    pub site: String,
    pub created_at: DateTime<Utc>,
    pub input_bytes: u64,
    pub hillshade_used: bool,
    pub hillshade_opacity: Option<f64>,
    pub progress_pct: u8,
    pub estimated_seconds: u64,
    pub outcome: Option<JobOutcome>,
    /// Every status the job has been in, in order.
    pub history: Vec<JobStatus>,
}

/// What a poller sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    pub site: String,
    pub created_at: DateTime<Utc>,
    pub input_bytes: u64,
    pub hillshade_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hillshade_opacity: Option<f64>,
    pub progress_pct: u8,
    pub eta_seconds: u64,
    #[serde(flatten)]
    pub outcome: Option<JobOutcome>,
}

impl JobRecord {
    /// Derives the polled view at `now` without touching stored state.
    ///
    /// While tiling, progress is interpolated from elapsed time and never
    /// reported below the stored value. Non-terminal messages carry the
    /// remaining-time text.
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> JobSnapshot {
        let terminal = self.status.is_terminal();

        let progress_pct = if self.status == JobStatus::Tiling {
            let elapsed = elapsed_seconds(self.created_at, now);
            self.progress_pct
                .max(live_tiling_progress(elapsed, self.estimated_seconds))
        } else {
            self.progress_pct
        };

        let eta_seconds = if terminal {
            0
        } else {
            live_eta_seconds(self.created_at, self.estimated_seconds, now)
        };

        let message = if terminal {
            self.message.clone()
        } else if eta_seconds > 0 {
            format!(
                "{} (~{} remaining)",
                self.message,
                format_duration(eta_seconds)
            )
        } else {
            format!("{} (taking longer than estimated)", self.message)
        };

        JobSnapshot {
            job_id: self.job_id.clone(),
            status: self.status,
            message,
            site: self.site.clone(),
            created_at: self.created_at,
            input_bytes: self.input_bytes,
            hillshade_used: self.hillshade_used,
            hillshade_opacity: self.hillshade_opacity,
            progress_pct,
            eta_seconds,
            outcome: self.outcome.clone(),
        }
    }
}
