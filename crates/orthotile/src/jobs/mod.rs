//! Job records, the registry that holds them, and progress estimates.

pub mod estimate;
pub mod record;
pub mod registry;

pub use estimate::{
    checkpoint, estimate_initial_seconds, format_duration, live_eta_seconds, live_tiling_progress,
};
pub use record::{JobOutcome, JobRecord, JobSnapshot, JobStatus};
pub use registry::{JobHandle, JobRegistry, NewJob};
