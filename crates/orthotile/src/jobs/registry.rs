//! In-memory job registry.
//!
//! The registry maps job ids to records. Each record sits behind its own
//! lock so a poll only contends with the one job it reads. The pipeline
//! task owns the job's [`JobHandle`] and is the only writer; pollers take
//! snapshots.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::estimate::{checkpoint, estimate_initial_seconds};
use super::record::{JobOutcome, JobRecord, JobSnapshot, JobStatus};

const JOB_ID_LEN: usize = 8;

fn read_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(g) => g,
        Err(poisoned) => {
            log::warn!("{} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

fn write_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(g) => g,
        Err(poisoned) => {
            log::warn!("{} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

/// Parameters of a newly submitted job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub site: String,
    pub input_bytes: u64,
    /// `Some` only when a hillshade raster was supplied.
    pub hillshade_opacity: Option<f64>,
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Arc<RwLock<JobRecord>>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a `queued` record and returns the handle that writes to it.
    pub fn create(&self, job: NewJob) -> JobHandle {
        let created_at = Utc::now();
        let mut jobs = write_lock(&self.jobs, "Job registry");

        let job_id = loop {
            let candidate: String = Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(JOB_ID_LEN)
                .collect();
            if !jobs.contains_key(&candidate) {
                break candidate;
            }
            log::debug!("Job id {} already taken, regenerating", candidate);
        };

        let record = JobRecord {
            job_id: job_id.clone(),
            status: JobStatus::Queued,
            message: "Upload received, starting tile generation...".to_string(),
            site: job.site,
            created_at,
            input_bytes: job.input_bytes,
            hillshade_used: job.hillshade_opacity.is_some(),
            hillshade_opacity: job.hillshade_opacity,
            progress_pct: checkpoint::QUEUED,
            estimated_seconds: estimate_initial_seconds(job.input_bytes),
            outcome: None,
            history: vec![JobStatus::Queued],
        };

        let record = Arc::new(RwLock::new(record));
        jobs.insert(job_id.clone(), Arc::clone(&record));

        JobHandle { job_id, record }
    }

    fn record(&self, job_id: &str) -> Option<Arc<RwLock<JobRecord>>> {
        read_lock(&self.jobs, "Job registry").get(job_id).cloned()
    }

    pub fn snapshot(&self, job_id: &str) -> Option<JobSnapshot> {
        self.snapshot_at(job_id, Utc::now())
    }

    /// Snapshot as of `now`. Reads only.
    pub fn snapshot_at(&self, job_id: &str, now: DateTime<Utc>) -> Option<JobSnapshot> {
        let record = self.record(job_id)?;
        let guard = read_lock(&record, "Job record");
        Some(guard.snapshot_at(now))
    }

    /// Raw stored record, without live estimates applied.
    pub fn stored(&self, job_id: &str) -> Option<JobRecord> {
        let record = self.record(job_id)?;
        let guard = read_lock(&record, "Job record");
        Some(guard.clone())
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        let now = Utc::now();
        let records: Vec<_> = read_lock(&self.jobs, "Job registry")
            .values()
            .cloned()
            .collect();

        let mut snapshots: Vec<JobSnapshot> = records
            .iter()
            .map(|r| read_lock(r, "Job record").snapshot_at(now))
            .collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots
    }

    pub fn len(&self) -> usize {
        read_lock(&self.jobs, "Job registry").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write access to one job's record.
///
/// Status changes that would move backwards, or leave a terminal state,
/// are ignored with a warning. Progress only ever increases.
#[derive(Clone)]
pub struct JobHandle {
    job_id: String,
    record: Arc<RwLock<JobRecord>>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn status(&self) -> JobStatus {
        read_lock(&self.record, "Job record").status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        read_lock(&self.record, "Job record").created_at
    }

    /// Moves to `status`, raising progress to at least `progress_pct`.
    /// Returns false when the move was rejected.
    pub fn advance(&self, status: JobStatus, progress_pct: u8, message: impl Into<String>) -> bool {
        let mut rec = write_lock(&self.record, "Job record");
        if !rec.status.can_advance_to(status) {
            log::warn!(
                "Job {}: ignoring status change {} -> {}",
                self.job_id,
                rec.status,
                status
            );
            return false;
        }
        rec.status = status;
        rec.history.push(status);
        rec.progress_pct = rec.progress_pct.max(progress_pct.min(checkpoint::COMPLETE));
        rec.message = message.into();
        true
    }

    pub fn set_progress(&self, progress_pct: u8) {
        let mut rec = write_lock(&self.record, "Job record");
        if rec.status.is_terminal() {
            return;
        }
        rec.progress_pct = rec.progress_pct.max(progress_pct.min(checkpoint::COMPLETE));
    }

    pub fn set_message(&self, message: impl Into<String>) {
        let mut rec = write_lock(&self.record, "Job record");
        if rec.status.is_terminal() {
            return;
        }
        rec.message = message.into();
    }

    pub fn complete(&self, outcome: JobOutcome, message: impl Into<String>) {
        let mut rec = write_lock(&self.record, "Job record");
        if !rec.status.can_advance_to(JobStatus::Complete) {
            log::warn!("Job {}: already {}, not completing", self.job_id, rec.status);
            return;
        }
        rec.status = JobStatus::Complete;
        rec.history.push(JobStatus::Complete);
        rec.progress_pct = checkpoint::COMPLETE;
        rec.message = message.into();
        rec.outcome = Some(outcome);
    }

    /// Records a failure. Progress stays where the job got to.
    pub fn fail(&self, message: impl Into<String>) {
        let mut rec = write_lock(&self.record, "Job record");
        if rec.status.is_terminal() {
            log::warn!("Job {}: already {}, not failing", self.job_id, rec.status);
            return;
        }
        rec.status = JobStatus::Error;
        rec.history.push(JobStatus::Error);
        rec.message = message.into();
    }
}
