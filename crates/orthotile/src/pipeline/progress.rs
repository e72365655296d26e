use crate::jobs::{checkpoint, JobHandle};
use crate::publish::ReplaceObserver;

/// Feeds replace progress into the job record.
pub struct UploadProgress<'a> {
    job: &'a JobHandle,
}

impl<'a> UploadProgress<'a> {
    pub fn new(job: &'a JobHandle) -> Self {
        Self { job }
    }
}

impl ReplaceObserver for UploadProgress<'_> {
    fn deleted(&self, count: usize) {
        self.job.set_progress(checkpoint::OLD_TILES_DELETED);
        self.job.set_message(format!(
            "Removed {} old objects, uploading tiles...",
            count
        ));
    }

    fn uploaded(&self, done: usize, total: usize) {
        // Throttled to every 100th file.
        if done == total || done % 100 == 0 {
            self.job
                .set_message(format!("Uploading tiles ({}/{})...", done, total));
        }
    }
}
