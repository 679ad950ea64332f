use crate::core::PoolRuntimeSnapshot;
use crate::io::JobCountersSnapshot;

/// Progress of a [`WritePipeline`](super::WritePipeline) at a point in time.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Outcome counts over every queue of the pipeline.
    pub jobs: JobCountersSnapshot,
    /// Jobs accepted but not finished, as reported by the job monitor.
    pub active_jobs: usize,
    /// Number of failed writes recorded so far.
    pub failures: usize,
    pub accepting: bool,
    pub runtime: PoolRuntimeSnapshot,
}

impl PipelineStats {
    /// Jobs that reached a terminal state, written or not.
    pub fn finished_jobs(&self) -> usize {
        self.jobs.completed + self.jobs.failed + self.jobs.discarded
    }
}
