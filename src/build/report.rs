use crate::build::error::BuildError;
use crate::build::job::BuildJob;
use std::path::{Path, PathBuf};

/// How one job ended
#[derive(Debug)]
pub enum JobOutcome {
    /// Destination already existed and overwrite was off
    Skipped,
    Succeeded { count: u64 },
    /// The partial index has been removed
    Failed { error: BuildError },
}

#[derive(Debug)]
pub struct JobReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub outcome: JobOutcome,
}

impl JobReport {
    pub fn new(job: &BuildJob, outcome: JobOutcome) -> Self {
        Self {
            source: job.source().to_path_buf(),
            destination: job.destination().to_path_buf(),
            outcome,
        }
    }

    pub fn count(&self) -> Option<u64> {
        match self.outcome {
            JobOutcome::Succeeded { count } => Some(count),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&BuildError> {
        match &self.outcome {
            JobOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Outcomes of every job of a run, in the order they ran
#[derive(Debug, Default)]
pub struct BatchReport {
    pub jobs: Vec<JobReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.tally(|o| matches!(o, JobOutcome::Succeeded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.tally(|o| matches!(o, JobOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.tally(|o| matches!(o, JobOutcome::Failed { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn tally(&self, pred: impl Fn(&JobOutcome) -> bool) -> usize {
        self.jobs.iter().filter(|j| pred(&j.outcome)).count()
    }
}

/// Receives progress and outcome notifications during a build.
/// Every method defaults to doing nothing.
pub trait BuildObserver {
    /// Source opened and store created; `total` counts null records too
    fn job_started(&mut self, _job: &BuildJob, _total: usize) {}

    /// Emitted every [`PROGRESS_INTERVAL`](crate::build::PROGRESS_INTERVAL) insertions
    fn progress(&mut self, _job: &BuildJob, _inserted: usize, _total: usize) {}

    fn job_finished(&mut self, _report: &JobReport) {}

    /// `position` is 1-based
    fn batch_file_started(&mut self, _position: usize, _total: usize, _source: &Path) {}

    fn batch_file_finished(&mut self, _position: usize, _total: usize, _source: &Path) {}

    fn batch_finished(&mut self, _report: &BatchReport) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl BuildObserver for SilentObserver {}
