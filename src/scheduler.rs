/// Concurrent job scheduling for refmt
///
/// Jobs run in fixed-size batches on a dedicated rayon pool with exactly
/// `jobs` threads. A batch is admitted only after every job of the previous
/// batch has reported, and a failing (or panicking) job never stops its
/// siblings.
use crate::context::RunContext;
use crate::formatter::FormatterRegistry;
use crate::job::{FailReason, Job, JobReport, Outcome};
use crate::output::DiagnosticWriter;
use rayon::prelude::*;
use std::any::Any;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

/// Aggregate status of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunStatus {
    #[default]
    Success,
    Failure,
}

impl RunStatus {
    /// Fold one outcome into the status. Only failures count.
    pub fn record(&mut self, outcome: &Outcome) {
        if outcome.is_failure() {
            *self = RunStatus::Failure;
        }
    }

    pub fn from_reports(reports: &[JobReport]) -> Self {
        reports.iter().fold(RunStatus::Success, |mut status, report| {
            status.record(&report.outcome);
            status
        })
    }

    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => crate::exit_codes::SUCCESS,
            RunStatus::Failure => crate::exit_codes::FAILURE,
        }
    }
}

/// Outcome counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub formatted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[JobReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            match report.outcome {
                Outcome::Formatted => summary.formatted += 1,
                Outcome::Skipped(_) => summary.skipped += 1,
                Outcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Everything a finished run produced, reports in input order.
#[derive(Debug)]
pub struct RunResult {
    pub status: RunStatus,
    pub summary: RunSummary,
    pub reports: Vec<JobReport>,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("No files given")]
    NoInputFiles,

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Runs one [`Job`] per input path, at most `jobs` at a time.
pub struct Scheduler<'a> {
    context: &'a RunContext,
    registry: &'a FormatterRegistry,
    writer: &'a DiagnosticWriter,
    jobs: usize,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        context: &'a RunContext,
        registry: &'a FormatterRegistry,
        writer: &'a DiagnosticWriter,
        jobs: NonZeroUsize,
    ) -> Self {
        Self {
            context,
            registry,
            writer,
            jobs: jobs.get(),
        }
    }

    /// Worker limit used when none is configured: the logical CPU count.
    pub fn default_jobs() -> NonZeroUsize {
        thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Format every path and wait for all of them.
    pub fn run(&self, paths: &[PathBuf]) -> Result<RunResult, SchedulerError> {
        if paths.is_empty() {
            return Err(SchedulerError::NoInputFiles);
        }

        let mut seen = HashSet::with_capacity(paths.len());
        for path in paths {
            if !seen.insert(path) {
                log::warn!("{} was given more than once", path.display());
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("refmt-worker-{i}"))
            .build()?;

        let start = Instant::now();
        let mut reports = Vec::with_capacity(paths.len());
        for (index, batch) in paths.chunks(self.jobs).enumerate() {
            log::debug!("[refmt-scheduler] Starting batch {} ({} files)", index + 1, batch.len());
            let batch_reports: Vec<JobReport> =
                pool.install(|| batch.par_iter().map(|path| self.run_job(path)).collect());
            reports.extend(batch_reports);
        }

        let status = RunStatus::from_reports(&reports);
        let summary = RunSummary::from_reports(&reports);
        log::debug!(
            "[refmt-scheduler] {} files in {:?} with {} workers",
            paths.len(),
            start.elapsed(),
            self.jobs
        );

        Ok(RunResult {
            status,
            summary,
            reports,
        })
    }

    fn run_job(&self, path: &Path) -> JobReport {
        let job = Job::new(path, self.context);
        let display_path = job.display_path().to_string();

        let report = panic::catch_unwind(AssertUnwindSafe(|| job.run(self.context, self.registry)))
            .unwrap_or_else(|payload| JobReport {
                path: path.to_path_buf(),
                display_path,
                outcome: Outcome::Failed(FailReason::Formatter(format!(
                    "internal error: {}",
                    panic_message(payload.as_ref())
                ))),
                diagnostics: String::new(),
            });

        if let Err(e) = self.writer.report(&report) {
            log::warn!("Failed to write diagnostics for {}: {e}", report.display_path);
        }
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "job panicked"
    }
}
