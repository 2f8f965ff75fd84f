//! refmt formats files in place by handing each one to an external formatter
//! picked by its extension.
//!
//! The pieces, leaves first:
//! - [`formatter::FormatterRegistry`] maps an extension to a [`formatter::Formatter`]
//! - [`job::Job`] runs one file through existence/emptiness checks, dispatch and write-back
//! - [`scheduler::Scheduler`] runs jobs in bounded batches and folds their outcomes
//!   into a [`scheduler::RunStatus`]

pub mod config;
pub mod context;
pub mod exit_codes;
pub mod formatter;
pub mod job;
pub mod output;
pub mod paths;
pub mod scheduler;
pub mod settings;

pub use config::{Config, ConfigError, MissingFilePolicy};
pub use context::RunContext;
pub use formatter::{Formatter, FormatterRegistry};
pub use job::{FailReason, Job, JobReport, Outcome, SkipReason};
pub use output::DiagnosticWriter;
pub use scheduler::{RunResult, RunStatus, RunSummary, Scheduler, SchedulerError};
pub use settings::ProjectSettings;
