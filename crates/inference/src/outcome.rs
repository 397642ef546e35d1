//! Per-species outcomes and the run summary.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use batchscore_core::{CorrelationId, ValueObject};

use crate::error::{EntityError, InferenceError};
use crate::job::{BatchJob, BatchJobStatus};
use crate::waiter::WaitReport;

/// How one species ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OutcomeKind {
    /// A prediction column was added to the output table.
    Succeeded { column: String },
    FailedSubmission { reason: String },
    /// Failed or canceled remotely, or its status could not be read.
    FailedExecution { reason: String },
    TimedOut { waited_secs: u64 },
    /// The job succeeded but its output could not be used.
    FailedOutput { reason: String },
}

impl OutcomeKind {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::FailedSubmission { .. } => "failed_submission",
            Self::FailedExecution { .. } => "failed_execution",
            Self::TimedOut { .. } => "timed_out",
            Self::FailedOutput { .. } => "failed_output",
        }
    }

    pub fn from_error(error: &EntityError) -> Self {
        let reason = error.to_string();
        match error {
            EntityError::Submission(_) => Self::FailedSubmission { reason },
            EntityError::RemoteExecution(_) => Self::FailedExecution { reason },
            EntityError::TimeoutExceeded { waited_secs } => Self::TimedOut {
                waited_secs: *waited_secs,
            },
            EntityError::Download(_) | EntityError::OutputParse(_) => {
                Self::FailedOutput { reason }
            }
        }
    }

    /// Outcome of a job that never reached assembly.
    ///
    /// `None` for a succeeded job (its outcome depends on assembly) or one
    /// that is still pending.
    pub fn from_unsuccessful(status: &BatchJobStatus) -> Option<Self> {
        match status {
            BatchJobStatus::Failed { error } => Some(Self::from_error(error)),
            BatchJobStatus::Canceled => Some(Self::FailedExecution {
                reason: "canceled on the platform".to_string(),
            }),
            BatchJobStatus::TimedOut { waited } => {
                Some(Self::from_error(&EntityError::TimeoutExceeded {
                    waited_secs: waited.as_secs(),
                }))
            }
            BatchJobStatus::Submitted
            | BatchJobStatus::Running
            | BatchJobStatus::Succeeded { .. } => None,
        }
    }
}

/// Outcome of one species, with the identifiers needed to trace it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityOutcome {
    pub species: String,
    pub endpoint: String,
    pub job: Option<String>,
    #[serde(flatten)]
    pub kind: OutcomeKind,
}

impl EntityOutcome {
    pub fn for_job(job: &BatchJob, kind: OutcomeKind) -> Self {
        Self {
            species: job.entity.name().to_string(),
            endpoint: job.endpoint.as_str().to_string(),
            job: job.handle.as_ref().map(|h| h.as_str().to_string()),
            kind,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind.is_success()
    }
}

/// Number of species per outcome kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub failed_submission: usize,
    pub failed_execution: usize,
    pub timed_out: usize,
    pub failed_output: usize,
}

impl OutcomeCounts {
    pub fn tally<'a>(outcomes: impl IntoIterator<Item = &'a EntityOutcome>) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            match outcome.kind {
                OutcomeKind::Succeeded { .. } => counts.succeeded += 1,
                OutcomeKind::FailedSubmission { .. } => counts.failed_submission += 1,
                OutcomeKind::FailedExecution { .. } => counts.failed_execution += 1,
                OutcomeKind::TimedOut { .. } => counts.timed_out += 1,
                OutcomeKind::FailedOutput { .. } => counts.failed_output += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.succeeded
            + self.failed_submission
            + self.failed_execution
            + self.timed_out
            + self.failed_output
    }
}

/// What a run did, species by species.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub correlation_id: CorrelationId,
    pub site: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counts: OutcomeCounts,
    /// In species-list order.
    pub outcomes: Vec<EntityOutcome>,
    /// Polling rounds and terminal states seen while waiting on the jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<WaitReport>,
}

impl RunSummary {
    pub fn new(
        correlation_id: CorrelationId,
        site: impl Into<String>,
        started_at: DateTime<Utc>,
        outcomes: Vec<EntityOutcome>,
    ) -> Self {
        Self {
            correlation_id,
            site: site.into(),
            started_at,
            finished_at: Utc::now(),
            counts: OutcomeCounts::tally(&outcomes),
            outcomes,
            wait: None,
        }
    }

    pub fn with_wait(mut self, report: WaitReport) -> Self {
        self.wait = Some(report);
        self
    }

    pub fn succeeded(&self) -> usize {
        self.counts.succeeded
    }

    /// One line per species, then the totals.
    pub fn log(&self) {
        for outcome in &self.outcomes {
            let job = outcome.job.as_deref().unwrap_or("-");
            match &outcome.kind {
                OutcomeKind::Succeeded { column } => info!(
                    species = %outcome.species,
                    endpoint = %outcome.endpoint,
                    job,
                    column = %column,
                    "species succeeded"
                ),
                kind => warn!(
                    species = %outcome.species,
                    endpoint = %outcome.endpoint,
                    job,
                    outcome = kind.label(),
                    detail = ?kind,
                    "species did not produce predictions"
                ),
            }
        }

        let duration_ms = (self.finished_at - self.started_at).num_milliseconds();
        info!(
            correlation_id = %self.correlation_id,
            total = self.counts.total(),
            succeeded = self.counts.succeeded,
            failed_submission = self.counts.failed_submission,
            failed_execution = self.counts.failed_execution,
            timed_out = self.counts.timed_out,
            failed_output = self.counts.failed_output,
            duration_ms,
            wait_rounds = self.wait.as_ref().map(|w| w.rounds),
            "inference run summary"
        );
    }

    pub fn write_json(&self, path: &Path) -> Result<(), InferenceError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| InferenceError::io(parent, e))?;
        }
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| InferenceError::io(path, std::io::Error::other(e)))?;
        fs::write(path, json).map_err(|e| InferenceError::io(path, e))
    }
}
