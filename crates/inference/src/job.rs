//! Batch job records and their lifecycle.

use std::time::Duration;

use chrono::{DateTime, Utc};

use batchscore_core::{EndpointName, Entity, JobHandle};
use batchscore_platform::{OutputReference, RemoteStatus};

use crate::error::EntityError;

/// Local view of a job's lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchJobStatus {
    /// Accepted by the platform, not reported running yet.
    Submitted,
    Running,
    /// Finished remotely; the output location is known.
    Succeeded { output: OutputReference },
    Failed { error: EntityError },
    /// Canceled on the platform side.
    Canceled,
    /// Still pending when the wait budget ran out.
    TimedOut { waited: Duration },
}

impl BatchJobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Submitted | Self::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Canceled => "canceled",
            Self::TimedOut { .. } => "timed_out",
        }
    }
}

/// One species' scoring job.
///
/// Created by the dispatcher and advanced only by the completion waiter.
/// Once terminal, every `mark_*` call is a no-op returning `false`.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub entity: Entity,
    pub endpoint: EndpointName,
    /// Absent when the submission was rejected.
    pub handle: Option<JobHandle>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: BatchJobStatus,
    /// Last status reported by the platform.
    pub remote_status: Option<RemoteStatus>,
    /// Successful status queries.
    pub polls: u32,
    pub consecutive_status_errors: u32,
}

impl BatchJob {
    /// A job the platform accepted.
    pub fn submitted(entity: Entity, endpoint: EndpointName, handle: JobHandle) -> Self {
        let now = Utc::now();
        Self {
            entity,
            endpoint,
            handle: Some(handle),
            submitted_at: now,
            updated_at: now,
            status: BatchJobStatus::Submitted,
            remote_status: None,
            polls: 0,
            consecutive_status_errors: 0,
        }
    }

    /// A job whose submission failed; terminal from the start.
    pub fn rejected(entity: Entity, endpoint: EndpointName, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entity,
            endpoint,
            handle: None,
            submitted_at: now,
            updated_at: now,
            status: BatchJobStatus::Failed {
                error: EntityError::Submission(reason.into()),
            },
            remote_status: None,
            polls: 0,
            consecutive_status_errors: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    /// Handle as text for log fields.
    pub fn handle_label(&self) -> &str {
        self.handle.as_ref().map_or("-", JobHandle::as_str)
    }

    /// Output location of a succeeded job.
    pub fn output(&self) -> Option<&OutputReference> {
        match &self.status {
            BatchJobStatus::Succeeded { output } => Some(output),
            _ => None,
        }
    }

    fn transition(&mut self, status: BatchJobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = status;
        self.updated_at = Utc::now();
        true
    }

    /// Record a successful status query.
    pub fn record_poll(&mut self, remote: RemoteStatus) {
        if self.is_terminal() {
            return;
        }
        self.remote_status = Some(remote);
        self.polls += 1;
        self.consecutive_status_errors = 0;
    }

    /// Record a failed status query; returns the current error streak.
    pub fn record_status_error(&mut self) -> u32 {
        if self.is_pending() {
            self.consecutive_status_errors += 1;
        }
        self.consecutive_status_errors
    }

    /// `Submitted` → `Running`. Returns `false` if the job was not `Submitted`.
    pub fn mark_running(&mut self) -> bool {
        if self.status != BatchJobStatus::Submitted {
            return false;
        }
        self.transition(BatchJobStatus::Running)
    }

    pub fn mark_succeeded(&mut self, output: OutputReference) -> bool {
        self.transition(BatchJobStatus::Succeeded { output })
    }

    pub fn mark_failed(&mut self, error: EntityError) -> bool {
        self.transition(BatchJobStatus::Failed { error })
    }

    pub fn mark_canceled(&mut self) -> bool {
        self.transition(BatchJobStatus::Canceled)
    }

    pub fn mark_timed_out(&mut self, waited: Duration) -> bool {
        self.transition(BatchJobStatus::TimedOut { waited })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchscore_core::SiteName;

    fn job() -> BatchJob {
        let entity = Entity::new("Abies-lasiocarpa");
        let site = SiteName::parse("cherrypt").unwrap();
        let endpoint = EndpointName::derive(&site, &entity, None);
        BatchJob::submitted(entity, endpoint, JobHandle::new("job-1"))
    }

    #[test]
    fn lifecycle_advances_to_success() {
        let mut job = job();
        assert!(job.is_pending());

        assert!(job.mark_running());
        assert_eq!(job.status, BatchJobStatus::Running);
        assert!(!job.mark_running());

        assert!(job.mark_succeeded(OutputReference::new("memory://out")));
        assert!(job.is_terminal());
        assert_eq!(job.output().unwrap().uri, "memory://out");
    }

    #[test]
    fn terminal_jobs_are_immutable() {
        let mut job = job();
        assert!(job.mark_timed_out(Duration::from_secs(2)));
        let before = job.updated_at;

        assert!(!job.mark_running());
        assert!(!job.mark_succeeded(OutputReference::new("memory://late")));
        assert!(!job.mark_failed(EntityError::RemoteExecution("Failed".into())));
        assert!(!job.mark_canceled());

        assert_eq!(job.status, BatchJobStatus::TimedOut { waited: Duration::from_secs(2) });
        assert_eq!(job.updated_at, before);
        assert!(job.output().is_none());
    }

    #[test]
    fn rejected_job_is_terminal_without_handle() {
        let job = BatchJob::rejected(
            Entity::new("Pinus contorta"),
            EndpointName::derive(
                &SiteName::parse("cherrypt").unwrap(),
                &Entity::new("Pinus contorta"),
                None,
            ),
            "endpoint not found",
        );

        assert!(job.is_terminal());
        assert!(job.handle.is_none());
        assert_eq!(job.handle_label(), "-");
        assert!(matches!(
            job.status,
            BatchJobStatus::Failed { error: EntityError::Submission(_) }
        ));
    }

    #[test]
    fn status_error_streak_resets_on_successful_poll() {
        let mut job = job();
        assert_eq!(job.record_status_error(), 1);
        assert_eq!(job.record_status_error(), 2);

        job.record_poll(RemoteStatus::Running);
        assert_eq!(job.consecutive_status_errors, 0);
        assert_eq!(job.polls, 1);
        assert_eq!(job.remote_status, Some(RemoteStatus::Running));
    }
}
