//! Completion waiter: the fan-in barrier between dispatch and assembly.
//!
//! A single time-sliced polling loop over every outstanding job. Each round
//! queries the status of every pending job once, then sleeps for the poll
//! interval (clamped to the remaining wait budget).

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use batchscore_core::ValueObject;
use batchscore_platform::{MlPlatform, RemoteStatus};

use crate::error::EntityError;
use crate::job::{BatchJob, BatchJobStatus};

/// Completion waiter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    /// Global wait budget shared by all jobs.
    pub max_wait: Duration,
    /// Delay between polling rounds.
    pub poll_interval: Duration,
    /// Consecutive failed status queries after which a job is marked failed.
    pub max_status_errors: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(3600),
            poll_interval: Duration::from_secs(10),
            max_status_errors: 5,
        }
    }
}

impl WaitConfig {
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_status_errors(mut self, max: u32) -> Self {
        self.max_status_errors = max;
        self
    }
}

/// What a wait pass observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct WaitReport {
    pub rounds: u32,
    pub elapsed_ms: u64,
    pub succeeded: usize,
    pub failed: usize,
    pub canceled: usize,
    pub timed_out: usize,
}

impl WaitReport {
    fn tally(jobs: &[BatchJob], rounds: u32, elapsed: Duration) -> Self {
        let mut report = Self {
            rounds,
            elapsed_ms: elapsed.as_millis() as u64,
            ..Self::default()
        };
        for job in jobs {
            match job.status {
                BatchJobStatus::Succeeded { .. } => report.succeeded += 1,
                BatchJobStatus::Failed { .. } => report.failed += 1,
                BatchJobStatus::Canceled => report.canceled += 1,
                BatchJobStatus::TimedOut { .. } => report.timed_out += 1,
                BatchJobStatus::Submitted | BatchJobStatus::Running => {}
            }
        }
        report
    }
}

/// Polls jobs until every one is terminal or the wait budget is spent.
pub struct CompletionWaiter<'a, P: MlPlatform + ?Sized> {
    platform: &'a P,
    config: WaitConfig,
}

impl<'a, P: MlPlatform + ?Sized> CompletionWaiter<'a, P> {
    pub fn new(platform: &'a P, config: WaitConfig) -> Self {
        Self { platform, config }
    }

    /// Block until all jobs are terminal or `max_wait` has elapsed.
    ///
    /// Jobs still pending when the budget runs out are marked timed out; no
    /// cancellation is sent to the platform. Returns within `max_wait` plus
    /// one poll interval and one round of status queries.
    pub fn wait_all(&self, jobs: &mut [BatchJob]) -> WaitReport {
        let started = Instant::now();
        let mut rounds = 0;

        loop {
            rounds += 1;
            for job in jobs.iter_mut().filter(|j| j.is_pending()) {
                self.poll_one(job);
            }

            let pending = jobs.iter().filter(|j| j.is_pending()).count();
            if pending == 0 {
                break;
            }

            let elapsed = started.elapsed();
            if elapsed >= self.config.max_wait {
                for job in jobs.iter_mut().filter(|j| j.is_pending()) {
                    warn!(
                        species = %job.entity,
                        endpoint = %job.endpoint,
                        job = job.handle_label(),
                        waited_secs = elapsed.as_secs(),
                        last_status = ?job.remote_status,
                        "job did not finish within the wait budget"
                    );
                    job.mark_timed_out(elapsed);
                }
                break;
            }

            let remaining = self.config.max_wait - elapsed;
            let sleep_for = self.config.poll_interval.min(remaining);
            info!(
                pending,
                round = rounds,
                elapsed_secs = elapsed.as_secs(),
                next_poll_ms = sleep_for.as_millis() as u64,
                "jobs not yet complete, waiting"
            );
            thread::sleep(sleep_for);
        }

        let report = WaitReport::tally(jobs, rounds, started.elapsed());
        info!(
            rounds = report.rounds,
            succeeded = report.succeeded,
            failed = report.failed,
            canceled = report.canceled,
            timed_out = report.timed_out,
            elapsed_ms = report.elapsed_ms,
            "all jobs settled"
        );
        report
    }

    /// Query one pending job and apply the reported status.
    fn poll_one(&self, job: &mut BatchJob) {
        let Some(handle) = job.handle.clone() else {
            return;
        };

        let remote = match self.platform.get_job_status(&handle) {
            Ok(remote) => remote,
            Err(e) => {
                let streak = job.record_status_error();
                warn!(
                    species = %job.entity,
                    endpoint = %job.endpoint,
                    job = %handle,
                    streak,
                    error = %e,
                    "status query failed"
                );
                if streak >= self.config.max_status_errors {
                    job.mark_failed(EntityError::RemoteExecution(format!(
                        "status unavailable after {streak} attempts: {e}"
                    )));
                }
                return;
            }
        };

        job.record_poll(remote);
        debug!(
            species = %job.entity,
            job = %handle,
            status = %remote,
            "polled job status"
        );

        match remote {
            RemoteStatus::Queued => {}
            RemoteStatus::Running => {
                job.mark_running();
            }
            RemoteStatus::Completed => match self.platform.get_job_output_location(&handle) {
                Ok(output) => {
                    info!(
                        species = %job.entity,
                        endpoint = job.endpoint.as_str(),
                        job = %handle,
                        output = %output,
                        "job completed"
                    );
                    job.mark_succeeded(output);
                }
                Err(e) => {
                    warn!(
                        species = %job.entity,
                        endpoint = %job.endpoint,
                        job = %handle,
                        error = %e,
                        "job completed but its output location is unavailable"
                    );
                    job.mark_failed(EntityError::Download(format!(
                        "output location unavailable: {e}"
                    )));
                }
            },
            RemoteStatus::Failed => {
                warn!(
                    species = %job.entity,
                    endpoint = %job.endpoint,
                    job = %handle,
                    "job failed on the platform"
                );
                job.mark_failed(EntityError::RemoteExecution(remote.to_string()));
            }
            RemoteStatus::Canceled => {
                warn!(
                    species = %job.entity,
                    endpoint = %job.endpoint,
                    job = %handle,
                    "job was canceled on the platform"
                );
                job.mark_canceled();
            }
        }
    }
}
