//! Scripted in-process platform for tests and dry runs.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use batchscore_core::JobHandle;

use crate::client::MlPlatform;
use crate::error::PlatformError;
use crate::types::{InputReference, OutputReference, RemoteStatus};

/// Behaviour of one endpoint in an [`InMemoryPlatform`].
#[derive(Debug, Clone, Default)]
pub struct EndpointScript {
    /// When set, submissions are rejected with this reason.
    pub reject_submission: Option<String>,
    /// Statuses returned by successive polls; the last one repeats.
    /// Empty means the job stays `Running` forever.
    pub statuses: Vec<RemoteStatus>,
    /// Number of status polls that fail with a transport error before the
    /// status sequence starts.
    pub status_errors: u32,
    /// Raw scoring output; `None` makes the output location unavailable.
    pub output: Option<Vec<u8>>,
}

impl EndpointScript {
    /// Completes on the first poll and serves `output`.
    pub fn completes_with(output: impl Into<Vec<u8>>) -> Self {
        Self {
            statuses: vec![RemoteStatus::Completed],
            output: Some(output.into()),
            ..Default::default()
        }
    }

    /// Never leaves `Running`.
    pub fn runs_forever() -> Self {
        Self {
            statuses: vec![RemoteStatus::Running],
            ..Default::default()
        }
    }

    pub fn fails() -> Self {
        Self {
            statuses: vec![RemoteStatus::Running, RemoteStatus::Failed],
            ..Default::default()
        }
    }

    pub fn canceled() -> Self {
        Self {
            statuses: vec![RemoteStatus::Canceled],
            ..Default::default()
        }
    }

    pub fn rejects(reason: impl Into<String>) -> Self {
        Self {
            reject_submission: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: Vec<RemoteStatus>) -> Self {
        self.statuses = statuses;
        self
    }

    pub fn with_status_errors(mut self, errors: u32) -> Self {
        self.status_errors = errors;
        self
    }
}

/// A recorded call to `submit_batch_job`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub endpoint: String,
    pub input: InputReference,
    /// `None` when the submission was rejected.
    pub job: Option<JobHandle>,
}

#[derive(Debug)]
struct ScriptedJob {
    endpoint: String,
    polls: u32,
}

/// In-memory platform: endpoints behave as scripted, every call is recorded.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    scripts: RwLock<HashMap<String, EndpointScript>>,
    jobs: RwLock<HashMap<JobHandle, ScriptedJob>>,
    submissions: RwLock<Vec<SubmissionRecord>>,
    outputs: RwLock<HashMap<String, Vec<u8>>>,
    downloads: RwLock<Vec<OutputReference>>,
    next_job: AtomicU64,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the script of an endpoint.
    pub fn with_endpoint(self, endpoint: impl Into<String>, script: EndpointScript) -> Self {
        self.scripts
            .write()
            .unwrap()
            .insert(endpoint.into(), script);
        self
    }

    /// Every submission attempt, in call order.
    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.submissions.read().unwrap().clone()
    }

    /// Number of status polls answered (or failed) for a job.
    pub fn poll_count(&self, job: &JobHandle) -> u32 {
        self.jobs
            .read()
            .unwrap()
            .get(job)
            .map_or(0, |j| j.polls)
    }

    /// Every download request, in call order.
    pub fn downloads(&self) -> Vec<OutputReference> {
        self.downloads.read().unwrap().clone()
    }

    fn script_for(&self, job: &JobHandle) -> Result<EndpointScript, PlatformError> {
        let endpoint = self
            .jobs
            .read()
            .unwrap()
            .get(job)
            .map(|j| j.endpoint.clone())
            .ok_or_else(|| PlatformError::JobNotFound(job.clone()))?;
        Ok(self
            .scripts
            .read()
            .unwrap()
            .get(&endpoint)
            .cloned()
            .unwrap_or_default())
    }
}

impl MlPlatform for InMemoryPlatform {
    fn submit_batch_job(
        &self,
        endpoint: &str,
        input: &InputReference,
    ) -> Result<JobHandle, PlatformError> {
        let script = self.scripts.read().unwrap().get(endpoint).cloned();

        let result = match script {
            None => Err(PlatformError::EndpointNotFound(endpoint.to_string())),
            Some(EndpointScript {
                reject_submission: Some(reason),
                ..
            }) => Err(PlatformError::SubmissionRejected {
                endpoint: endpoint.to_string(),
                reason,
            }),
            Some(_) => {
                let n = self.next_job.fetch_add(1, Ordering::SeqCst) + 1;
                let job = JobHandle::new(format!("{endpoint}-job-{n}"));
                self.jobs.write().unwrap().insert(
                    job.clone(),
                    ScriptedJob {
                        endpoint: endpoint.to_string(),
                        polls: 0,
                    },
                );
                Ok(job)
            }
        };

        self.submissions.write().unwrap().push(SubmissionRecord {
            endpoint: endpoint.to_string(),
            input: input.clone(),
            job: result.as_ref().ok().cloned(),
        });
        result
    }

    fn get_job_status(&self, job: &JobHandle) -> Result<RemoteStatus, PlatformError> {
        let script = self.script_for(job)?;

        let polls = {
            let mut jobs = self.jobs.write().unwrap();
            let scripted = jobs
                .get_mut(job)
                .ok_or_else(|| PlatformError::JobNotFound(job.clone()))?;
            let polls = scripted.polls;
            scripted.polls += 1;
            polls
        };

        if polls < script.status_errors {
            return Err(PlatformError::Transport(format!(
                "scripted status failure {} for {job}",
                polls + 1
            )));
        }

        let idx = (polls - script.status_errors) as usize;
        Ok(script
            .statuses
            .get(idx)
            .or(script.statuses.last())
            .copied()
            .unwrap_or(RemoteStatus::Running))
    }

    fn get_job_output_location(&self, job: &JobHandle) -> Result<OutputReference, PlatformError> {
        let script = self.script_for(job)?;
        let bytes = script
            .output
            .ok_or_else(|| PlatformError::OutputUnavailable(job.clone()))?;

        let output = OutputReference::new(format!("memory://{job}/score/predictions.csv"));
        self.outputs
            .write()
            .unwrap()
            .insert(output.uri.clone(), bytes);
        Ok(output)
    }

    fn download(&self, output: &OutputReference) -> Result<Vec<u8>, PlatformError> {
        self.downloads.write().unwrap().push(output.clone());
        self.outputs
            .read()
            .unwrap()
            .get(&output.uri)
            .cloned()
            .ok_or_else(|| PlatformError::Transport(format!("no object at {output}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> InputReference {
        InputReference::direct("azureml://paths/batch_input/")
    }

    #[test]
    fn unknown_endpoint_is_rejected_and_recorded() {
        let platform = InMemoryPlatform::new();

        let err = platform.submit_batch_job("cherrypt-nope", &input()).unwrap_err();

        assert!(matches!(err, PlatformError::EndpointNotFound(e) if e == "cherrypt-nope"));
        let submissions = platform.submissions();
        assert_eq!(submissions.len(), 1);
        assert!(submissions[0].job.is_none());
    }

    #[test]
    fn status_sequence_repeats_last_value() {
        let platform = InMemoryPlatform::new().with_endpoint(
            "ep",
            EndpointScript::default()
                .with_statuses(vec![RemoteStatus::Queued, RemoteStatus::Running]),
        );
        let job = platform.submit_batch_job("ep", &input()).unwrap();

        assert_eq!(platform.get_job_status(&job).unwrap(), RemoteStatus::Queued);
        assert_eq!(platform.get_job_status(&job).unwrap(), RemoteStatus::Running);
        assert_eq!(platform.get_job_status(&job).unwrap(), RemoteStatus::Running);
        assert_eq!(platform.poll_count(&job), 3);
    }

    #[test]
    fn status_errors_come_first() {
        let platform = InMemoryPlatform::new().with_endpoint(
            "ep",
            EndpointScript::completes_with("x").with_status_errors(2),
        );
        let job = platform.submit_batch_job("ep", &input()).unwrap();

        assert!(matches!(
            platform.get_job_status(&job),
            Err(PlatformError::Transport(_))
        ));
        assert!(platform.get_job_status(&job).is_err());
        assert_eq!(platform.get_job_status(&job).unwrap(), RemoteStatus::Completed);
    }

    #[test]
    fn completed_job_output_can_be_downloaded() {
        let platform = InMemoryPlatform::new()
            .with_endpoint("ep", EndpointScript::completes_with("f.csv 0.2 0.8"));
        let job = platform.submit_batch_job("ep", &input()).unwrap();

        let output = platform.get_job_output_location(&job).unwrap();
        let bytes = platform.download(&output).unwrap();

        assert_eq!(bytes, b"f.csv 0.2 0.8");
        assert_eq!(platform.downloads(), vec![output]);
    }

    #[test]
    fn missing_output_is_unavailable() {
        let platform = InMemoryPlatform::new().with_endpoint("ep", EndpointScript::fails());
        let job = platform.submit_batch_job("ep", &input()).unwrap();

        assert!(matches!(
            platform.get_job_output_location(&job),
            Err(PlatformError::OutputUnavailable(_))
        ));
    }

    #[test]
    fn unknown_job_is_not_found() {
        let platform = InMemoryPlatform::new();
        let job = JobHandle::new("ghost");
        assert!(matches!(
            platform.get_job_status(&job),
            Err(PlatformError::JobNotFound(_))
        ));
    }
}
