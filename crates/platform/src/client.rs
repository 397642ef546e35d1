use std::sync::Arc;

use batchscore_core::JobHandle;

use crate::error::PlatformError;
use crate::types::{InputReference, OutputReference, RemoteStatus};

/// The managed ML platform, seen through the four calls the orchestrator needs.
///
/// Implementations must be cheap to call repeatedly: the completion waiter
/// polls `get_job_status` for every outstanding job on every round.
pub trait MlPlatform: Send + Sync {
    /// Start one batch scoring job on `endpoint`.
    fn submit_batch_job(
        &self,
        endpoint: &str,
        input: &InputReference,
    ) -> Result<JobHandle, PlatformError>;

    /// Current status of a submitted job.
    fn get_job_status(&self, job: &JobHandle) -> Result<RemoteStatus, PlatformError>;

    /// Where the scoring output of a completed job lives.
    ///
    /// Only meaningful once the job reported `Completed`.
    fn get_job_output_location(&self, job: &JobHandle) -> Result<OutputReference, PlatformError>;

    /// Fetch the raw bytes behind an output reference.
    fn download(&self, output: &OutputReference) -> Result<Vec<u8>, PlatformError>;
}

impl<T: MlPlatform + ?Sized> MlPlatform for Arc<T> {
    fn submit_batch_job(
        &self,
        endpoint: &str,
        input: &InputReference,
    ) -> Result<JobHandle, PlatformError> {
        (**self).submit_batch_job(endpoint, input)
    }

    fn get_job_status(&self, job: &JobHandle) -> Result<RemoteStatus, PlatformError> {
        (**self).get_job_status(job)
    }

    fn get_job_output_location(&self, job: &JobHandle) -> Result<OutputReference, PlatformError> {
        (**self).get_job_output_location(job)
    }

    fn download(&self, output: &OutputReference) -> Result<Vec<u8>, PlatformError> {
        (**self).download(output)
    }
}
