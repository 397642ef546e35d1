//! Run configuration, validated once at the boundary.

use std::path::PathBuf;
use std::time::Duration;

use batchscore_core::{DeploymentUid, SiteName};

use crate::error::InferenceError;
use crate::waiter::WaitConfig;

/// Everything one inference run needs.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub site: SiteName,
    /// Suffix appended to every endpoint name.
    pub deployment_uid: Option<DeploymentUid>,
    /// CSV with a `species` column.
    pub species_list: PathBuf,
    /// Remote reference to the scoring input, passed through verbatim.
    pub batch_input: String,
    /// Merged table file, or a directory holding `merged_df.csv`.
    pub merged_table: PathBuf,
    pub output_path: PathBuf,
    pub wait: WaitConfig,
    /// Where raw job outputs are kept, if anywhere.
    pub download_dir: Option<PathBuf>,
    /// Where the JSON run summary is written, if anywhere.
    pub summary_path: Option<PathBuf>,
    /// Drop the leading (index) column of the merged table.
    pub drop_index_column: bool,
}

impl InferenceConfig {
    pub fn new(
        site: SiteName,
        species_list: impl Into<PathBuf>,
        batch_input: impl Into<String>,
        merged_table: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            site,
            deployment_uid: None,
            species_list: species_list.into(),
            batch_input: batch_input.into(),
            merged_table: merged_table.into(),
            output_path: output_path.into(),
            wait: WaitConfig::default(),
            download_dir: None,
            summary_path: None,
            drop_index_column: true,
        }
    }

    pub fn with_deployment_uid(mut self, uid: DeploymentUid) -> Self {
        self.deployment_uid = Some(uid);
        self
    }

    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.wait.max_wait = max_wait;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.wait.poll_interval = interval;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    pub fn with_summary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_path = Some(path.into());
        self
    }

    pub fn keep_index_column(mut self) -> Self {
        self.drop_index_column = false;
        self
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.batch_input.trim().is_empty() {
            return Err(InferenceError::Config(
                "batch input reference must not be empty".to_string(),
            ));
        }
        if self.wait.poll_interval.is_zero() {
            return Err(InferenceError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.wait.max_status_errors == 0 {
            return Err(InferenceError::Config(
                "max status errors must be at least 1".to_string(),
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(InferenceError::Config("output path must not be empty".to_string()));
        }
        if self.output_path.is_dir() {
            return Err(InferenceError::Config(format!(
                "output path {} is a directory",
                self.output_path.display()
            )));
        }
        Ok(())
    }
}
