//! Command line surface of `perform-inference`.
//!
//! Flags are parsed with `clap` and turned into typed settings once; nothing
//! past this module sees raw strings.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use thiserror::Error;
use tracing::{error, info};

use batchscore_core::{CoreError, CorrelationId, DeploymentUid, SiteName};
use batchscore_inference::{InferenceConfig, InferenceError, WaitConfig, run_inference};
use batchscore_observability::LogFormat;
use batchscore_platform::{HttpPlatformConfig, MlPlatform};

/// Exit code for invalid arguments or configuration.
pub const EXIT_USAGE: u8 = 2;
/// Exit code for a run that failed or produced no predictions.
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Config(#[from] InferenceError),
}

/// Submit one batch scoring job per species and merge the predictions into
/// the site's merged table.
#[derive(Debug, Clone, Parser)]
#[command(name = "perform-inference", version)]
pub struct Cli {
    /// Site the recordings belong to; prefixes every endpoint name.
    #[arg(long, alias = "site_name")]
    pub site_name: String,

    /// CSV with a `species` column.
    #[arg(long, alias = "species_list_csv")]
    pub species_list_csv: PathBuf,

    /// Remote reference to the batch input, passed to every job as is.
    #[arg(long, alias = "batch_input_path")]
    pub batch_input_path: String,

    /// Merged table, or a directory holding `merged_df.csv`.
    #[arg(long, alias = "merged_df_path")]
    pub merged_df_path: PathBuf,

    /// Where the consolidated CSV is written.
    #[arg(long, alias = "output_path")]
    pub output_path: PathBuf,

    /// Wait budget for all jobs, in seconds.
    #[arg(long, alias = "max_wait_time")]
    pub max_wait_time: u64,

    /// Deployment uid appended to endpoint names.
    #[arg(long)]
    pub uid: Option<String>,

    /// Seconds between status polling rounds.
    #[arg(long, default_value_t = 10)]
    pub poll_interval: u64,

    /// Consecutive failed status queries before a job is given up.
    #[arg(long, default_value_t = 5)]
    pub max_status_errors: u32,

    /// Base URL of the batch job gateway.
    #[arg(long, env = "BATCHSCORE_PLATFORM_URL")]
    pub platform_url: String,

    #[arg(long, env = "BATCHSCORE_PLATFORM_TOKEN", hide_env_values = true)]
    pub platform_token: Option<String>,

    /// Per-request timeout, in seconds.
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,

    /// Keep raw job outputs under this directory.
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Write the run summary as JSON to this path.
    #[arg(long)]
    pub summary_path: Option<PathBuf>,

    /// Keep the leading index column of the merged table.
    #[arg(long)]
    pub keep_index_column: bool,

    /// `json` or `pretty`.
    #[arg(long, default_value = "json")]
    pub log_format: LogFormat,

    /// Correlation id attached to every log line; generated when absent.
    #[arg(long)]
    pub correlation_id: Option<CorrelationId>,
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub inference: InferenceConfig,
    pub platform: HttpPlatformConfig,
}

impl Cli {
    pub fn settings(&self) -> Result<Settings, CliError> {
        let site = SiteName::parse(&self.site_name)?;
        let wait = WaitConfig::default()
            .with_max_wait(Duration::from_secs(self.max_wait_time))
            .with_poll_interval(Duration::from_secs(self.poll_interval))
            .with_max_status_errors(self.max_status_errors);

        let mut inference = InferenceConfig::new(
            site,
            &self.species_list_csv,
            &self.batch_input_path,
            &self.merged_df_path,
            &self.output_path,
        )
        .with_wait(wait);
        if let Some(uid) = &self.uid {
            inference = inference.with_deployment_uid(DeploymentUid::parse(uid)?);
        }
        if let Some(dir) = &self.download_dir {
            inference = inference.with_download_dir(dir);
        }
        if let Some(path) = &self.summary_path {
            inference = inference.with_summary_path(path);
        }
        if self.keep_index_column {
            inference = inference.keep_index_column();
        }
        inference.validate()?;

        let mut platform = HttpPlatformConfig::new(&self.platform_url)
            .with_request_timeout(Duration::from_secs(self.request_timeout));
        if let Some(token) = &self.platform_token {
            platform = platform.with_token(token);
        }

        Ok(Settings {
            inference,
            platform,
        })
    }
}

/// Run inference with validated settings and map the result to an exit code.
///
/// Both the success and the failure line carry the run's `duration_ms`.
pub fn execute<P: MlPlatform + ?Sized>(
    settings: &Settings,
    platform: &P,
    correlation_id: CorrelationId,
) -> u8 {
    let started = Instant::now();
    let result = run_inference(&settings.inference, platform, correlation_id)
        .context("inference run failed");
    let duration_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(summary) => {
            info!(
                succeeded = summary.succeeded(),
                total = summary.counts.total(),
                output = %settings.inference.output_path.display(),
                duration_ms,
                "perform-inference finished"
            );
            0
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), duration_ms, "perform-inference failed");
            EXIT_FAILURE
        }
    }
}
