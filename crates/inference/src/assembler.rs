//! Result assembler: turns finished jobs into prediction columns.

use std::fs;
use std::path::{Component, Path, PathBuf};

use polars::prelude::DataFrame;
use tracing::{debug, info, warn};

use batchscore_core::{Entity, SiteName, ValueObject};
use batchscore_platform::{MlPlatform, OutputReference};

use crate::error::{EntityError, InferenceError};
use crate::job::BatchJob;
use crate::outcome::{EntityOutcome, OutcomeKind};
use crate::raw_output::{PredictionSeries, parse_prediction_bytes};
use crate::table;

/// File name of a persisted raw output.
pub const RAW_OUTPUT_FILE: &str = "predictions.csv";

/// Name of the prediction column added for `entity`.
pub fn column_name(entity: &Entity) -> String {
    format!("{}_PRESENT", entity.name())
}

pub struct ResultAssembler<'a, P: MlPlatform + ?Sized> {
    platform: &'a P,
    site: &'a SiteName,
    download_dir: Option<&'a Path>,
}

impl<'a, P: MlPlatform + ?Sized> ResultAssembler<'a, P> {
    pub fn new(platform: &'a P, site: &'a SiteName) -> Self {
        Self {
            platform,
            site,
            download_dir: None,
        }
    }

    /// Also keep every raw output under `dir/{site}/{species}/predictions.csv`.
    pub fn with_download_dir(mut self, dir: &'a Path) -> Self {
        self.download_dir = Some(dir);
        self
    }

    /// Add one column per succeeded job to `table` and report every job's
    /// outcome, in job order.
    ///
    /// Output failures are scoped to their species. Only a failure to modify
    /// the table itself is returned as an error.
    pub fn assemble(
        &self,
        table: &mut DataFrame,
        jobs: &[BatchJob],
    ) -> Result<Vec<EntityOutcome>, InferenceError> {
        let mut outcomes = Vec::with_capacity(jobs.len());

        for job in jobs {
            let kind = match job.output() {
                None => {
                    let kind = OutcomeKind::from_unsuccessful(&job.status).unwrap_or_else(|| {
                        OutcomeKind::FailedExecution {
                            reason: format!("job still {}", job.status.label()),
                        }
                    });
                    info!(
                        species = %job.entity,
                        endpoint = %job.endpoint,
                        job = job.handle_label(),
                        status = job.status.label(),
                        "skipping species without a successful job"
                    );
                    kind
                }
                Some(output) => match self.fetch(job, output) {
                    Ok(series) => OutcomeKind::Succeeded {
                        column: self.add_column(table, job, &series)?,
                    },
                    Err(error) => {
                        warn!(
                            species = %job.entity,
                            endpoint = %job.endpoint,
                            job = job.handle_label(),
                            error = %error,
                            "job output could not be used"
                        );
                        OutcomeKind::from_error(&error)
                    }
                },
            };
            outcomes.push(EntityOutcome::for_job(job, kind));
        }

        Ok(outcomes)
    }

    fn fetch(
        &self,
        job: &BatchJob,
        output: &OutputReference,
    ) -> Result<PredictionSeries, EntityError> {
        let bytes = self
            .platform
            .download(output)
            .map_err(|e| EntityError::Download(e.to_string()))?;
        debug!(
            species = %job.entity,
            job = job.handle_label(),
            output = %output,
            bytes = bytes.len(),
            "downloaded job output"
        );

        if let Some(dir) = self.download_dir {
            self.persist(dir, job, &bytes)?;
        }
        Ok(parse_prediction_bytes(&bytes)?)
    }

    fn persist(&self, dir: &Path, job: &BatchJob, bytes: &[u8]) -> Result<PathBuf, EntityError> {
        let species_dir = job.entity.normalized();
        let mut components = Path::new(&species_dir).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(EntityError::Download(format!(
                "species {:?} cannot be used as a directory name under {}",
                job.entity.name(),
                dir.display()
            )));
        }

        let target = dir
            .join(self.site.as_str())
            .join(&species_dir)
            .join(RAW_OUTPUT_FILE);
        let store = |e: std::io::Error| {
            EntityError::Download(format!(
                "could not store raw output at {}: {e}",
                target.display()
            ))
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(store)?;
        }
        fs::write(&target, bytes).map_err(store)?;
        debug!(species = %job.entity, path = %target.display(), "stored raw job output");
        Ok(target)
    }

    fn add_column(
        &self,
        table: &mut DataFrame,
        job: &BatchJob,
        series: &PredictionSeries,
    ) -> Result<String, InferenceError> {
        let height = table.height();
        if series.len() != height {
            warn!(
                species = %job.entity,
                job = job.handle_label(),
                predictions = series.len(),
                rows = height,
                "prediction count does not match the merged table"
            );
        }

        let column = column_name(&job.entity);
        if table::set_score_column(table, &column, series.present_column(height))? {
            warn!(
                species = %job.entity,
                job = job.handle_label(),
                column = %column,
                "species listed more than once; later job replaces the column"
            );
        }
        info!(
            species = %job.entity,
            endpoint = job.endpoint.as_str(),
            job = job.handle_label(),
            column = %column,
            "added prediction column"
        );
        Ok(column)
    }
}
