//! One inference run, end to end.

use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use batchscore_core::{CorrelationId, ValueObject};
use batchscore_platform::MlPlatform;

use crate::assembler::ResultAssembler;
use crate::config::InferenceConfig;
use crate::dispatcher::Dispatcher;
use crate::error::InferenceError;
use crate::lister::list_entities;
use crate::outcome::RunSummary;
use crate::table;
use crate::waiter::CompletionWaiter;

/// Score every listed species and write the consolidated table.
///
/// All input is read and checked before the first submission. Per-species
/// failures are reported in the summary; the run itself fails only on bad
/// input, table or filesystem errors, or when no species succeeded (in which
/// case no table is written).
pub fn run_inference<P: MlPlatform + ?Sized>(
    config: &InferenceConfig,
    platform: &P,
    correlation_id: CorrelationId,
) -> Result<RunSummary, InferenceError> {
    let started_at = Utc::now();
    let clock = Instant::now();
    config.validate()?;

    info!(
        site = config.site.as_str(),
        species_list = %config.species_list.display(),
        merged_table = %config.merged_table.display(),
        max_wait_secs = config.wait.max_wait.as_secs(),
        poll_interval_secs = config.wait.poll_interval.as_secs(),
        "starting inference run"
    );

    let entities = list_entities(&config.species_list)?;
    let dispatcher = Dispatcher::new(platform, &config.site, config.deployment_uid.as_ref());
    let mut table = table::load_base_table(&config.merged_table, config.drop_index_column)?;
    info!(
        rows = table.height(),
        columns = table.width(),
        "loaded merged table"
    );

    let mut jobs = dispatcher.dispatch(&entities, &config.batch_input);
    let wait = CompletionWaiter::new(platform, config.wait.clone()).wait_all(&mut jobs);

    let mut assembler = ResultAssembler::new(platform, &config.site);
    if let Some(dir) = config.download_dir.as_deref() {
        assembler = assembler.with_download_dir(dir);
    }
    let outcomes = assembler.assemble(&mut table, &jobs)?;

    let summary = RunSummary::new(correlation_id, config.site.as_str(), started_at, outcomes)
        .with_wait(wait);
    summary.log();
    if let Some(path) = &config.summary_path {
        summary.write_json(path)?;
        info!(path = %path.display(), "wrote run summary");
    }

    if summary.succeeded() == 0 {
        warn!(
            attempted = entities.len(),
            "no species produced predictions; output table not written"
        );
        return Err(InferenceError::NoSuccessfulEntities {
            attempted: entities.len(),
        });
    }

    table::write_csv(&mut table, &config.output_path)?;
    info!(
        path = %config.output_path.display(),
        rows = table.height(),
        columns = table.width(),
        elapsed_ms = clock.elapsed().as_millis() as u64,
        "inference run complete"
    );
    Ok(summary)
}
