//! Job dispatcher: one batch job per species (fan-out).

use tracing::{info, warn};

use batchscore_core::{
    DeploymentUid, EndpointName, Entity, SiteName, ValueObject, find_collisions,
};
use batchscore_platform::{InputReference, MlPlatform};

use crate::job::BatchJob;

/// Submits scoring jobs without waiting for them.
pub struct Dispatcher<'a, P: MlPlatform + ?Sized> {
    platform: &'a P,
    site: &'a SiteName,
    uid: Option<&'a DeploymentUid>,
}

impl<'a, P: MlPlatform + ?Sized> Dispatcher<'a, P> {
    pub fn new(platform: &'a P, site: &'a SiteName, uid: Option<&'a DeploymentUid>) -> Self {
        Self {
            platform,
            site,
            uid,
        }
    }

    pub fn endpoint_for(&self, entity: &Entity) -> EndpointName {
        EndpointName::derive(self.site, entity, self.uid)
    }

    /// Endpoint of every entity, logging shortened names and distinct species
    /// that share one.
    pub fn plan(&self, entities: &[Entity]) -> Vec<EndpointName> {
        let endpoints: Vec<EndpointName> = entities.iter().map(|e| self.endpoint_for(e)).collect();
        for (entity, endpoint) in entities.iter().zip(&endpoints) {
            if EndpointName::is_shortened(self.site, entity, self.uid) {
                warn!(
                    species = %entity,
                    endpoint = endpoint.as_str(),
                    "endpoint name shortened to fit the platform limit"
                );
            }
        }
        for collision in find_collisions(entities.iter().zip(&endpoints)) {
            warn!(
                endpoint = %collision.endpoint,
                species = ?collision.entities,
                "distinct species map to the same endpoint"
            );
        }
        endpoints
    }

    /// Submit one job per entity, in order, against `batch_input`.
    ///
    /// The input is always passed by reference (direct mode). A rejected
    /// submission yields a failed job and does not stop the others, so the
    /// result always has one job per entity.
    pub fn dispatch(&self, entities: &[Entity], batch_input: &str) -> Vec<BatchJob> {
        let input = InputReference::direct(batch_input);
        let total = entities.len();
        let endpoints = self.plan(entities);

        entities
            .iter()
            .zip(endpoints)
            .enumerate()
            .map(|(idx, (entity, endpoint))| {
                info!(
                    progress = %format!("{}/{total}", idx + 1),
                    species = %entity,
                    endpoint = endpoint.as_str(),
                    input = %input.uri,
                    "invoking batch endpoint"
                );

                match self.platform.submit_batch_job(endpoint.as_str(), &input) {
                    Ok(handle) => {
                        info!(
                            species = %entity,
                            endpoint = endpoint.as_str(),
                            job = %handle,
                            "batch job submitted"
                        );
                        BatchJob::submitted(entity.clone(), endpoint, handle)
                    }
                    Err(e) => {
                        warn!(
                            species = %entity,
                            endpoint = endpoint.as_str(),
                            job = "-",
                            error = %e,
                            "batch job submission failed"
                        );
                        BatchJob::rejected(entity.clone(), endpoint, e.to_string())
                    }
                }
            })
            .collect()
    }
}
