//! `batchscore-core`: naming and identity building blocks.
//!
//! This crate contains **pure** primitives (no I/O, no platform concerns):
//! species entities, endpoint naming, identifiers and the core error model.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::{
    DeploymentUid, ENDPOINT_NAME_MAX_LEN, EndpointCollision, EndpointName, Entity, SiteName,
    find_collisions, normalize,
};
pub use error::{CoreError, CoreResult};
pub use id::{CorrelationId, JobHandle};
pub use value_object::ValueObject;
