//! `batchscore-platform`
//!
//! **Responsibility:** boundary to the managed ML platform that hosts the
//! per-species batch endpoints.
//!
//! The orchestrator only ever talks to the platform through [`MlPlatform`]:
//! - submit one batch job against a named endpoint
//! - query a job's status
//! - resolve a finished job's output location
//! - download raw output bytes
//!
//! Job execution, scheduling and autoscaling stay on the remote side.

pub mod client;
pub mod error;
pub mod http;
pub mod in_memory;
pub mod types;

pub use client::MlPlatform;
pub use error::PlatformError;
pub use http::{HttpPlatform, HttpPlatformConfig};
pub use in_memory::{EndpointScript, InMemoryPlatform, SubmissionRecord};
pub use types::{InputReference, OutputReference, ReferenceMode, RemoteStatus};
