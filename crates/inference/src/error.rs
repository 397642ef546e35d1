//! Error taxonomy.
//!
//! [`InferenceError`] is fatal for the whole run. [`EntityError`] is scoped to
//! one species and ends up in that species' outcome instead of propagating.

use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

use batchscore_core::CoreError;

use crate::raw_output::OutputParseError;

/// Run-level failure.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// A required input file or column is missing or malformed.
    #[error("input format error in {}: {reason}", path.display())]
    InputFormat { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("table error in {}: {source}", path.display())]
    Table {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("table error: {0}")]
    Frame(#[from] PolarsError),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no species produced predictions ({attempted} attempted)")]
    NoSuccessfulEntities { attempted: usize },
}

impl InferenceError {
    pub fn input_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InputFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of one species' job.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntityError {
    /// The job could not be created.
    #[error("submission failed: {0}")]
    Submission(String),

    /// The job ended remotely without success, or its status could not be read.
    #[error("remote execution failed: {0}")]
    RemoteExecution(String),

    #[error("timed out after {waited_secs}s")]
    TimeoutExceeded { waited_secs: u64 },

    /// The output of a successful job could not be located, fetched or stored.
    #[error("output retrieval failed: {0}")]
    Download(String),

    #[error("output could not be parsed: {0}")]
    OutputParse(#[from] OutputParseError),
}
