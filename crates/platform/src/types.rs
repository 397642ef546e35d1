//! Values exchanged with the platform.

use serde::{Deserialize, Serialize};

/// How the platform should treat an input path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMode {
    /// The path already lives in remote storage; use it in place.
    Direct,
    /// The path is local; the platform must stage (upload) it first.
    Upload,
}

/// Reference to a job's input dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputReference {
    pub uri: String,
    pub mode: ReferenceMode,
}

impl InputReference {
    /// An already-materialized remote path.
    pub fn direct(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mode: ReferenceMode::Direct,
        }
    }
}

/// Location of a finished job's scoring output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputReference {
    pub uri: String,
}

impl OutputReference {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

impl core::fmt::Display for OutputReference {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Job status as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// Accepted but not executing yet (queued, preparing, provisioning).
    Queued,
    /// Executing, finalizing, or in a transitional state.
    Running,
    /// Finished successfully; output is available.
    Completed,
    Failed,
    Canceled,
}

impl RemoteStatus {
    /// Map a platform status string onto the status set used here.
    ///
    /// Unknown strings count as `Running`: the job is kept under watch until
    /// it reports a terminal status or the wait budget runs out.
    pub fn from_platform(raw: &str) -> Self {
        match raw.trim() {
            "Completed" | "Finished" => Self::Completed,
            "Failed" => Self::Failed,
            "Canceled" | "Cancelled" => Self::Canceled,
            "NotStarted" | "Queued" | "Starting" | "Preparing" | "Provisioning" => Self::Queued,
            _ => Self::Running,
        }
    }}

impl core::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Queued => "Queued",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
        };
        f.write_str(s)
    }
}
