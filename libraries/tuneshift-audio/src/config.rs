//! Per-invocation configuration
//!
//! Everything an invocation needs from its environment is passed in through
//! [`OperationConfig`]; nothing here is process-wide mutable state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to do when the runner fails after the pipeline was built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunFailurePolicy {
    /// Report the failure as `FlowFailed`
    #[default]
    Fail,
    /// Log the failure at warn level and report success with what was written
    Warn,
}

/// Configuration of a single operation invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationConfig {
    /// Writable directory for stages that buffer to disk (reverse)
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Handling of failures while samples are flowing
    #[serde(default)]
    pub run_failure: RunFailurePolicy,

    /// Hold the process-wide invocation lock for the whole invocation
    #[serde(default)]
    pub serialize_invocations: bool,

    /// Frames per block pushed through transform stages
    #[serde(default = "default_block_frames")]
    pub block_frames: usize,
}

impl OperationConfig {
    /// Default configuration with a specific scratch directory
    pub fn with_scratch_dir(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            ..Self::default()
        }
    }

    /// Same configuration, serialized behind the invocation lock
    #[must_use]
    pub fn serialized(mut self) -> Self {
        self.serialize_invocations = true;
        self
    }
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            run_failure: RunFailurePolicy::default(),
            serialize_invocations: false,
            block_frames: default_block_frames(),
        }
    }
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("tuneshift")
}

fn default_block_frames() -> usize {
    4096
}
