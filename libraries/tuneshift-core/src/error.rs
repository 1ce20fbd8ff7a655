//! Core error types for TuneShift
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using `ShiftError`
pub type Result<T> = std::result::Result<T, ShiftError>;

/// Status code reported to the host for a successful operation
pub const STATUS_SUCCESS: i32 = 0;

/// Status code reported when the bridge caught a panic
pub const STATUS_INTERNAL: i32 = -99;

/// Core error type for TuneShift
///
/// One variant per failure category of an invocation. Every variant carries
/// enough context (path, stage, parameter) to build a message the host can
/// show to a user.
#[derive(Error, Debug)]
pub enum ShiftError {
    /// Process-wide setup failed (scratch space, runtime)
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// The input file could not be opened or probed
    #[error("Cannot open input {}: {reason}", path.display())]
    CannotOpenInput { path: PathBuf, reason: String },

    /// The output file could not be created for writing
    #[error("Cannot open output {}: {reason}", path.display())]
    CannotOpenOutput { path: PathBuf, reason: String },

    /// No stage kind with this name is registered
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    /// Stage arguments were rejected during configuration
    #[error("Invalid arguments for stage '{stage}': {reason}")]
    InvalidStageArgs { stage: String, reason: String },

    /// A configured stage could not be started and appended
    #[error("Failed to add stage '{stage}': {reason}")]
    StageAddFailed { stage: String, reason: String },

    /// Samples stopped flowing because of an error mid-run
    #[error("Pipeline flow failed: {0}")]
    FlowFailed(String),

    /// The run was cancelled by the progress callback
    #[error("Pipeline run cancelled after {0} samples")]
    Cancelled(u64),
}

impl ShiftError {
    /// Create an initialization error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::InitFailed(msg.into())
    }

    /// Create an input-open error
    pub fn cannot_open_input(path: &Path, reason: impl fmt::Display) -> Self {
        Self::CannotOpenInput {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Create an output-open error
    pub fn cannot_open_output(path: &Path, reason: impl fmt::Display) -> Self {
        Self::CannotOpenOutput {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid-arguments error
    pub fn invalid_args(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidStageArgs {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Create a stage-add error
    pub fn stage_add(stage: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::StageAddFailed {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a flow error
    pub fn flow(msg: impl Into<String>) -> Self {
        Self::FlowFailed(msg.into())
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InitFailed(_) => ErrorKind::InitFailed,
            Self::CannotOpenInput { .. } => ErrorKind::CannotOpenInput,
            Self::CannotOpenOutput { .. } => ErrorKind::CannotOpenOutput,
            Self::UnknownStage(_) => ErrorKind::UnknownStage,
            Self::InvalidStageArgs { .. } => ErrorKind::InvalidStageArgs,
            Self::StageAddFailed { .. } => ErrorKind::StageAddFailed,
            Self::FlowFailed(_) => ErrorKind::FlowFailed,
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    /// Integer status code reported across the FFI boundary
    pub fn status_code(&self) -> i32 {
        self.kind().status_code()
    }
}

/// Error categories, stable across the FFI boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ShiftError::InitFailed`]
    InitFailed,
    /// See [`ShiftError::CannotOpenInput`]
    CannotOpenInput,
    /// See [`ShiftError::CannotOpenOutput`]
    CannotOpenOutput,
    /// See [`ShiftError::UnknownStage`]
    UnknownStage,
    /// See [`ShiftError::InvalidStageArgs`]
    InvalidStageArgs,
    /// See [`ShiftError::StageAddFailed`]
    StageAddFailed,
    /// See [`ShiftError::FlowFailed`]
    FlowFailed,
    /// See [`ShiftError::Cancelled`]
    Cancelled,
}

impl ErrorKind {
    /// All error kinds, in status-code order
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::InitFailed,
        ErrorKind::CannotOpenInput,
        ErrorKind::CannotOpenOutput,
        ErrorKind::UnknownStage,
        ErrorKind::InvalidStageArgs,
        ErrorKind::StageAddFailed,
        ErrorKind::FlowFailed,
        ErrorKind::Cancelled,
    ];

    /// Negative status code for this kind; 0 is reserved for success
    pub fn status_code(self) -> i32 {
        match self {
            Self::InitFailed => -1,
            Self::CannotOpenInput => -2,
            Self::CannotOpenOutput => -3,
            Self::UnknownStage => -4,
            Self::InvalidStageArgs => -5,
            Self::StageAddFailed => -6,
            Self::FlowFailed => -7,
            Self::Cancelled => -8,
        }
    }

    /// Reverse lookup of [`ErrorKind::status_code`]
    pub fn from_status_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.status_code() == code)
    }

    /// Stable snake_case name, used in logs and host messages
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitFailed => "init_failed",
            Self::CannotOpenInput => "cannot_open_input",
            Self::CannotOpenOutput => "cannot_open_output",
            Self::UnknownStage => "unknown_stage",
            Self::InvalidStageArgs => "invalid_stage_args",
            Self::StageAddFailed => "stage_add_failed",
            Self::FlowFailed => "flow_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
