//! TuneShift Audio
//!
//! File-to-file audio operations built from a small effect pipeline.
//!
//! This crate provides:
//! - Stream handles: decoding via Symphonia (MP3, FLAC, OGG, WAV, AAC, ALAC)
//!   and atomic WAV or FLAC output via hound and flacenc
//! - Effect stages: tempo (WSOLA), pitch (WSOLA + rubato), reverse
//! - Pipeline assembly and execution with a per-invocation state machine
//! - The four operations (`convert`, `tempo`, `pitch`, `reverse`) and an
//!   undoable editing [`Session`]
//!
//! # Example: Running an Operation
//!
//! ```rust,no_run
//! use tuneshift_audio::{tempo, OperationConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OperationConfig::with_scratch_dir("/tmp/tuneshift");
//! let report = tempo("/music/song.mp3", "/music/song_fast.wav", "1.25", &config)?;
//!
//! println!("{report}");
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Listing Stages
//!
//! ```rust
//! use tuneshift_audio::{Runtime, StageRole};
//!
//! let transforms: Vec<_> = Runtime::global()
//!     .registry()
//!     .kinds()
//!     .into_iter()
//!     .filter(|kind| kind.role() == StageRole::Transform)
//!     .map(|kind| kind.name())
//!     .collect();
//! assert_eq!(transforms, ["pitch", "reverse", "tempo"]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
pub mod effects;
mod operation;
pub mod pipeline;
mod runtime;
mod session;
mod stream;

pub use config::{OperationConfig, RunFailurePolicy};
pub use effects::{
    ChainContext, ConfiguredStage, Drain, Effect, StageArgs, StageKind, StageRegistry, StageRole,
    WsolaTiming,
};
pub use operation::{
    apply, convert, pitch, reverse, run_operation, run_operation_with_progress,
    run_operation_with_registry, tempo, OperationReport,
};
pub use pipeline::{EffectPipeline, InvocationState, InvocationStateMachine, Progress, RunStats};
pub use runtime::{ResourceStats, Runtime};
pub use session::{Session, SessionStep};
pub use stream::{InputStream, OutputStream};

pub use tuneshift_core::{ErrorKind, Operation, Result, ShiftError, TransformSpec};
