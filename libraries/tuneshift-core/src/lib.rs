//! TuneShift Core
//!
//! Platform-agnostic types and error handling shared by the TuneShift engine,
//! the mobile bridge and the command-line host.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Signal types**: `SignalDescriptor`, `SampleFormat`, `EncodingDescriptor`
//! - **Operation types**: `Operation`, `TransformSpec`
//! - **Error Handling**: Unified `ShiftError`, `ErrorKind` and `Result` types,
//!   plus the integer status codes reported across the FFI boundary
//!
//! # Example
//!
//! ```rust
//! use tuneshift_core::{Operation, SampleFormat, SignalDescriptor};
//!
//! let signal = SignalDescriptor::new(44_100, 2, SampleFormat::Int, 16);
//! assert_eq!(signal.frame_len(), 2);
//!
//! let op = Operation::tempo("1.5");
//! assert_eq!(op.file_name_modifier(), "tempo_1.5");
//! let transform = op.transform().unwrap();
//! assert_eq!(transform.kind, "tempo");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{ErrorKind, Result, ShiftError, STATUS_INTERNAL, STATUS_SUCCESS};
pub use types::{
    EncodingDescriptor, Operation, ParseOperationError, SampleFormat, SignalDescriptor,
    TransformSpec,
};
