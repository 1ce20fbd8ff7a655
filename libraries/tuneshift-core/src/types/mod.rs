mod operation;
mod signal;

pub use operation::{Operation, ParseOperationError, TransformSpec};
pub use signal::{EncodingDescriptor, SampleFormat, SignalDescriptor};
