//! Effect stages
//!
//! A stage is a named unit of processing inserted into an
//! [`EffectPipeline`](crate::pipeline::EffectPipeline). Stages are looked up by
//! name in the [`StageRegistry`], configured with typed [`StageArgs`] and
//! started with the signal propagated from the previous stage.
//!
//! Samples travel between stages as interleaved `f32` blocks.

mod params;
mod pitch;
mod registry;
mod reverse;
mod sink;
mod source;
mod tempo;

pub use params::WsolaTiming;
pub use registry::{ConfiguredStage, StageFactory, StageInstance, StageKind, StageRegistry};

use crate::stream::{InputStream, OutputStream};
use std::path::PathBuf;
use tuneshift_core::{EncodingDescriptor, Result, SignalDescriptor};

/// Position of a stage in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageRole {
    /// First stage, reads from the input stream
    Source,
    /// Interior stage that alters samples
    Transform,
    /// Last stage, writes to the output stream
    Sink,
}

/// Whether a stage has more samples to hand out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Call `drain` again
    More,
    /// Nothing left
    Done,
}

/// Arguments bound to a stage at configure time
#[derive(Debug)]
pub enum StageArgs<'a> {
    /// Binding to the stream the source stage reads
    Input(&'a mut InputStream),
    /// Binding to the stream the sink stage writes
    Output(&'a mut OutputStream),
    /// Textual parameters; empty for stages that take none
    Params(&'a [String]),
}

impl StageArgs<'_> {
    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Self::Input(_) => "an input stream".to_string(),
            Self::Output(_) => "an output stream".to_string(),
            Self::Params(params) if params.is_empty() => "no arguments".to_string(),
            Self::Params(params) => format!("arguments {params:?}"),
        }
    }
}

/// Shared information handed to every stage when it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainContext {
    /// Encoding of the stream being read
    pub input_encoding: EncodingDescriptor,
    /// Encoding of the stream being written
    pub output_encoding: EncodingDescriptor,
    /// Writable directory for stages that buffer to disk
    pub scratch_dir: PathBuf,
    /// Frames the source hands out per block
    pub block_frames: usize,
}

/// Processing contract implemented by every stage
///
/// `start` is called once when the stage is appended, then `flow` for every
/// block coming from upstream. After the source reaches end of stream each
/// stage is drained until it reports [`Drain::Done`]. `stop` is called when
/// the pipeline is destroyed, whether or not the run completed.
pub trait Effect: Send {
    /// Prepare for `signal`, returning the signal this stage emits
    ///
    /// # Errors
    /// Any error here is reported by the pipeline as `StageAddFailed`.
    fn start(&mut self, ctx: &ChainContext, signal: SignalDescriptor) -> Result<SignalDescriptor>;

    /// Consume a block of samples, appending any produced samples to `output`
    ///
    /// # Errors
    /// `FlowFailed` when the block cannot be processed.
    fn flow(&mut self, input: &[f32], output: &mut Vec<f32>) -> Result<()>;

    /// Append buffered or generated samples to `output`
    ///
    /// # Errors
    /// `FlowFailed` when buffered samples cannot be produced.
    fn drain(&mut self, output: &mut Vec<f32>) -> Result<Drain>;

    /// Release per-run resources
    ///
    /// # Errors
    /// Failures are logged by the pipeline, never propagated.
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}
