//! Effect pipeline assembly
//!
//! An [`EffectPipeline`] is an ordered list of started stages sharing a
//! [`ChainContext`]. It borrows the stream handles its source and sink stages
//! are bound to, so the handles cannot be closed while it is alive.

use crate::effects::{ChainContext, ConfiguredStage, Effect, StageKind, StageRole};
use crate::runtime::LEDGER;
use std::path::Path;
use tuneshift_core::{EncodingDescriptor, Result, ShiftError, SignalDescriptor};

/// Default frames per source block
const DEFAULT_BLOCK_FRAMES: usize = 4096;

/// A started stage and the signal it emits
pub(crate) struct PipelineStage<'a> {
    pub(crate) kind: StageKind,
    pub(crate) effect: Box<dyn Effect + 'a>,
    pub(crate) signal: SignalDescriptor,
}

/// Ordered chain of stages: one source, optional transforms, one sink
pub struct EffectPipeline<'a> {
    context: ChainContext,
    stages: Vec<PipelineStage<'a>>,
    destroyed: bool,
}

impl<'a> EffectPipeline<'a> {
    /// Create an empty pipeline between two encodings
    pub fn new(
        input_encoding: &EncodingDescriptor,
        output_encoding: &EncodingDescriptor,
        scratch_dir: &Path,
    ) -> Self {
        LEDGER.pipeline_created();
        tracing::debug!(input = %input_encoding, output = %output_encoding, "pipeline created");

        Self {
            context: ChainContext {
                input_encoding: input_encoding.clone(),
                output_encoding: output_encoding.clone(),
                scratch_dir: scratch_dir.to_path_buf(),
                block_frames: DEFAULT_BLOCK_FRAMES,
            },
            stages: Vec::new(),
            destroyed: false,
        }
    }

    /// Same pipeline with a different source block size
    #[must_use]
    pub fn with_block_frames(mut self, frames: usize) -> Self {
        self.context.block_frames = frames.max(1);
        self
    }

    /// Context handed to every stage on start
    pub fn context(&self) -> &ChainContext {
        &self.context
    }

    /// Start `stage` with `signal` and add it to the end of the chain
    ///
    /// On success `signal` is replaced by the signal the stage emits, ready
    /// for the next append.
    ///
    /// # Errors
    /// `StageAddFailed` when the stage cannot start. The pipeline is left as
    /// it was.
    pub fn append(&mut self, stage: ConfiguredStage<'a>, signal: &mut SignalDescriptor) -> Result<()> {
        let (kind, mut effect) = stage.into_parts();

        let emitted = effect
            .start(&self.context, *signal)
            .map_err(|e| match e {
                ShiftError::StageAddFailed { .. } => e,
                other => ShiftError::stage_add(kind.name(), other),
            })?;

        tracing::debug!(stage = kind.name(), signal = %emitted, "stage appended");
        *signal = emitted;
        self.stages.push(PipelineStage {
            kind,
            effect,
            signal: emitted,
        });
        Ok(())
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether no stage has been appended
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in chain order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.kind.name()).collect()
    }

    /// Roles in chain order
    pub fn roles(&self) -> Vec<StageRole> {
        self.stages.iter().map(|stage| stage.kind.role()).collect()
    }

    pub(crate) fn stages_mut(&mut self) -> &mut [PipelineStage<'a>] {
        &mut self.stages
    }

    /// Stop every stage and release the pipeline
    pub fn destroy(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.destroyed {
            return;
        }
        for stage in &mut self.stages {
            if let Err(e) = stage.effect.stop() {
                tracing::warn!(stage = stage.kind.name(), "stage failed to stop: {e}");
            }
        }
        self.stages.clear();
        self.destroyed = true;
        LEDGER.pipeline_destroyed();
        tracing::debug!("pipeline destroyed");
    }
}

impl Drop for EffectPipeline<'_> {
    fn drop(&mut self) {
        if !self.destroyed {
            tracing::warn!("pipeline dropped without destroy");
            self.teardown();
        }
    }
}

impl std::fmt::Debug for EffectPipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectPipeline")
            .field("context", &self.context)
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}
