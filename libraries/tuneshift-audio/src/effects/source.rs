//! Source stage: pulls decoded blocks from the input stream

use super::{ChainContext, Drain, Effect};
use crate::stream::InputStream;
use tuneshift_core::{Result, ShiftError, SignalDescriptor};

pub(crate) struct SourceStage<'a> {
    stream: &'a mut InputStream,
    block_samples: usize,
}

impl<'a> SourceStage<'a> {
    pub(crate) fn new(stream: &'a mut InputStream) -> Self {
        Self {
            stream,
            block_samples: 0,
        }
    }
}

impl Effect for SourceStage<'_> {
    fn start(&mut self, ctx: &ChainContext, _signal: SignalDescriptor) -> Result<SignalDescriptor> {
        let signal = *self.stream.signal();
        self.block_samples = ctx.block_frames.max(1) * signal.frame_len();
        Ok(signal)
    }

    fn flow(&mut self, _input: &[f32], _output: &mut Vec<f32>) -> Result<()> {
        Err(ShiftError::flow("the input stage does not accept samples"))
    }

    /// Decode packets until at least one block is available
    fn drain(&mut self, output: &mut Vec<f32>) -> Result<Drain> {
        let target = output.len() + self.block_samples;
        while output.len() < target {
            if self.stream.read_block(output)? == 0 {
                return Ok(Drain::Done);
            }
        }
        Ok(Drain::More)
    }
}
