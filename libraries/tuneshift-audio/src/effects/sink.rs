//! Sink stage: encodes every block it receives into the output stream

use super::{ChainContext, Drain, Effect};
use crate::stream::OutputStream;
use tuneshift_core::{Result, ShiftError, SignalDescriptor};

pub(crate) struct SinkStage<'a> {
    stream: &'a mut OutputStream,
}

impl<'a> SinkStage<'a> {
    pub(crate) fn new(stream: &'a mut OutputStream) -> Self {
        Self { stream }
    }
}

impl Effect for SinkStage<'_> {
    fn start(&mut self, _ctx: &ChainContext, signal: SignalDescriptor) -> Result<SignalDescriptor> {
        let target = self.stream.signal();
        if signal.sample_rate != target.sample_rate || signal.channels != target.channels {
            return Err(ShiftError::stage_add(
                "output",
                format!("incoming signal ({signal}) does not match the output stream ({target})"),
            ));
        }
        Ok(signal)
    }

    fn flow(&mut self, input: &[f32], _output: &mut Vec<f32>) -> Result<()> {
        self.stream.write(input)
    }

    fn drain(&mut self, _output: &mut Vec<f32>) -> Result<Drain> {
        Ok(Drain::Done)
    }
}
