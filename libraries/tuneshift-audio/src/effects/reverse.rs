//! Reverse stage
//!
//! The whole stream has to be seen before its first reversed sample can be
//! produced, so incoming samples are spooled to an anonymous file in the
//! scratch directory and read back from the end once upstream is exhausted.

use super::{ChainContext, Drain, Effect};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use tuneshift_core::{Result, ShiftError, SignalDescriptor};

/// Frames read back per drain call
const READ_BLOCK_FRAMES: usize = 8192;

const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

enum Phase {
    Idle,
    Recording(BufWriter<File>),
    Playing { file: File, frames_left: u64 },
}

/// Reverses frame order, keeping the channel order within each frame
pub(crate) struct ReverseStage {
    channels: usize,
    frames: u64,
    phase: Phase,
}

impl ReverseStage {
    pub(crate) fn new() -> Self {
        Self {
            channels: 0,
            frames: 0,
            phase: Phase::Idle,
        }
    }
}

impl Effect for ReverseStage {
    fn start(&mut self, ctx: &ChainContext, signal: SignalDescriptor) -> Result<SignalDescriptor> {
        let file = tempfile::tempfile_in(&ctx.scratch_dir).map_err(|e| {
            ShiftError::stage_add(
                "reverse",
                format!("cannot create scratch file in {}: {e}", ctx.scratch_dir.display()),
            )
        })?;
        self.channels = signal.frame_len();
        self.frames = 0;
        self.phase = Phase::Recording(BufWriter::new(file));
        Ok(signal)
    }

    fn flow(&mut self, input: &[f32], _output: &mut Vec<f32>) -> Result<()> {
        let Phase::Recording(writer) = &mut self.phase else {
            return Err(ShiftError::flow("reverse stage is not recording"));
        };
        for sample in input {
            writer
                .write_all(&sample.to_le_bytes())
                .map_err(|e| ShiftError::flow(format!("writing reverse scratch file: {e}")))?;
        }
        self.frames += (input.len() / self.channels) as u64;
        Ok(())
    }

    fn drain(&mut self, output: &mut Vec<f32>) -> Result<Drain> {
        if let Phase::Recording(_) = self.phase {
            let Phase::Recording(writer) = std::mem::replace(&mut self.phase, Phase::Idle) else {
                return Ok(Drain::Done);
            };
            let file = writer
                .into_inner()
                .map_err(|e| ShiftError::flow(format!("flushing reverse scratch file: {}", e.error())))?;
            tracing::debug!(frames = self.frames, "reverse stage spooled input");
            self.phase = Phase::Playing {
                file,
                frames_left: self.frames,
            };
        }

        let Phase::Playing { file, frames_left } = &mut self.phase else {
            return Ok(Drain::Done);
        };
        if *frames_left == 0 {
            self.phase = Phase::Idle;
            return Ok(Drain::Done);
        }

        let frame_bytes = self.channels * SAMPLE_BYTES;
        let count = (*frames_left).min(READ_BLOCK_FRAMES as u64);
        let first = *frames_left - count;

        let mut bytes = vec![0u8; count as usize * frame_bytes];
        file.seek(SeekFrom::Start(first * frame_bytes as u64))
            .and_then(|_| file.read_exact(&mut bytes))
            .map_err(|e| ShiftError::flow(format!("reading reverse scratch file: {e}")))?;

        output.reserve(bytes.len() / SAMPLE_BYTES);
        for frame in bytes.chunks_exact(frame_bytes).rev() {
            output.extend(
                frame
                    .chunks_exact(SAMPLE_BYTES)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            );
        }

        *frames_left = first;
        if first == 0 {
            self.phase = Phase::Idle;
            Ok(Drain::Done)
        } else {
            Ok(Drain::More)
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.phase = Phase::Idle;
        Ok(())
    }
}
