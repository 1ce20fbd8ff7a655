//! Pitch stage
//!
//! Shifting by `cents` multiplies every frequency by `2^(cents / 1200)`.
//! The signal is first time-stretched by that ratio, then resampled back to
//! its original duration, which moves the pitch and leaves the tempo alone.

use super::params::PitchParams;
use super::tempo::Wsola;
use super::{ChainContext, Drain, Effect};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::collections::VecDeque;
use tuneshift_core::{Result, ShiftError, SignalDescriptor};

/// Frames per resampler call
const CHUNK_FRAMES: usize = 1024;

/// Shifts pitch by a constant interval, leaving tempo unchanged
pub(crate) struct PitchStage {
    params: PitchParams,
    state: Option<PitchState>,
}

struct PitchState {
    stretcher: Wsola,
    resampler: Option<ChunkedResampler>,
    stretched: Vec<f32>,
}

impl PitchStage {
    pub(crate) fn new(params: PitchParams) -> Self {
        Self {
            params,
            state: None,
        }
    }

    /// Frequency ratio for the configured shift
    fn ratio(&self) -> f64 {
        (self.params.cents / 1200.0).exp2()
    }
}

impl Effect for PitchStage {
    fn start(&mut self, _ctx: &ChainContext, signal: SignalDescriptor) -> Result<SignalDescriptor> {
        let ratio = self.ratio();
        let channels = signal.frame_len();

        let stretcher = Wsola::new(1.0 / ratio, &self.params.timing, signal.sample_rate, channels);
        let resampler = if self.params.cents == 0.0 {
            None
        } else {
            Some(ChunkedResampler::new(1.0 / ratio, channels)?)
        };

        tracing::debug!(cents = self.params.cents, ratio, "pitch stage started");
        self.state = Some(PitchState {
            stretcher,
            resampler,
            stretched: Vec::new(),
        });
        Ok(signal)
    }

    fn flow(&mut self, input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| ShiftError::flow("pitch stage used before start"))?;

        state.stretched.clear();
        state.stretcher.push(input, &mut state.stretched);
        match state.resampler.as_mut() {
            Some(resampler) => resampler.process(&state.stretched, output),
            None => {
                output.extend_from_slice(&state.stretched);
                Ok(())
            }
        }
    }

    fn drain(&mut self, output: &mut Vec<f32>) -> Result<Drain> {
        let Some(state) = self.state.as_mut() else {
            return Ok(Drain::Done);
        };

        state.stretched.clear();
        state.stretcher.flush(&mut state.stretched);
        if let Some(resampler) = state.resampler.as_mut() {
            resampler.process(&state.stretched, output)?;
            // Duration is unchanged: as many frames out as came in
            resampler.finish(state.stretcher.frames_in(), output)?;
        } else {
            output.extend_from_slice(&state.stretched);
        }
        Ok(Drain::Done)
    }

    fn stop(&mut self) -> Result<()> {
        self.state = None;
        Ok(())
    }
}

/// Fixed-chunk rubato resampler over interleaved samples
///
/// Compensates the resampler's output delay so that output frame `n`
/// corresponds to input frame `n / ratio`.
struct ChunkedResampler {
    resampler: SincFixedIn<f32>,
    channels: usize,
    input_buffer: VecDeque<f32>,
    delay_remaining: usize,
    frames_out: u64,
}

impl ChunkedResampler {
    fn new(ratio: f64, channels: usize) -> Result<Self> {
        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris,
        };
        let resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, channels)
            .map_err(|e| ShiftError::stage_add("pitch", format!("resampler creation failed: {e}")))?;
        let delay_remaining = resampler.output_delay();

        Ok(Self {
            resampler,
            channels,
            input_buffer: VecDeque::new(),
            delay_remaining,
            frames_out: 0,
        })
    }

    /// Resample every complete chunk available
    fn process(&mut self, input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        self.input_buffer.extend(input.iter().copied());

        loop {
            let needed = self.resampler.input_frames_next() * self.channels;
            if self.input_buffer.len() < needed {
                break;
            }
            let chunk: Vec<f32> = self.input_buffer.drain(..needed).collect();
            let planar = deinterleave(&chunk, self.channels);
            let resampled = self
                .resampler
                .process(&planar, None)
                .map_err(|e| ShiftError::flow(format!("pitch resampling failed: {e}")))?;
            self.emit(&resampled, output, None);
        }
        Ok(())
    }

    /// Push out the buffered tail until `expected` frames have been emitted
    fn finish(&mut self, expected: u64, output: &mut Vec<f32>) -> Result<()> {
        let remaining: Vec<f32> = self.input_buffer.drain(..).collect();
        // An empty slice is rejected by the resampler; `None` flushes instead
        let mut partial = (!remaining.is_empty()).then(|| deinterleave(&remaining, self.channels));

        while self.frames_out < expected {
            let resampled = self
                .resampler
                .process_partial(partial.take().as_deref(), None)
                .map_err(|e| ShiftError::flow(format!("pitch resampler flush failed: {e}")))?;
            let produced = resampled.first().map_or(0, Vec::len);
            self.emit(&resampled, output, Some(expected));
            if produced == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Interleave planar output, skipping the delay and capping at `limit`
    fn emit(&mut self, planar: &[Vec<f32>], output: &mut Vec<f32>, limit: Option<u64>) {
        let frames = planar.first().map_or(0, Vec::len);
        let skip = self.delay_remaining.min(frames);
        self.delay_remaining -= skip;

        let mut take = frames - skip;
        if let Some(limit) = limit {
            take = take.min(limit.saturating_sub(self.frames_out) as usize);
        }

        output.reserve(take * self.channels);
        for frame in skip..skip + take {
            output.extend(planar.iter().map(|channel| channel[frame]));
        }
        self.frames_out += take as u64;
    }
}

fn deinterleave(interleaved: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = interleaved.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in interleaved.chunks_exact(channels) {
        for (channel, &sample) in planar.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    planar
}
