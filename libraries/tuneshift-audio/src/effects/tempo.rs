//! Tempo stage
//!
//! Time-stretching by waveform-similarity overlap-add (WSOLA). The input is
//! cut into overlapping segments; each new segment is placed where its head
//! best matches the tail of the previous one, then the two are crossfaded.
//! Segments are read at `factor` times the rate they are written, which
//! changes duration but not pitch.

use super::params::{TempoParams, WsolaTiming};
use super::{ChainContext, Drain, Effect};
use std::collections::VecDeque;
use tuneshift_core::{Result, ShiftError, SignalDescriptor};

/// Frames of silence fed per step while flushing
const FLUSH_CHUNK_FRAMES: usize = 128;

/// Streaming WSOLA time-stretcher over interleaved samples
///
/// The output length is exactly `round(frames_in / factor)` frames once
/// [`Wsola::flush`] has been called.
#[derive(Debug)]
pub(crate) struct Wsola {
    factor: f64,
    channels: usize,
    segment: usize,
    search: usize,
    overlap: usize,
    process_size: usize,
    input: VecDeque<f32>,
    overlap_buf: Vec<f32>,
    segments_total: u64,
    skip_total: u64,
    frames_in: u64,
    frames_out: u64,
}

impl Wsola {
    pub(crate) fn new(factor: f64, timing: &WsolaTiming, sample_rate: u32, channels: usize) -> Self {
        let (segment, search, overlap) = timing.frames(sample_rate);
        let max_skip = (factor * (segment - overlap) as f64).ceil() as usize;
        let process_size = (max_skip + overlap).max(segment) + search;

        // Centre the first segment's search window on the first input frame
        let mut input = VecDeque::with_capacity(process_size * channels * 2);
        input.extend(std::iter::repeat(0.0).take(search / 2 * channels));

        Self {
            factor,
            channels,
            segment,
            search,
            overlap,
            process_size,
            input,
            overlap_buf: vec![0.0; overlap * channels],
            segments_total: 0,
            skip_total: 0,
            frames_in: 0,
            frames_out: 0,
        }
    }

    /// Frames fed so far
    pub(crate) fn frames_in(&self) -> u64 {
        self.frames_in
    }

    /// Frames the flushed output will contain for the input seen so far
    pub(crate) fn expected_frames(&self) -> u64 {
        (self.frames_in as f64 / self.factor).round() as u64
    }

    /// Feed interleaved samples, appending any finished output
    pub(crate) fn push(&mut self, samples: &[f32], out: &mut Vec<f32>) {
        self.frames_in += (samples.len() / self.channels) as u64;
        self.input.extend(samples.iter().copied());
        self.process(out);
    }

    /// Pad with silence until the output reaches its expected length
    pub(crate) fn flush(&mut self, out: &mut Vec<f32>) {
        let expected = self.expected_frames();
        if expected <= self.frames_out {
            return;
        }
        let remaining = (expected - self.frames_out) as usize * self.channels;

        let mut tail = Vec::with_capacity(remaining + self.segment * self.channels);
        let silence = vec![0.0; FLUSH_CHUNK_FRAMES * self.channels];
        while tail.len() < remaining {
            self.input.extend(silence.iter().copied());
            self.process(&mut tail);
        }
        tail.truncate(remaining);

        self.frames_out = expected;
        out.extend_from_slice(&tail);
    }

    fn process(&mut self, out: &mut Vec<f32>) {
        let ch = self.channels;
        let (segment, overlap) = (self.segment, self.overlap);

        while self.input.len() >= self.process_size * ch {
            let window: &[f32] = self.input.make_contiguous();

            let offset = if self.segments_total == 0 {
                self.search / 2
            } else {
                best_offset(window, &self.overlap_buf, ch, self.search)
            };
            let start = offset * ch;
            let head = &window[start..start + overlap * ch];

            if self.segments_total == 0 {
                out.extend_from_slice(head);
            } else {
                crossfade(&self.overlap_buf, head, ch, out);
            }
            out.extend_from_slice(&window[start + overlap * ch..start + (segment - overlap) * ch]);

            self.overlap_buf.clear();
            self.overlap_buf
                .extend_from_slice(&window[start + (segment - overlap) * ch..start + segment * ch]);
            self.frames_out += (segment - overlap) as u64;

            self.segments_total += 1;
            let target =
                (self.factor * (self.segments_total * (segment - overlap) as u64) as f64).round() as u64;
            let skip = (target - self.skip_total) as usize;
            self.skip_total = target;
            self.input.drain(..(skip * ch).min(self.input.len()));
        }
    }
}

/// Offset within the search range whose head is closest to `tail`
fn best_offset(window: &[f32], tail: &[f32], channels: usize, search: usize) -> usize {
    let mut best = 0;
    let mut least = f32::INFINITY;
    for offset in 0..search.max(1) {
        let start = offset * channels;
        let candidate = &window[start..start + tail.len()];
        let diff: f32 = candidate
            .iter()
            .zip(tail)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        if diff < least {
            least = diff;
            best = offset;
        }
    }
    best
}

/// Linear crossfade from `from` into `to`
fn crossfade(from: &[f32], to: &[f32], channels: usize, out: &mut Vec<f32>) {
    let frames = from.len() / channels;
    let step = 1.0 / frames as f32;
    for (i, (a, b)) in from.chunks_exact(channels).zip(to.chunks_exact(channels)).enumerate() {
        let fade_in = step * i as f32;
        let fade_out = 1.0 - fade_in;
        out.extend(a.iter().zip(b).map(|(x, y)| x * fade_out + y * fade_in));
    }
}

/// Changes tempo by a constant factor, leaving pitch unchanged
#[derive(Debug)]
pub(crate) struct TempoStage {
    params: TempoParams,
    engine: Option<Wsola>,
}

impl TempoStage {
    pub(crate) fn new(params: TempoParams) -> Self {
        Self {
            params,
            engine: None,
        }
    }
}

impl Effect for TempoStage {
    fn start(&mut self, _ctx: &ChainContext, signal: SignalDescriptor) -> Result<SignalDescriptor> {
        self.engine = Some(Wsola::new(
            self.params.factor,
            &self.params.timing,
            signal.sample_rate,
            signal.frame_len(),
        ));
        tracing::debug!(factor = self.params.factor, timing = ?self.params.timing, "tempo stage started");

        let frames = signal
            .frames()
            .map(|frames| (frames as f64 / self.params.factor).round() as u64);
        Ok(signal.with_length(frames.map(|f| f * u64::from(signal.channels))))
    }

    fn flow(&mut self, input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| ShiftError::flow("tempo stage used before start"))?;
        engine.push(input, output);
        Ok(())
    }

    fn drain(&mut self, output: &mut Vec<f32>) -> Result<Drain> {
        if let Some(engine) = self.engine.as_mut() {
            engine.flush(output);
        }
        Ok(Drain::Done)
    }

    fn stop(&mut self) -> Result<()> {
        self.engine = None;
        Ok(())
    }
}
