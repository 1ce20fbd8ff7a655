//! Shared fixtures for integration tests
//!
//! WAV inputs are generated on the fly with hound inside a temp directory.
#![allow(dead_code)]

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use tuneshift_audio::{
    ChainContext, Drain, Effect, OperationConfig, Result, ShiftError, StageArgs, StageKind,
    StageRegistry, StageRole,
};
use tuneshift_core::SignalDescriptor;

/// Write a WAV file where `sample(frame, channel)` yields values in [-1, 1]
pub fn write_wav(path: &Path, spec: WavSpec, frames: usize, sample: impl Fn(usize, u16) -> f32) {
    let mut writer = WavWriter::create(path, spec).expect("create fixture");
    for frame in 0..frames {
        for channel in 0..spec.channels {
            let value = sample(frame, channel).clamp(-1.0, 1.0);
            match spec.sample_format {
                SampleFormat::Float => writer.write_sample(value).unwrap(),
                SampleFormat::Int => {
                    let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                    let quantized = (value * scale).round().clamp(-scale, scale - 1.0) as i32;
                    writer.write_sample(quantized).unwrap();
                }
            }
        }
    }
    writer.finalize().unwrap();
}

/// 16-bit sine fixture, a different frequency per channel
pub fn sine_wav(dir: &Path, name: &str, sample_rate: u32, channels: u16, frames: usize) -> PathBuf {
    let path = dir.join(name);
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    write_wav(&path, spec, frames, |frame, channel| {
        let freq = 220.0 * f32::from(channel + 1);
        0.5 * (2.0 * std::f32::consts::PI * freq * frame as f32 / sample_rate as f32).sin()
    });
    path
}

/// 16-bit ramp fixture: every frame is distinct, channels are distinct
pub fn ramp_wav(dir: &Path, name: &str, channels: u16, frames: usize) -> PathBuf {
    let path = dir.join(name);
    let spec = WavSpec {
        channels,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    write_wav(&path, spec, frames, |frame, channel| {
        let value = (frame % 20_000) as f32 / 20_000.0;
        if channel == 0 {
            value
        } else {
            -value
        }
    });
    path
}

/// Spec and raw integer samples of a WAV file
pub fn read_int_samples(path: &Path) -> (WavSpec, Vec<i32>) {
    let mut reader = WavReader::open(path).expect("open output");
    let spec = reader.spec();
    let samples = reader.samples::<i32>().map(std::result::Result::unwrap).collect();
    (spec, samples)
}

/// Number of frames in a WAV file
pub fn frame_count(path: &Path) -> u32 {
    WavReader::open(path).expect("open output").duration()
}

/// Config with a scratch directory inside `dir`
pub fn config(dir: &Path) -> OperationConfig {
    OperationConfig::with_scratch_dir(dir.join("scratch"))
}

/// Entries directly under `dir`
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Transform that passes blocks through until `remaining` hits zero, then
/// fails the run the way a broken decoder or full disk would
struct FailAfter {
    remaining: usize,
}

impl Effect for FailAfter {
    fn start(&mut self, _ctx: &ChainContext, signal: SignalDescriptor) -> Result<SignalDescriptor> {
        Ok(signal)
    }

    fn flow(&mut self, input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        if self.remaining == 0 {
            return Err(ShiftError::flow("stage stopped mid-stream"));
        }
        self.remaining -= 1;
        output.extend_from_slice(input);
        Ok(())
    }

    fn drain(&mut self, _output: &mut Vec<f32>) -> Result<Drain> {
        Ok(Drain::Done)
    }
}

fn create_fail_after<'a>(_args: StageArgs<'a>) -> Result<Box<dyn Effect + 'a>> {
    Ok(Box::new(FailAfter { remaining: 2 }))
}

/// Built-in stages plus `fail`, a transform that errors on its third block
pub fn failing_registry() -> StageRegistry {
    let mut registry = StageRegistry::with_builtin_stages();
    registry.register(StageKind::new(
        "fail",
        StageRole::Transform,
        "",
        "Pass two blocks, then fail",
        create_fail_after,
    ));
    registry
}
