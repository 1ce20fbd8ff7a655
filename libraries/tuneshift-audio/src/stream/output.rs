//! Encoding output stream backed by hound and flacenc
//!
//! Samples go to a hidden temporary file next to the destination. The
//! destination path is only created (or replaced) when [`OutputStream::close`]
//! succeeds, so a failed invocation leaves it untouched.

use super::extension_of;
use crate::runtime::LEDGER;
use flacenc::component::BitRepr;
use flacenc::error::Verify;
use hound::{WavSpec, WavWriter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tuneshift_core::{EncodingDescriptor, Result, SampleFormat, ShiftError, SignalDescriptor};

/// Containers the output stream can encode
const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "wave", "flac"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Wav,
    Flac,
}

impl Container {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "wav" | "wave" => Some(Self::Wav),
            "flac" => Some(Self::Flac),
            _ => None,
        }
    }
}

enum Encoder {
    Wav(WavWriter<BufWriter<File>>),
    /// FLAC frames are encoded in one pass when the stream is closed
    Flac { file: File, samples: Vec<i32> },
}

/// An open WAV or FLAC file being encoded
pub struct OutputStream {
    encoder: Option<Encoder>,
    temp: Option<NamedTempFile>,
    path: PathBuf,
    signal: SignalDescriptor,
    encoding: EncodingDescriptor,
    samples_written: u64,
    closed: bool,
}

impl OutputStream {
    /// Open `path` for writing samples described by `signal`
    ///
    /// The container is chosen from the extension: `.wav`/`.wave` or
    /// `.flac`. Integer precision is rounded up to 8, 16, 24 or 32 bits and
    /// WAV float output is 32-bit. FLAC stores integers only, at most 24 bits,
    /// so float or wider signals are written as 24-bit.
    ///
    /// # Errors
    /// `CannotOpenOutput` when the extension has no encoder, the signal has
    /// no channels or sample rate, the path is a directory, or the
    /// destination directory is missing or not writable.
    pub fn open(path: impl AsRef<Path>, signal: &SignalDescriptor) -> Result<Self> {
        let path = path.as_ref();

        let ext = extension_of(path);
        let Some(container) = Container::from_extension(&ext) else {
            return Err(ShiftError::cannot_open_output(
                path,
                format!(
                    "no encoder for extension '{ext}' (supported: {})",
                    SUPPORTED_EXTENSIONS.join(", ")
                ),
            ));
        };
        if signal.channels == 0 || signal.sample_rate == 0 {
            return Err(ShiftError::cannot_open_output(
                path,
                format!("unusable signal ({signal})"),
            ));
        }
        if path.is_dir() {
            return Err(ShiftError::cannot_open_output(path, "path is a directory"));
        }

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !parent.is_dir() {
            return Err(ShiftError::cannot_open_output(
                path,
                format!("directory {} does not exist", parent.display()),
            ));
        }

        let out_signal = output_signal(signal, container);
        let temp = tempfile::Builder::new()
            .prefix(".tuneshift-")
            .suffix(".part")
            .tempfile_in(parent)
            .map_err(|e| ShiftError::cannot_open_output(path, e))?;
        let file = temp
            .as_file()
            .try_clone()
            .map_err(|e| ShiftError::cannot_open_output(path, e))?;

        let (encoder, encoding) = match container {
            Container::Wav => {
                let writer = WavWriter::new(BufWriter::new(file), wav_spec(&out_signal))
                    .map_err(|e| ShiftError::cannot_open_output(path, e))?;
                (Encoder::Wav(writer), EncodingDescriptor::wav_pcm(&out_signal))
            }
            Container::Flac => (
                Encoder::Flac {
                    file,
                    samples: Vec::new(),
                },
                EncodingDescriptor::flac(&out_signal),
            ),
        };

        LEDGER.stream_opened();
        tracing::debug!(path = %path.display(), signal = %out_signal, %encoding, "output stream opened");

        Ok(Self {
            encoder: Some(encoder),
            temp: Some(temp),
            path: path.to_path_buf(),
            signal: out_signal,
            encoding,
            samples_written: 0,
            closed: false,
        })
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Signal characteristics as encoded
    pub fn signal(&self) -> &SignalDescriptor {
        &self.signal
    }

    /// Container and codec being written
    pub fn encoding(&self) -> &EncodingDescriptor {
        &self.encoding
    }

    /// Interleaved samples written so far
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Encode interleaved samples
    ///
    /// # Errors
    /// `FlowFailed` when the underlying file cannot be written.
    pub fn write(&mut self, samples: &[f32]) -> Result<()> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(ShiftError::flow("output stream already finalized"));
        };

        match encoder {
            Encoder::Wav(writer) => {
                let result = match self.signal.sample_format {
                    SampleFormat::Float => {
                        samples.iter().try_for_each(|&s| writer.write_sample(s))
                    }
                    SampleFormat::Int => {
                        let scale = int_scale(&self.signal);
                        samples
                            .iter()
                            .try_for_each(|&s| writer.write_sample(quantize(s, scale)))
                    }
                };
                result.map_err(|e| {
                    ShiftError::flow(format!("writing {}: {e}", self.path.display()))
                })?;
            }
            Encoder::Flac { samples: pending, .. } => {
                let scale = int_scale(&self.signal);
                pending.extend(samples.iter().map(|&s| quantize(s, scale)));
            }
        }

        self.samples_written += samples.len() as u64;
        Ok(())
    }

    /// Finalize the file and move it into place
    ///
    /// # Errors
    /// `FlowFailed` when the file cannot be finalized, `CannotOpenOutput`
    /// when the destination cannot be replaced. The temporary file is removed
    /// either way.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;

        match self.encoder.take() {
            Some(Encoder::Wav(writer)) => writer.finalize().map_err(|e| {
                ShiftError::flow(format!("finalizing {}: {e}", self.path.display()))
            })?,
            Some(Encoder::Flac { file, samples }) => {
                encode_flac(file, &samples, &self.signal).map_err(|e| {
                    ShiftError::flow(format!("finalizing {}: {e}", self.path.display()))
                })?;
            }
            None => {}
        }
        if let Some(temp) = self.temp.take() {
            temp.persist(&self.path)
                .map_err(|e| ShiftError::cannot_open_output(&self.path, e.error))?;
        }

        tracing::debug!(
            path = %self.path.display(),
            samples = self.samples_written,
            "output stream closed"
        );
        Ok(())
    }

    /// Release the stream without creating the destination
    pub fn discard(mut self) {
        self.closed = true;
        drop(self.encoder.take());
        if let Some(temp) = self.temp.take() {
            if let Err(e) = temp.close() {
                tracing::warn!(path = %self.path.display(), "failed to remove partial output: {e}");
            }
        }
        tracing::debug!(path = %self.path.display(), "output stream discarded");
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(path = %self.path.display(), "output stream dropped without close, discarding");
        }
        LEDGER.stream_closed();
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("path", &self.path)
            .field("signal", &self.signal)
            .field("encoding", &self.encoding)
            .field("samples_written", &self.samples_written)
            .finish_non_exhaustive()
    }
}

/// Signal as the encoder for `container` will store it
fn output_signal(signal: &SignalDescriptor, container: Container) -> SignalDescriptor {
    let (sample_format, precision) = match (container, signal.sample_format) {
        (Container::Wav, SampleFormat::Float) => (SampleFormat::Float, 32),
        (Container::Flac, SampleFormat::Float) => (SampleFormat::Int, 24),
        (_, SampleFormat::Int) => {
            let precision = match signal.precision {
                0..=8 => 8,
                9..=16 => 16,
                17..=24 => 24,
                _ => 32,
            };
            match container {
                Container::Flac => (SampleFormat::Int, precision.min(24)),
                Container::Wav => (SampleFormat::Int, precision),
            }
        }
    };
    SignalDescriptor {
        sample_format,
        precision,
        length: None,
        ..*signal
    }
}

fn wav_spec(signal: &SignalDescriptor) -> WavSpec {
    WavSpec {
        channels: signal.channels,
        sample_rate: signal.sample_rate,
        bits_per_sample: signal.precision,
        sample_format: match signal.sample_format {
            SampleFormat::Int => hound::SampleFormat::Int,
            SampleFormat::Float => hound::SampleFormat::Float,
        },
    }
}

fn int_scale(signal: &SignalDescriptor) -> f64 {
    f64::from(1u32 << (signal.precision - 1))
}

fn quantize(sample: f32, scale: f64) -> i32 {
    (f64::from(sample) * scale).round().clamp(-scale, scale - 1.0) as i32
}

/// Encode buffered samples as a native FLAC stream into `file`
///
/// Errors are returned as plain messages; the caller adds the path.
fn encode_flac(
    mut file: File,
    samples: &[i32],
    signal: &SignalDescriptor,
) -> std::result::Result<(), String> {
    let config = flacenc::config::Encoder::default()
        .into_verified()
        .map_err(|(_, e)| format!("encoder config: {e}"))?;
    let source = flacenc::source::MemSource::from_samples(
        samples,
        usize::from(signal.channels),
        usize::from(signal.precision),
        signal.sample_rate as usize,
    );
    let stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
        .map_err(|e| format!("encoding: {e:?}"))?;

    let mut sink = flacenc::bitsink::ByteSink::new();
    stream
        .write(&mut sink)
        .map_err(|e| format!("bitstream: {e:?}"))?;
    file.write_all(sink.as_slice()).map_err(|e| e.to_string())?;
    file.flush().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp3");
        let err = OutputStream::open(&path, &SignalDescriptor::cd_quality()).unwrap_err();
        assert_eq!(err.kind(), tuneshift_core::ErrorKind::CannotOpenOutput);
        assert!(!path.exists());
    }

    #[test]
    fn rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.wav");
        let err = OutputStream::open(&path, &SignalDescriptor::cd_quality()).unwrap_err();
        assert_eq!(err.kind(), tuneshift_core::ErrorKind::CannotOpenOutput);
    }

    #[test]
    fn rejects_directory_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken.wav");
        std::fs::create_dir(&path).unwrap();
        let err = OutputStream::open(&path, &SignalDescriptor::cd_quality()).unwrap_err();
        assert_eq!(err.kind(), tuneshift_core::ErrorKind::CannotOpenOutput);
        // No partial file was created next to it
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn destination_replaced_by_directory_fails_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut output = OutputStream::open(&path, &SignalDescriptor::cd_quality()).unwrap();
        output.write(&[0.25; 16]).unwrap();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"x").unwrap();

        let err = output.close().unwrap_err();
        assert_eq!(err.kind(), tuneshift_core::ErrorKind::CannotOpenOutput);
        assert!(path.join("keep").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn flac_output_decodes_to_same_signal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.flac");
        let signal = SignalDescriptor::new(48_000, 2, SampleFormat::Int, 24);
        let mut output = OutputStream::open(&path, &signal).unwrap();
        assert_eq!(output.encoding().codec, "flac");

        let samples: Vec<f32> = (0..4000).map(|i| ((i % 100) as f32 - 50.0) / 128.0).collect();
        output.write(&samples).unwrap();
        assert!(!path.exists());
        output.close().unwrap();

        let mut input = crate::stream::InputStream::open(&path).unwrap();
        assert!(input.signal().same_layout(&signal));
        assert_eq!(input.signal().length, Some(4000));
        assert_eq!(input.encoding().codec, "flac");
        let mut decoded = Vec::new();
        while input.read_block(&mut decoded).unwrap() > 0 {}
        input.close();
        // Lossless at 24 bits
        for (a, b) in samples.iter().zip(&decoded) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
        assert_eq!(decoded.len(), samples.len());
    }

    #[test]
    fn destination_appears_only_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.WAV");
        let mut output = OutputStream::open(&path, &SignalDescriptor::cd_quality()).unwrap();
        output.write(&[0.0, 0.5, -0.5, 0.25]).unwrap();
        assert!(!path.exists());
        output.close().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 16384, -16384, 8192]);
        // Only the destination remains in the directory
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn discard_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut output = OutputStream::open(&path, &SignalDescriptor::cd_quality()).unwrap();
        output.write(&[0.1; 64]).unwrap();
        output.discard();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn discard_keeps_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        std::fs::write(&path, b"previous").unwrap();
        let output = OutputStream::open(&path, &SignalDescriptor::cd_quality()).unwrap();
        output.discard();
        assert_eq!(std::fs::read(&path).unwrap(), b"previous");
    }

    #[test]
    fn precision_is_rounded_to_container_widths() {
        let odd = SignalDescriptor::new(44_100, 1, SampleFormat::Int, 20);
        assert_eq!(output_signal(&odd, Container::Wav).precision, 24);
        let double = SignalDescriptor::new(44_100, 1, SampleFormat::Float, 64);
        assert_eq!(output_signal(&double, Container::Wav).precision, 32);
    }

    #[test]
    fn flac_stores_integers_up_to_24_bits() {
        let float = SignalDescriptor::new(44_100, 2, SampleFormat::Float, 32);
        let flac = output_signal(&float, Container::Flac);
        assert_eq!((flac.sample_format, flac.precision), (SampleFormat::Int, 24));

        let wide = SignalDescriptor::new(44_100, 2, SampleFormat::Int, 32);
        assert_eq!(output_signal(&wide, Container::Flac).precision, 24);
        let cd = SignalDescriptor::cd_quality();
        assert_eq!(output_signal(&cd, Container::Flac).precision, 16);
    }

    #[test]
    fn quantize_clamps_full_scale() {
        let scale = 32768.0;
        assert_eq!(quantize(1.0, scale), 32767);
        assert_eq!(quantize(-1.0, scale), -32768);
        assert_eq!(quantize(1.5, scale), 32767);
    }
}
