//! Decoding input stream backed by Symphonia

use super::extension_of;
use crate::runtime::LEDGER;
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_NULL, CODEC_TYPE_PCM_F32BE,
    CODEC_TYPE_PCM_F32LE, CODEC_TYPE_PCM_F64BE, CODEC_TYPE_PCM_F64LE,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::SampleFormat as CodecSampleFormat;
use tuneshift_core::{EncodingDescriptor, Result, SampleFormat, ShiftError, SignalDescriptor};

/// Precision reported for codecs that do not carry a sample width (MP3, AAC, Vorbis)
///
/// Lossy decoders produce float samples with no source width. The descriptor
/// still reports 16-bit integer so converting a lossy file writes CD-style
/// PCM instead of 32-bit float.
const LOSSY_PRECISION: u16 = 16;

/// An open media file being decoded
///
/// Samples are produced as interleaved `f32` in `[-1.0, 1.0)`.
pub struct InputStream {
    path: PathBuf,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    signal: SignalDescriptor,
    encoding: EncodingDescriptor,
    sample_buf: Option<SampleBuffer<f32>>,
    sample_buf_frames: usize,
    samples_read: u64,
    finished: bool,
    closed: bool,
}

impl InputStream {
    /// Open `path` for reading
    ///
    /// # Errors
    /// `CannotOpenInput` when the file cannot be opened, its container is not
    /// recognised, it has no decodable track, or the track does not report a
    /// sample rate and channel layout.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ShiftError::cannot_open_input(path, e))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| ShiftError::cannot_open_input(path, format!("unrecognised format: {e}")))?;

        let format = probed.format;

        let track = format
            .default_track()
            .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .or_else(|| {
                format
                    .tracks()
                    .iter()
                    .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            })
            .ok_or_else(|| ShiftError::cannot_open_input(path, "no audio track"))?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let signal = describe_signal(&params)
            .ok_or_else(|| ShiftError::cannot_open_input(path, "missing sample rate or channel layout"))?;
        let encoding = describe_encoding(path, &params);

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| ShiftError::cannot_open_input(path, format!("no decoder: {e}")))?;

        LEDGER.stream_opened();
        tracing::debug!(path = %path.display(), %signal, %encoding, "input stream opened");

        Ok(Self {
            path: path.to_path_buf(),
            format,
            decoder,
            track_id,
            signal,
            encoding,
            sample_buf: None,
            sample_buf_frames: 0,
            samples_read: 0,
            finished: false,
            closed: false,
        })
    }

    /// Path this stream reads from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Signal characteristics of the decoded samples
    pub fn signal(&self) -> &SignalDescriptor {
        &self.signal
    }

    /// Container and codec of the file
    pub fn encoding(&self) -> &EncodingDescriptor {
        &self.encoding
    }

    /// Interleaved samples produced so far
    pub fn samples_read(&self) -> u64 {
        self.samples_read
    }

    /// Decode the next packet and append its samples to `out`
    ///
    /// Returns the number of samples appended; `0` means end of stream.
    /// Corrupt packets are skipped with a warning.
    ///
    /// # Errors
    /// `FlowFailed` on I/O errors or unrecoverable decoder errors.
    pub fn read_block(&mut self, out: &mut Vec<f32>) -> Result<usize> {
        if self.finished {
            return Ok(0);
        }

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.finished = true;
                    return Ok(0);
                }
                Err(SymphoniaError::ResetRequired) => {
                    // Chained streams with a new layout are not followed
                    tracing::debug!(path = %self.path.display(), "stream reset, treating as end of stream");
                    self.finished = true;
                    return Ok(0);
                }
                Err(e) => {
                    return Err(ShiftError::flow(format!(
                        "reading {}: {e}",
                        self.path.display()
                    )));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!(path = %self.path.display(), "skipping corrupt packet: {e}");
                    continue;
                }
                Err(e) => {
                    return Err(ShiftError::flow(format!(
                        "decoding {}: {e}",
                        self.path.display()
                    )));
                }
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            if spec.channels.count() != self.signal.frame_len() {
                return Err(ShiftError::flow(format!(
                    "{}: channel count changed from {} to {}",
                    self.path.display(),
                    self.signal.channels,
                    spec.channels.count()
                )));
            }

            if self.sample_buf.is_none() || self.sample_buf_frames < decoded.capacity() {
                self.sample_buf_frames = decoded.capacity();
                self.sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = self.sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            let samples = buf.samples();
            out.extend_from_slice(samples);
            self.samples_read += samples.len() as u64;
            return Ok(samples.len());
        }
    }

    /// Release the stream
    pub fn close(mut self) {
        self.closed = true;
        tracing::debug!(
            path = %self.path.display(),
            samples = self.samples_read,
            "input stream closed"
        );
    }
}

impl Drop for InputStream {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(path = %self.path.display(), "input stream dropped without close");
        }
        LEDGER.stream_closed();
    }
}

impl std::fmt::Debug for InputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputStream")
            .field("path", &self.path)
            .field("signal", &self.signal)
            .field("encoding", &self.encoding)
            .field("samples_read", &self.samples_read)
            .finish_non_exhaustive()
    }
}

fn describe_signal(params: &CodecParameters) -> Option<SignalDescriptor> {
    let sample_rate = params.sample_rate.filter(|&rate| rate > 0)?;
    let channels = params
        .channels
        .map(|c| c.count())
        .filter(|&count| count > 0)?;
    let channels = u16::try_from(channels).ok()?;

    let (sample_format, precision) = describe_samples(params);
    let length = params.n_frames.map(|frames| frames * u64::from(channels));

    Some(SignalDescriptor::new(sample_rate, channels, sample_format, precision).with_length(length))
}

fn describe_samples(params: &CodecParameters) -> (SampleFormat, u16) {
    let bits = params
        .bits_per_sample
        .and_then(|bits| u16::try_from(bits).ok());

    match params.sample_format {
        Some(CodecSampleFormat::F32) => (SampleFormat::Float, 32),
        Some(CodecSampleFormat::F64) => (SampleFormat::Float, 64),
        Some(other) => (SampleFormat::Int, bits.unwrap_or_else(|| int_width(other))),
        None if is_float_pcm(params) => (SampleFormat::Float, bits.unwrap_or(32)),
        // A width from the container wins over the lossy default
        None => (SampleFormat::Int, bits.unwrap_or(LOSSY_PRECISION)),
    }
}

fn int_width(format: CodecSampleFormat) -> u16 {
    match format {
        CodecSampleFormat::U8 | CodecSampleFormat::S8 => 8,
        CodecSampleFormat::U16 | CodecSampleFormat::S16 => 16,
        CodecSampleFormat::U24 | CodecSampleFormat::S24 => 24,
        CodecSampleFormat::U32 | CodecSampleFormat::S32 => 32,
        CodecSampleFormat::F32 => 32,
        CodecSampleFormat::F64 => 64,
    }
}

fn is_float_pcm(params: &CodecParameters) -> bool {
    [
        CODEC_TYPE_PCM_F32LE,
        CODEC_TYPE_PCM_F32BE,
        CODEC_TYPE_PCM_F64LE,
        CODEC_TYPE_PCM_F64BE,
    ]
    .contains(&params.codec)
}

fn describe_encoding(path: &Path, params: &CodecParameters) -> EncodingDescriptor {
    let codec = symphonia::default::get_codecs()
        .get_codec(params.codec)
        .map_or_else(|| "unknown".to_string(), |d| d.short_name.to_string());
    let lossless = codec.starts_with("pcm") || matches!(codec.as_str(), "flac" | "alac");

    EncodingDescriptor {
        container: extension_of(path),
        bits_per_sample: params.bits_per_sample,
        lossless,
        codec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat as WavFormat, WavSpec, WavWriter};

    fn write_wav(path: &Path, spec: WavSpec, frames: usize) {
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..frames * spec.channels as usize {
            match spec.sample_format {
                WavFormat::Int => writer.write_sample((i % 200) as i16 - 100).unwrap(),
                WavFormat::Float => writer.write_sample((i % 200) as f32 / 400.0).unwrap(),
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn opens_int_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: WavFormat::Int,
        };
        write_wav(&path, spec, 1000);

        let mut input = InputStream::open(&path).unwrap();
        assert_eq!(input.signal().sample_rate, 22_050);
        assert_eq!(input.signal().channels, 2);
        assert_eq!(input.signal().sample_format, SampleFormat::Int);
        assert_eq!(input.signal().precision, 16);
        assert_eq!(input.signal().length, Some(2000));
        assert_eq!(input.encoding().codec, "pcm_s16le");
        assert_eq!(input.encoding().container, "wav");
        assert!(input.encoding().lossless);

        let mut samples = Vec::new();
        while input.read_block(&mut samples).unwrap() > 0 {}
        assert_eq!(samples.len(), 2000);
        assert_eq!(input.samples_read(), 2000);
        // End of stream is sticky
        assert_eq!(input.read_block(&mut samples).unwrap(), 0);
        input.close();
    }

    #[test]
    fn opens_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 32,
            sample_format: WavFormat::Float,
        };
        write_wav(&path, spec, 64);

        let input = InputStream::open(&path).unwrap();
        assert_eq!(input.signal().sample_format, SampleFormat::Float);
        assert_eq!(input.signal().precision, 32);
        input.close();
    }

    #[test]
    fn lossy_codecs_default_to_sixteen_bits() {
        let mut params = CodecParameters::new();
        params.for_codec(symphonia::core::codecs::CODEC_TYPE_MP3);
        assert_eq!(describe_samples(&params), (SampleFormat::Int, LOSSY_PRECISION));

        params.with_bits_per_sample(24);
        assert_eq!(describe_samples(&params), (SampleFormat::Int, 24));
    }

    #[test]
    fn float_pcm_without_sample_format() {
        let mut params = CodecParameters::new();
        params.for_codec(CODEC_TYPE_PCM_F64LE);
        assert_eq!(describe_samples(&params), (SampleFormat::Float, 32));

        params.with_bits_per_sample(64);
        assert_eq!(describe_samples(&params), (SampleFormat::Float, 64));
    }

    #[test]
    fn missing_file_is_cannot_open_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = InputStream::open(dir.path().join("absent.wav")).unwrap_err();
        assert_eq!(err.kind(), tuneshift_core::ErrorKind::CannotOpenInput);
    }

    #[test]
    fn garbage_is_cannot_open_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        let err = InputStream::open(&path).unwrap_err();
        assert_eq!(err.kind(), tuneshift_core::ErrorKind::CannotOpenInput);
    }
}
