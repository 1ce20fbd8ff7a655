//! Signal and encoding descriptors
use serde::{Deserialize, Serialize};
use std::fmt;

/// How individual samples are represented on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Signed/unsigned integer PCM
    Int,
    /// IEEE floating point PCM
    Float,
}

/// Raw audio characteristics flowing between stages
///
/// Taken from the input stream and, unless a stage changes it, reused for
/// every stage boundary and for the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDescriptor {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo, etc.)
    pub channels: u16,

    /// Integer or float samples
    pub sample_format: SampleFormat,

    /// Bits of precision per sample
    pub precision: u16,

    /// Total interleaved samples, when the container reports it
    #[serde(default)]
    pub length: Option<u64>,
}

impl SignalDescriptor {
    /// Create a descriptor of unknown length
    #[must_use]
    pub fn new(sample_rate: u32, channels: u16, sample_format: SampleFormat, precision: u16) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
            precision,
            length: None,
        }
    }

    /// CD quality stereo (44.1kHz, 16-bit integer)
    pub fn cd_quality() -> Self {
        Self::new(44_100, 2, SampleFormat::Int, 16)
    }

    /// Same descriptor with a known total length in interleaved samples
    #[must_use]
    pub fn with_length(mut self, length: Option<u64>) -> Self {
        self.length = length;
        self
    }

    /// Samples per frame
    pub fn frame_len(&self) -> usize {
        usize::from(self.channels)
    }

    /// Number of frames, when the length is known
    pub fn frames(&self) -> Option<u64> {
        match self.channels {
            0 => None,
            ch => self.length.map(|len| len / u64::from(ch)),
        }
    }

    /// Duration in seconds, when the length is known
    pub fn duration_secs(&self) -> Option<f64> {
        if self.sample_rate == 0 {
            return None;
        }
        self.frames()
            .map(|frames| frames as f64 / f64::from(self.sample_rate))
    }

    /// Whether two descriptors describe the same sample stream layout,
    /// ignoring length
    pub fn same_layout(&self, other: &Self) -> bool {
        self.sample_rate == other.sample_rate
            && self.channels == other.channels
            && self.sample_format == other.sample_format
            && self.precision == other.precision
    }
}

impl fmt::Display for SignalDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = match self.sample_format {
            SampleFormat::Int => "int",
            SampleFormat::Float => "float",
        };
        write!(
            f,
            "{} Hz, {} ch, {}-bit {}",
            self.sample_rate, self.channels, self.precision, format
        )
    }
}

/// Container/codec metadata attached to a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingDescriptor {
    /// Short codec name (e.g. "pcm_s16le", "mp3", "flac")
    pub codec: String,

    /// Container, as the lowercase file extension (e.g. "wav")
    pub container: String,

    /// Bits per encoded sample, for codecs that have a fixed width
    pub bits_per_sample: Option<u32>,

    /// Whether decoding yields the exact samples that were encoded
    pub lossless: bool,
}

impl EncodingDescriptor {
    /// PCM encoding in a WAV container matching `signal`
    pub fn wav_pcm(signal: &SignalDescriptor) -> Self {
        let codec = match signal.sample_format {
            SampleFormat::Int if signal.precision <= 8 => "pcm_u8".to_string(),
            SampleFormat::Int => format!("pcm_s{}le", signal.precision),
            SampleFormat::Float => format!("pcm_f{}le", signal.precision),
        };
        Self {
            codec,
            container: "wav".to_string(),
            bits_per_sample: Some(u32::from(signal.precision)),
            lossless: true,
        }
    }

    /// Native FLAC stream matching `signal`
    pub fn flac(signal: &SignalDescriptor) -> Self {
        Self {
            codec: "flac".to_string(),
            container: "flac".to_string(),
            bits_per_sample: Some(u32::from(signal.precision)),
            lossless: true,
        }
    }
}

impl fmt::Display for EncodingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.codec, self.container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn cd_quality_layout() {
        let signal = SignalDescriptor::cd_quality();
        assert_eq!(signal.sample_rate, 44_100);
        assert_eq!(signal.frame_len(), 2);
        assert_eq!(signal.frames(), None);
    }

    #[test]
    fn duration_from_length() {
        // 88200 samples with 2 channels = 44100 frames = 1 second
        let signal = SignalDescriptor::cd_quality().with_length(Some(88_200));
        assert_eq!(signal.frames(), Some(44_100));
        assert!((signal.duration_secs().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn same_layout_ignores_length() {
        let a = SignalDescriptor::cd_quality().with_length(Some(10));
        let b = SignalDescriptor::cd_quality();
        assert!(a.same_layout(&b));
        assert_ne!(a, b);

        let float = SignalDescriptor::new(44_100, 2, SampleFormat::Float, 32);
        assert!(!a.same_layout(&float));
    }

    #[test]
    fn wav_codec_names() {
        let s16 = EncodingDescriptor::wav_pcm(&SignalDescriptor::cd_quality());
        assert_eq!(s16.codec, "pcm_s16le");
        assert_eq!(s16.container, "wav");

        let u8 = EncodingDescriptor::wav_pcm(&SignalDescriptor::new(8000, 1, SampleFormat::Int, 8));
        assert_eq!(u8.codec, "pcm_u8");

        let f32 = EncodingDescriptor::wav_pcm(&SignalDescriptor::new(48_000, 2, SampleFormat::Float, 32));
        assert_eq!(f32.codec, "pcm_f32le");
    }

    #[test]
    fn flac_keeps_precision() {
        let flac = EncodingDescriptor::flac(&SignalDescriptor::new(96_000, 2, SampleFormat::Int, 24));
        assert_eq!(flac.to_string(), "flac in flac");
        assert_eq!(flac.bits_per_sample, Some(24));
        assert!(flac.lossless);
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(
            SignalDescriptor::cd_quality().to_string(),
            "44100 Hz, 2 ch, 16-bit int"
        );
    }

    proptest! {
        /// Frames times channels never exceeds the reported length
        #[test]
        fn frames_never_exceed_length(channels in 1u16..16, length in 0u64..10_000_000) {
            let signal = SignalDescriptor::new(48_000, channels, SampleFormat::Int, 16)
                .with_length(Some(length));
            let frames = signal.frames().unwrap();
            prop_assert!(frames * u64::from(channels) <= length);
            prop_assert!(length - frames * u64::from(channels) < u64::from(channels));
        }
    }
}
