/// Property-based tests for operation arguments and signal preservation
mod common;

use common::{config, frame_count, sine_wav, write_wav};
use hound::{SampleFormat, WavSpec};
use proptest::prelude::*;
use tuneshift_audio::{convert, tempo, ErrorKind, InputStream};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn tempo_output_length_follows_factor(factor in 0.25f64..4.0, frames in 500usize..6_000) {
        let dir = tempfile::tempdir().unwrap();
        let input = sine_wav(dir.path(), "in.wav", 16_000, 1, frames);
        let output = dir.path().join("out.wav");
        let factor = format!("{factor:.3}");

        tempo(&input, &output, &factor, &config(dir.path())).unwrap();

        let parsed: f64 = factor.parse().unwrap();
        let expected = (frames as f64 / parsed).round() as u32;
        prop_assert_eq!(frame_count(&output), expected);
    }

    #[test]
    fn non_numeric_factors_are_rejected(factor in "[a-zA-Z_]{1,8}") {
        let dir = tempfile::tempdir().unwrap();
        let input = sine_wav(dir.path(), "in.wav", 8_000, 1, 100);
        let output = dir.path().join("out.wav");

        let err = tempo(&input, &output, &factor, &config(dir.path())).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::InvalidStageArgs);
        prop_assert!(!output.exists());
    }

    #[test]
    fn convert_preserves_layout(
        sample_rate in prop::sample::select(vec![8_000u32, 22_050, 44_100, 96_000]),
        channels in 1u16..=4,
        bits in prop::sample::select(vec![16u16, 24]),
        frames in 1usize..3_000,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let spec = WavSpec { channels, sample_rate, bits_per_sample: bits, sample_format: SampleFormat::Int };
        write_wav(&input, spec, frames, |frame, channel| ((frame * 7 + usize::from(channel) * 13) % 101) as f32 / 101.0 - 0.5);
        let output = dir.path().join("out.wav");

        convert(&input, &output, &config(dir.path())).unwrap();

        let source = InputStream::open(&input).unwrap();
        let written = InputStream::open(&output).unwrap();
        prop_assert_eq!(source.signal(), written.signal());
        source.close();
        written.close();
    }
}
