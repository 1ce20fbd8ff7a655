//! Parsing and validation of textual stage parameters

use tuneshift_core::{Result, ShiftError};

/// Accepted tempo factors
pub(crate) const TEMPO_RANGE: (f64, f64) = (0.1, 10.0);

/// Accepted pitch shifts in cents (two octaves either way)
pub(crate) const PITCH_RANGE: (f64, f64) = (-2400.0, 2400.0);

/// Window lengths of the time-stretcher, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WsolaTiming {
    /// Length of each processed segment
    pub segment_ms: f64,
    /// How far either side of the nominal position to look for a match
    pub search_ms: f64,
    /// Length of the crossfade between segments
    pub overlap_ms: f64,
}

impl Default for WsolaTiming {
    fn default() -> Self {
        Self {
            segment_ms: 82.0,
            search_ms: 14.68,
            overlap_ms: 12.0,
        }
    }
}

impl WsolaTiming {
    /// Convert to frame counts at `sample_rate`
    ///
    /// Returns `(segment, search, overlap)`; the overlap is at least one
    /// frame and at most half a segment.
    pub(crate) fn frames(&self, sample_rate: u32) -> (usize, usize, usize) {
        let to_frames = |ms: f64| (f64::from(sample_rate) * ms / 1000.0).round() as usize;
        let segment = to_frames(self.segment_ms).max(2);
        let search = to_frames(self.search_ms);
        let overlap = to_frames(self.overlap_ms).clamp(1, segment / 2);
        (segment, search, overlap)
    }
}

/// Parsed `tempo` arguments
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TempoParams {
    pub factor: f64,
    pub timing: WsolaTiming,
}

/// Parsed `pitch` arguments
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PitchParams {
    pub cents: f64,
    pub timing: WsolaTiming,
}

/// `factor [segment-ms [search-ms [overlap-ms]]]`
pub(crate) fn parse_tempo(args: &[String]) -> Result<TempoParams> {
    let (first, rest) = args
        .split_first()
        .ok_or_else(|| ShiftError::invalid_args("tempo", "missing tempo factor"))?;
    let factor = parse_in_range("tempo", "factor", first, TEMPO_RANGE)?;
    let timing = parse_timing("tempo", rest)?;
    Ok(TempoParams { factor, timing })
}

/// `cents [segment-ms [search-ms [overlap-ms]]]`
pub(crate) fn parse_pitch(args: &[String]) -> Result<PitchParams> {
    let (first, rest) = args
        .split_first()
        .ok_or_else(|| ShiftError::invalid_args("pitch", "missing pitch shift in cents"))?;
    let cents = parse_in_range("pitch", "shift", first, PITCH_RANGE)?;
    let timing = parse_timing("pitch", rest)?;
    Ok(PitchParams { cents, timing })
}

/// Stages that take no parameters
pub(crate) fn expect_none(stage: &str, args: &[String]) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ShiftError::invalid_args(
            stage,
            format!("takes no arguments, got {args:?}"),
        ))
    }
}

fn parse_timing(stage: &str, args: &[String]) -> Result<WsolaTiming> {
    if args.len() > 3 {
        return Err(ShiftError::invalid_args(
            stage,
            format!("too many arguments: {}", args.len() + 1),
        ));
    }

    let mut timing = WsolaTiming::default();
    if let Some(arg) = args.first() {
        timing.segment_ms = parse_in_range(stage, "segment-ms", arg, (10.0, 500.0))?;
    }
    if let Some(arg) = args.get(1) {
        timing.search_ms = parse_in_range(stage, "search-ms", arg, (0.0, 100.0))?;
    }
    if let Some(arg) = args.get(2) {
        timing.overlap_ms = parse_in_range(stage, "overlap-ms", arg, (0.1, 100.0))?;
    }
    if timing.overlap_ms * 2.0 > timing.segment_ms {
        return Err(ShiftError::invalid_args(
            stage,
            format!(
                "overlap-ms {} must be at most half of segment-ms {}",
                timing.overlap_ms, timing.segment_ms
            ),
        ));
    }
    Ok(timing)
}

fn parse_in_range(stage: &str, what: &str, arg: &str, (min, max): (f64, f64)) -> Result<f64> {
    let value: f64 = arg
        .trim()
        .parse()
        .map_err(|_| ShiftError::invalid_args(stage, format!("{what} '{arg}' is not a number")))?;
    if !value.is_finite() || value < min || value > max {
        return Err(ShiftError::invalid_args(
            stage,
            format!("{what} {arg} is outside {min}..={max}"),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tuneshift_core::ErrorKind;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn tempo_defaults() {
        let params = parse_tempo(&args(&["1.5"])).unwrap();
        assert_eq!(params.factor, 1.5);
        assert_eq!(params.timing, WsolaTiming::default());
    }

    #[test]
    fn tempo_with_timing() {
        let params = parse_tempo(&args(&["0.5", "60", "10", "8"])).unwrap();
        assert_eq!(params.timing.segment_ms, 60.0);
        assert_eq!(params.timing.search_ms, 10.0);
        assert_eq!(params.timing.overlap_ms, 8.0);
    }

    #[test]
    fn rejects_bad_values() {
        for bad in [
            args(&[]),
            args(&["abc"]),
            args(&[""]),
            args(&["NaN"]),
            args(&["inf"]),
            args(&["0"]),
            args(&["-1"]),
            args(&["11"]),
            args(&["1", "20", "5", "30"]),
            args(&["1", "82", "14", "12", "extra"]),
        ] {
            let err = parse_tempo(&bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidStageArgs, "{bad:?}");
        }
    }

    #[test]
    fn error_names_stage_and_value() {
        let err = parse_pitch(&args(&["up"])).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("pitch"), "{message}");
        assert!(message.contains("up"), "{message}");
    }

    #[test]
    fn pitch_accepts_negative_shift() {
        assert_eq!(parse_pitch(&args(&["-1200"])).unwrap().cents, -1200.0);
        assert!(parse_pitch(&args(&["2401"])).is_err());
    }

    #[test]
    fn expect_none_rejects_arguments() {
        assert!(expect_none("reverse", &[]).is_ok());
        assert!(expect_none("reverse", &args(&["1"])).is_err());
    }

    #[test]
    fn timing_frames_at_44k() {
        let (segment, search, overlap) = WsolaTiming::default().frames(44_100);
        assert_eq!(segment, 3616);
        assert_eq!(search, 647);
        assert_eq!(overlap, 529);
    }

    proptest! {
        #[test]
        fn in_range_factors_parse(factor in 0.1f64..=10.0) {
            let parsed = parse_tempo(&[factor.to_string()]).unwrap();
            prop_assert!((parsed.factor - factor).abs() < 1e-12);
        }

        #[test]
        fn non_numeric_factors_fail(text in "[a-zA-Z]{1,8}") {
            let err = parse_tempo(&[text]).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::InvalidStageArgs);
        }
    }
}
