/// End-to-end tests through the exported C ABI
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serial_test::serial;
use std::ffi::{CStr, CString};
use std::path::Path;
use tuneshift_core::{ErrorKind, STATUS_SUCCESS};
use tuneshift_mobile::{
    tuneshift_convert, tuneshift_init, tuneshift_last_error, tuneshift_pitch, tuneshift_reverse,
    tuneshift_tempo,
};

fn c_path(path: &Path) -> CString {
    CString::new(path.to_str().unwrap()).unwrap()
}

fn fixture(path: &Path, frames: u32) {
    let spec = WavSpec {
        channels: 2,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        let value = ((i as f32 * 0.05).sin() * 8_000.0) as i16;
        writer.write_sample(value).unwrap();
        writer.write_sample(-value).unwrap();
    }
    writer.finalize().unwrap();
}

fn last_error() -> Option<String> {
    let message = tuneshift_last_error();
    if message.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned())
    }
}

#[test]
#[serial]
fn all_operations_succeed_after_init() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = c_path(&dir.path().join("scratch"));
    assert_eq!(unsafe { tuneshift_init(scratch.as_ptr()) }, STATUS_SUCCESS);

    let input_path = dir.path().join("in.wav");
    fixture(&input_path, 16_000);
    let input = c_path(&input_path);

    let outputs: Vec<(CString, i32)> = {
        let converted = c_path(&dir.path().join("converted.wav"));
        let faster = c_path(&dir.path().join("faster.wav"));
        let higher = c_path(&dir.path().join("higher.wav"));
        let reversed = c_path(&dir.path().join("reversed.wav"));
        let factor = CString::new("2.0").unwrap();
        let cents = CString::new("300").unwrap();
        unsafe {
            let statuses = [
                tuneshift_convert(input.as_ptr(), converted.as_ptr()),
                tuneshift_tempo(input.as_ptr(), faster.as_ptr(), factor.as_ptr()),
                tuneshift_pitch(input.as_ptr(), higher.as_ptr(), cents.as_ptr()),
                tuneshift_reverse(input.as_ptr(), reversed.as_ptr()),
            ];
            vec![
                (converted, statuses[0]),
                (faster, statuses[1]),
                (higher, statuses[2]),
                (reversed, statuses[3]),
            ]
        }
    };

    for (path, status) in &outputs {
        assert_eq!(*status, STATUS_SUCCESS, "{path:?}: {:?}", last_error());
    }
    assert!(last_error().is_none());

    let frames = |name: &str| WavReader::open(dir.path().join(name)).unwrap().duration();
    assert_eq!(frames("converted.wav"), 16_000);
    assert_eq!(frames("faster.wav"), 8_000);
    assert_eq!(frames("higher.wav"), 16_000);
    assert_eq!(frames("reversed.wav"), 16_000);
}

#[test]
#[serial]
fn failures_report_status_and_message() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = c_path(&dir.path().join("scratch"));
    assert_eq!(unsafe { tuneshift_init(scratch.as_ptr()) }, STATUS_SUCCESS);

    let input_path = dir.path().join("in.wav");
    fixture(&input_path, 1_000);
    let input = c_path(&input_path);
    let output_path = dir.path().join("out.wav");
    let output = c_path(&output_path);

    let bad_factor = CString::new("abc").unwrap();
    let status = unsafe { tuneshift_tempo(input.as_ptr(), output.as_ptr(), bad_factor.as_ptr()) };
    assert_eq!(status, ErrorKind::InvalidStageArgs.status_code());
    assert!(last_error().unwrap().contains("tempo"));
    assert!(!output_path.exists());

    let missing = c_path(&dir.path().join("missing.m4a"));
    let status = unsafe { tuneshift_convert(missing.as_ptr(), output.as_ptr()) };
    assert_eq!(status, ErrorKind::CannotOpenInput.status_code());

    let mp3 = c_path(&dir.path().join("out.mp3"));
    let status = unsafe { tuneshift_reverse(input.as_ptr(), mp3.as_ptr()) };
    assert_eq!(status, ErrorKind::CannotOpenOutput.status_code());

    // A later success clears the message
    let status = unsafe { tuneshift_convert(input.as_ptr(), output.as_ptr()) };
    assert_eq!(status, STATUS_SUCCESS);
    assert!(last_error().is_none());
}
