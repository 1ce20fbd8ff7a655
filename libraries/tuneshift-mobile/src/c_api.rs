//! C ABI entry points
//!
//! # Symbol prefix
//!
//! All exported symbols use the `tuneshift_` prefix. Strings are
//! NUL-terminated UTF-8; every function returns a status code (0 on
//! success, negative per error kind).

use crate::bridge::{self, Request};
use crate::panic_guard::ffi_guard;
use std::ffi::{c_char, CStr};
use std::path::PathBuf;
use tuneshift_core::{Operation, Result, ShiftError};

/// Borrow a C string argument
///
/// # Safety
/// `value` must be null or point to a NUL-terminated string that outlives
/// the returned reference.
unsafe fn read_str<'a>(value: *const c_char) -> std::result::Result<&'a str, &'static str> {
    if value.is_null() {
        return Err("null pointer");
    }
    // Safety: non-null and NUL-terminated per the caller's contract.
    unsafe { CStr::from_ptr(value) }
        .to_str()
        .map_err(|_| "not valid UTF-8")
}

/// # Safety
/// As [`read_str`] for both pointers.
unsafe fn request(
    input: *const c_char,
    output: *const c_char,
    operation: Result<Operation>,
) -> Result<Request> {
    // Safety: forwarded from the exported function's contract.
    let input = unsafe { read_str(input) }.map_err(bridge::bad_input)?;
    // Safety: as above.
    let output = unsafe { read_str(output) }.map_err(bridge::bad_output)?;
    Ok(Request {
        input: PathBuf::from(input),
        output: PathBuf::from(output),
        operation: operation?,
    })
}

/// Initialise the library with a writable scratch directory.
///
/// # Safety
/// `scratch_dir` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tuneshift_init(scratch_dir: *const c_char) -> i32 {
    ffi_guard! {
        // Safety: guaranteed by the caller.
        let scratch_dir = unsafe { read_str(scratch_dir) }
            .map(PathBuf::from)
            .map_err(|e| ShiftError::InitFailed(format!("scratch directory: {e}")));
        bridge::init(scratch_dir)
    }
}

/// Transcode `input` into the WAV or FLAC file `output`.
///
/// # Safety
/// Both arguments must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn tuneshift_convert(input: *const c_char, output: *const c_char) -> i32 {
    ffi_guard! {
        // Safety: guaranteed by the caller.
        bridge::run(unsafe { request(input, output, Ok(Operation::Convert)) })
    }
}

/// Change tempo by `factor` without changing pitch.
///
/// # Safety
/// All arguments must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn tuneshift_tempo(
    input: *const c_char,
    output: *const c_char,
    factor: *const c_char,
) -> i32 {
    ffi_guard! {
        // Safety: guaranteed by the caller.
        let operation = unsafe { read_str(factor) }
            .map(Operation::tempo)
            .map_err(|e| bridge::bad_argument("tempo", e));
        // Safety: guaranteed by the caller.
        bridge::run(unsafe { request(input, output, operation) })
    }
}

/// Shift pitch by `cents` without changing tempo.
///
/// # Safety
/// All arguments must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn tuneshift_pitch(
    input: *const c_char,
    output: *const c_char,
    cents: *const c_char,
) -> i32 {
    ffi_guard! {
        // Safety: guaranteed by the caller.
        let operation = unsafe { read_str(cents) }
            .map(Operation::pitch)
            .map_err(|e| bridge::bad_argument("pitch", e));
        // Safety: guaranteed by the caller.
        bridge::run(unsafe { request(input, output, operation) })
    }
}

/// Reverse the whole stream.
///
/// # Safety
/// Both arguments must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn tuneshift_reverse(input: *const c_char, output: *const c_char) -> i32 {
    ffi_guard! {
        // Safety: guaranteed by the caller.
        bridge::run(unsafe { request(input, output, Ok(Operation::Reverse)) })
    }
}

/// Message of the last failed call on the calling thread, or null.
///
/// The string is owned by the library and valid until the next
/// `tuneshift_*` call on the same thread.
#[no_mangle]
pub extern "C" fn tuneshift_last_error() -> *const c_char {
    bridge::last_error_ptr()
}
