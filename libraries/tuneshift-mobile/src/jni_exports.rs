//! JNI entry points for `dev.tuneshift.bridge.NativeBridge`
//!
//! ```kotlin
//! object NativeBridge {
//!     external fun init(scratchDir: String): Int
//!     external fun convert(input: String, output: String): Int
//!     external fun tempo(input: String, output: String, factor: String): Int
//!     external fun pitch(input: String, output: String, cents: String): Int
//!     external fun reverse(input: String, output: String): Int
//!     external fun lastError(): String?
//! }
//! ```

use crate::bridge::{self, Request};
use crate::panic_guard::{ffi_guard, ffi_guard_ptr};
use jni::objects::{JClass, JString};
use jni::sys::{jint, jstring};
use jni::JNIEnv;
use std::path::PathBuf;
use tuneshift_core::{Operation, Result, ShiftError};

fn read_string(env: &mut JNIEnv<'_>, value: &JString<'_>) -> jni::errors::Result<String> {
    if value.is_null() {
        return Err(jni::errors::Error::NullPtr("string argument"));
    }
    Ok(env.get_string(value)?.into())
}

fn request(
    env: &mut JNIEnv<'_>,
    input: &JString<'_>,
    output: &JString<'_>,
    operation: impl FnOnce(&mut JNIEnv<'_>) -> Result<Operation>,
) -> Result<Request> {
    let input = read_string(env, input).map_err(bridge::bad_input)?;
    let output = read_string(env, output).map_err(bridge::bad_output)?;
    Ok(Request {
        input: PathBuf::from(input),
        output: PathBuf::from(output),
        operation: operation(env)?,
    })
}

fn stage_argument(env: &mut JNIEnv<'_>, value: &JString<'_>, stage: &str) -> Result<String> {
    read_string(env, value).map_err(|e| bridge::bad_argument(stage, e))
}

#[no_mangle]
pub extern "system" fn Java_dev_tuneshift_bridge_NativeBridge_init(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    scratch_dir: JString<'_>,
) -> jint {
    ffi_guard! {
        let scratch_dir = read_string(&mut env, &scratch_dir)
            .map(PathBuf::from)
            .map_err(|e| ShiftError::InitFailed(format!("scratch directory: {e}")));
        bridge::init(scratch_dir)
    }
}

#[no_mangle]
pub extern "system" fn Java_dev_tuneshift_bridge_NativeBridge_convert(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    input: JString<'_>,
    output: JString<'_>,
) -> jint {
    ffi_guard! {
        bridge::run(request(&mut env, &input, &output, |_| Ok(Operation::Convert)))
    }
}

#[no_mangle]
pub extern "system" fn Java_dev_tuneshift_bridge_NativeBridge_tempo(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    input: JString<'_>,
    output: JString<'_>,
    factor: JString<'_>,
) -> jint {
    ffi_guard! {
        bridge::run(request(&mut env, &input, &output, |env| {
            stage_argument(env, &factor, "tempo").map(Operation::tempo)
        }))
    }
}

#[no_mangle]
pub extern "system" fn Java_dev_tuneshift_bridge_NativeBridge_pitch(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    input: JString<'_>,
    output: JString<'_>,
    cents: JString<'_>,
) -> jint {
    ffi_guard! {
        bridge::run(request(&mut env, &input, &output, |env| {
            stage_argument(env, &cents, "pitch").map(Operation::pitch)
        }))
    }
}

#[no_mangle]
pub extern "system" fn Java_dev_tuneshift_bridge_NativeBridge_reverse(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    input: JString<'_>,
    output: JString<'_>,
) -> jint {
    ffi_guard! {
        bridge::run(request(&mut env, &input, &output, |_| Ok(Operation::Reverse)))
    }
}

/// Last error message on the calling thread, or `null`
#[no_mangle]
pub extern "system" fn Java_dev_tuneshift_bridge_NativeBridge_lastError(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
) -> jstring {
    ffi_guard_ptr! {
        match bridge::last_error() {
            Some(message) => match env.new_string(message) {
                Ok(value) => value.into_raw(),
                Err(e) => {
                    tracing::warn!("failed to create Java string: {e}");
                    std::ptr::null_mut()
                }
            },
            None => std::ptr::null_mut(),
        }
    }
}
