//! Panic guards for exported functions
//!
//! Unwinding across `extern` functions is undefined behaviour, so every
//! exported body runs inside `catch_unwind`. A caught panic is recorded as the
//! calling thread's last error.

/// Run an exported body returning a status code; a panic becomes
/// [`STATUS_INTERNAL`](tuneshift_core::STATUS_INTERNAL).
macro_rules! ffi_guard {
    ($($body:tt)*) => {{
        use std::panic;
        use std::panic::AssertUnwindSafe;

        match panic::catch_unwind(AssertUnwindSafe(move || { $($body)* })) {
            Ok(status) => status,
            Err(payload) => {
                $crate::bridge::record_panic(payload.as_ref());
                tuneshift_core::STATUS_INTERNAL
            }
        }
    }};
}

/// Run an exported body returning a pointer; a panic becomes null.
macro_rules! ffi_guard_ptr {
    ($($body:tt)*) => {{
        use std::panic;
        use std::panic::AssertUnwindSafe;
        use std::ptr;

        match panic::catch_unwind(AssertUnwindSafe(move || { $($body)* })) {
            Ok(pointer) => pointer,
            Err(payload) => {
                $crate::bridge::record_panic(payload.as_ref());
                ptr::null_mut()
            }
        }
    }};
}

pub(crate) use ffi_guard;
pub(crate) use ffi_guard_ptr;
