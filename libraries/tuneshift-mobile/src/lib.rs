//! TuneShift Mobile Bridge
//!
//! Native entry points for the mobile app. The same five operations are
//! exported twice: as JNI functions on `dev.tuneshift.bridge.NativeBridge`
//! for Android and as a C ABI (`tuneshift_*`) for iOS and other hosts.
//!
//! Every call returns an integer status: `0` on success, a negative code per
//! error kind otherwise (see [`tuneshift_core::ErrorKind::status_code`]), and
//! [`STATUS_INTERNAL`](tuneshift_core::STATUS_INTERNAL) when a panic was
//! caught at the boundary. The message of the last failure is available per
//! thread from `lastError` / `tuneshift_last_error`.
//!
//! `init` installs logging and sets the scratch directory used by the
//! reverse stage; operations called before `init` use the system temp
//! directory.

mod bridge;
mod c_api;
mod jni_exports;
mod panic_guard;

pub use c_api::{
    tuneshift_convert, tuneshift_init, tuneshift_last_error, tuneshift_pitch, tuneshift_reverse,
    tuneshift_tempo,
};
