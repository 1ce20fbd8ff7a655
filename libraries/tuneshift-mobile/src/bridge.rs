//! Shared bridge state
//!
//! Both export surfaces funnel into the functions here: status-code mapping,
//! the per-thread last error and the configuration set by `init`.

use std::any::Any;
use std::cell::RefCell;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing_subscriber::EnvFilter;
use tuneshift_audio::{OperationConfig, Runtime};
use tuneshift_core::{Operation, Result, ShiftError, STATUS_SUCCESS};

static CONFIG: RwLock<Option<OperationConfig>> = RwLock::new(None);

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Arguments of one bridge call, decoded from the caller's strings
#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) input: PathBuf,
    pub(crate) output: PathBuf,
    pub(crate) operation: Operation,
}

/// Install logging, make the runtime ready and remember `scratch_dir`
///
/// May be called again; the latest scratch directory wins.
pub(crate) fn init(scratch_dir: Result<PathBuf>) -> i32 {
    clear_error();
    install_logging();

    let outcome = scratch_dir.and_then(|dir| {
        Runtime::ensure_ready(&dir)?;
        let config = OperationConfig::with_scratch_dir(dir);
        tracing::info!(scratch = %config.scratch_dir.display(), "bridge initialised");
        *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = Some(config);
        Ok(())
    });
    status(outcome)
}

/// Run a decoded request with the current configuration
pub(crate) fn run(request: Result<Request>) -> i32 {
    clear_error();
    let outcome = request.and_then(|request| {
        tuneshift_audio::apply(&request.input, &request.output, &request.operation, &config())
            .map(drop)
    });
    status(outcome)
}

/// Configuration set by `init`, or the default before `init` was called
pub(crate) fn config() -> OperationConfig {
    CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_default()
}

/// Message of the last failed call on this thread
pub(crate) fn last_error() -> Option<String> {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|message| message.to_string_lossy().into_owned())
    })
}

/// Last error as a C string owned by this thread
///
/// The pointer stays valid until the next bridge call on the same thread.
pub(crate) fn last_error_ptr() -> *const std::ffi::c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(std::ptr::null(), |message| message.as_ptr())
    })
}

pub(crate) fn record_panic(payload: &(dyn Any + Send)) {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!("panic at bridge boundary: {detail}");
    set_error(&format!("internal error: {detail}"));
}

/// Error for an input path argument the caller could not pass as text
pub(crate) fn bad_input(reason: impl std::fmt::Display) -> ShiftError {
    ShiftError::cannot_open_input(Path::new("<input>"), reason)
}

/// Error for an output path argument the caller could not pass as text
pub(crate) fn bad_output(reason: impl std::fmt::Display) -> ShiftError {
    ShiftError::cannot_open_output(Path::new("<output>"), reason)
}

/// Error for a stage argument the caller could not pass as text
pub(crate) fn bad_argument(stage: &str, reason: impl std::fmt::Display) -> ShiftError {
    ShiftError::invalid_args(stage, reason.to_string())
}

fn status(outcome: Result<()>) -> i32 {
    match outcome {
        Ok(()) => STATUS_SUCCESS,
        Err(e) => {
            set_error(&e.to_string());
            e.status_code()
        }
    }
}

fn set_error(message: &str) {
    // Interior NULs cannot cross the C boundary
    let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

fn clear_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

fn install_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tuneshift=info"));
    // Hosts embedding the library may already have a subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tuneshift_core::ErrorKind;

    #[test]
    fn errors_set_last_error_and_success_clears_it() {
        let status = run(Err(bad_input("not a string")));
        assert_eq!(status, ErrorKind::CannotOpenInput.status_code());
        assert!(last_error().unwrap().contains("not a string"));
        assert!(!last_error_ptr().is_null());

        let status = run(Err(bad_argument("tempo", "missing")));
        assert_eq!(status, -5);

        clear_error();
        assert!(last_error().is_none());
        assert!(last_error_ptr().is_null());
    }

    #[test]
    #[serial]
    fn init_stores_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");

        assert_eq!(init(Ok(scratch.clone())), STATUS_SUCCESS);
        assert_eq!(config().scratch_dir, scratch);
        assert!(scratch.is_dir());
        assert!(last_error().is_none());
    }

    #[test]
    #[serial]
    fn init_fails_for_unusable_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let status = init(Ok(blocker.join("scratch")));
        assert_eq!(status, ErrorKind::InitFailed.status_code());
        assert!(last_error().is_some());
    }

    #[test]
    fn panic_payloads_are_recorded() {
        record_panic(&"plain str");
        assert_eq!(last_error().as_deref(), Some("internal error: plain str"));
        record_panic(&String::from("owned"));
        assert_eq!(last_error().as_deref(), Some("internal error: owned"));
    }
}
