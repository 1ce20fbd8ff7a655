//! Process-wide runtime
//!
//! The engine is initialised once per process and never torn down between
//! invocations. The runtime owns the stage registry, the invocation lock and
//! exposes the resource ledger that stream handles and pipelines report to.

use crate::effects::StageRegistry;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};
use tuneshift_core::{Result, ShiftError};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

pub(crate) static LEDGER: ResourceLedger = ResourceLedger::new();

/// Shared engine state
#[derive(Debug)]
pub struct Runtime {
    registry: StageRegistry,
    invocations: Mutex<()>,
}

impl Runtime {
    /// The process-wide runtime, created on first use
    pub fn global() -> &'static Runtime {
        RUNTIME.get_or_init(|| {
            let registry = StageRegistry::with_builtin_stages();
            tracing::debug!(stages = ?registry.kinds(), "audio runtime initialised");
            Runtime {
                registry,
                invocations: Mutex::new(()),
            }
        })
    }

    /// Make the runtime ready for an invocation using `scratch_dir`
    ///
    /// # Errors
    /// `InitFailed` when the scratch directory cannot be created.
    pub fn ensure_ready(scratch_dir: &Path) -> Result<&'static Runtime> {
        let runtime = Self::global();
        std::fs::create_dir_all(scratch_dir).map_err(|e| {
            ShiftError::init(format!(
                "cannot create scratch directory {}: {e}",
                scratch_dir.display()
            ))
        })?;
        Ok(runtime)
    }

    /// Registry of stage kinds
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Acquire the invocation lock
    ///
    /// A poisoned lock only means another invocation panicked; the guarded
    /// data is `()`, so the lock is recovered.
    pub fn lock_invocations(&self) -> MutexGuard<'_, ()> {
        self.invocations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Snapshot of the resource ledger
    pub fn stats() -> ResourceStats {
        LEDGER.snapshot()
    }
}

/// Counters of acquired and released engine resources
#[derive(Debug)]
pub(crate) struct ResourceLedger {
    streams_opened: AtomicU64,
    streams_closed: AtomicU64,
    pipelines_created: AtomicU64,
    pipelines_destroyed: AtomicU64,
    invocations_started: AtomicU64,
    invocations_finished: AtomicU64,
}

impl ResourceLedger {
    const fn new() -> Self {
        Self {
            streams_opened: AtomicU64::new(0),
            streams_closed: AtomicU64::new(0),
            pipelines_created: AtomicU64::new(0),
            pipelines_destroyed: AtomicU64::new(0),
            invocations_started: AtomicU64::new(0),
            invocations_finished: AtomicU64::new(0),
        }
    }

    pub(crate) fn stream_opened(&self) {
        self.streams_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stream_closed(&self) {
        self.streams_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn pipeline_created(&self) {
        self.pipelines_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn pipeline_destroyed(&self) {
        self.pipelines_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn invocation_started(&self) {
        self.invocations_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn invocation_finished(&self) {
        self.invocations_finished.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ResourceStats {
        ResourceStats {
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
            streams_closed: self.streams_closed.load(Ordering::Relaxed),
            pipelines_created: self.pipelines_created.load(Ordering::Relaxed),
            pipelines_destroyed: self.pipelines_destroyed.load(Ordering::Relaxed),
            invocations_started: self.invocations_started.load(Ordering::Relaxed),
            invocations_finished: self.invocations_finished.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the resource ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceStats {
    /// Stream handles opened (input and output)
    pub streams_opened: u64,
    /// Stream handles closed or discarded
    pub streams_closed: u64,
    /// Pipelines constructed
    pub pipelines_created: u64,
    /// Pipelines destroyed
    pub pipelines_destroyed: u64,
    /// Invocations that reached `run_operation`
    pub invocations_started: u64,
    /// Invocations that returned
    pub invocations_finished: u64,
}

impl ResourceStats {
    /// Stream handles currently open
    pub fn open_streams(&self) -> u64 {
        self.streams_opened.saturating_sub(self.streams_closed)
    }

    /// Pipelines currently alive
    pub fn live_pipelines(&self) -> u64 {
        self.pipelines_created.saturating_sub(self.pipelines_destroyed)
    }

    /// Every acquired resource has been released
    pub fn is_balanced(&self) -> bool {
        self.streams_opened == self.streams_closed
            && self.pipelines_created == self.pipelines_destroyed
            && self.invocations_started == self.invocations_finished
    }

    /// Counter increments between `earlier` and `self`
    #[must_use]
    pub fn since(&self, earlier: &Self) -> Self {
        Self {
            streams_opened: self.streams_opened - earlier.streams_opened,
            streams_closed: self.streams_closed - earlier.streams_closed,
            pipelines_created: self.pipelines_created - earlier.pipelines_created,
            pipelines_destroyed: self.pipelines_destroyed - earlier.pipelines_destroyed,
            invocations_started: self.invocations_started - earlier.invocations_started,
            invocations_finished: self.invocations_finished - earlier.invocations_finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_runtime_is_shared() {
        let a = Runtime::global() as *const Runtime;
        let b = Runtime::global() as *const Runtime;
        assert_eq!(a, b);
    }

    #[test]
    fn registry_has_builtin_stages() {
        let registry = Runtime::global().registry();
        for name in ["input", "output", "tempo", "pitch", "reverse"] {
            assert!(registry.find(name).is_ok(), "missing stage {name}");
        }
    }

    #[test]
    fn ensure_ready_creates_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("nested").join("scratch");
        Runtime::ensure_ready(&scratch).unwrap();
        assert!(scratch.is_dir());
    }

    #[test]
    fn ensure_ready_fails_on_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let err = Runtime::ensure_ready(&blocker.join("scratch")).unwrap_err();
        assert_eq!(err.kind(), tuneshift_core::ErrorKind::InitFailed);
    }

    #[test]
    fn stats_arithmetic() {
        let earlier = ResourceStats {
            streams_opened: 2,
            streams_closed: 2,
            ..ResourceStats::default()
        };
        let later = ResourceStats {
            streams_opened: 5,
            streams_closed: 4,
            pipelines_created: 1,
            pipelines_destroyed: 1,
            invocations_started: 1,
            invocations_finished: 1,
        };
        let delta = later.since(&earlier);
        assert_eq!(delta.streams_opened, 3);
        assert_eq!(delta.open_streams(), 1);
        assert!(!delta.is_balanced());
        assert_eq!(delta.live_pipelines(), 0);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let runtime = Runtime::global();
        let _ = std::thread::spawn(|| {
            let _guard = Runtime::global().lock_invocations();
            panic!("poison");
        })
        .join();
        drop(runtime.lock_invocations());
    }
}
