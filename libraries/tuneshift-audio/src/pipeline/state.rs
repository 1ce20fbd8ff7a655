//! Invocation State Machine
//!
//! Tracks one operation invocation from runtime readiness to completion.
//! Only the transitions below are accepted; anything else is logged and
//! ignored.
//!
//! ```text
//! Uninitialized -> LibraryReady -> InputOpen -> OutputOpen -> ChainBuilt -> Running -> Done
//!       \______________\______________\____________\____________\__________\-> Aborting -> Done
//! ```

use tuneshift_core::{ErrorKind, ShiftError};

/// States of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvocationState {
    /// Nothing acquired yet
    #[default]
    Uninitialized,
    /// Process-wide runtime is ready
    LibraryReady,
    /// Input stream is open
    InputOpen,
    /// Output stream is open
    OutputOpen,
    /// Pipeline is assembled
    ChainBuilt,
    /// Samples are flowing
    Running,
    /// Failure seen, releasing what was acquired
    Aborting,
    /// Invocation finished, successfully or not
    Done,
}

impl InvocationState {
    /// Whether `next` may follow this state
    pub fn can_transition_to(self, next: Self) -> bool {
        use InvocationState::{
            Aborting, ChainBuilt, Done, InputOpen, LibraryReady, OutputOpen, Running, Uninitialized,
        };
        matches!(
            (self, next),
            (Uninitialized, LibraryReady)
                | (LibraryReady, InputOpen)
                | (InputOpen, OutputOpen)
                | (OutputOpen, ChainBuilt)
                | (ChainBuilt, Running)
                | (Running, Done)
                | (Aborting, Done)
        ) || (next == Aborting && !matches!(self, Aborting | Done))
    }

    /// Whether the invocation has finished
    pub fn is_terminal(self) -> bool {
        self == Self::Done
    }
}

/// Per-invocation state machine
///
/// Records the first error seen; later errors (typically from teardown) are
/// logged but never replace it.
#[derive(Debug, Default)]
pub struct InvocationStateMachine {
    state: InvocationState,
    first_error: Option<(ErrorKind, String)>,
}

impl InvocationStateMachine {
    /// Create a machine in `Uninitialized`
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Kind and message of the first recorded error
    pub fn first_error(&self) -> Option<(ErrorKind, &str)> {
        self.first_error
            .as_ref()
            .map(|(kind, message)| (*kind, message.as_str()))
    }

    /// Move to `next` if the transition is valid
    ///
    /// Returns whether the transition was applied.
    pub fn advance(&mut self, next: InvocationState) -> bool {
        if self.state.can_transition_to(next) {
            tracing::debug!(from = ?self.state, to = ?next, "invocation state");
            self.state = next;
            true
        } else {
            tracing::warn!(from = ?self.state, to = ?next, "rejected invocation state transition");
            false
        }
    }

    /// Record `error` and move to `Aborting`
    ///
    /// From `Aborting` or `Done` only the error record is considered.
    pub fn abort(&mut self, error: &ShiftError) {
        self.record(error);
        if !matches!(self.state, InvocationState::Aborting | InvocationState::Done) {
            self.advance(InvocationState::Aborting);
        }
    }

    /// Record an error without changing state
    pub fn record(&mut self, error: &ShiftError) {
        if self.first_error.is_none() {
            self.first_error = Some((error.kind(), error.to_string()));
        } else {
            tracing::warn!(state = ?self.state, "additional error after first failure: {error}");
        }
    }

    /// Move to `Done` from `Running` or `Aborting`
    pub fn finish(&mut self) {
        self.advance(InvocationState::Done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InvocationState::*;

    #[test]
    fn happy_path() {
        let mut machine = InvocationStateMachine::new();
        for next in [LibraryReady, InputOpen, OutputOpen, ChainBuilt, Running] {
            assert!(machine.advance(next), "{next:?}");
        }
        machine.finish();
        assert_eq!(machine.state(), Done);
        assert!(machine.state().is_terminal());
        assert!(machine.first_error().is_none());
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut machine = InvocationStateMachine::new();
        assert!(!machine.advance(InputOpen));
        assert!(!machine.advance(Done));
        assert_eq!(machine.state(), Uninitialized);
    }

    #[test]
    fn abort_from_every_non_terminal_state() {
        for state in [Uninitialized, LibraryReady, InputOpen, OutputOpen, ChainBuilt, Running] {
            assert!(state.can_transition_to(Aborting), "{state:?}");
        }
        assert!(!Done.can_transition_to(Aborting));
        assert!(!Aborting.can_transition_to(Aborting));
    }

    #[test]
    fn first_error_wins() {
        let mut machine = InvocationStateMachine::new();
        machine.advance(LibraryReady);
        machine.abort(&ShiftError::UnknownStage("echo".into()));
        machine.abort(&ShiftError::flow("teardown"));
        machine.finish();

        assert_eq!(machine.state(), Done);
        let (kind, message) = machine.first_error().unwrap();
        assert_eq!(kind, ErrorKind::UnknownStage);
        assert!(message.contains("echo"));
    }
}
