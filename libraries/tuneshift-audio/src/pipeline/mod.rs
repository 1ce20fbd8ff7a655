//! Effect pipeline
//!
//! Assembly ([`EffectPipeline`]), execution ([`run`]) and the per-invocation
//! state machine ([`InvocationStateMachine`]).

mod chain;
mod runner;
mod state;

pub use chain::EffectPipeline;
pub use runner::{run, run_with_progress, Progress, RunStats};
pub use state::{InvocationState, InvocationStateMachine};
