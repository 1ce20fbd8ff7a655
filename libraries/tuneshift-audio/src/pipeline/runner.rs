//! Pipeline runner
//!
//! Pulls blocks from the source stage until end of stream, pushing each
//! through every later stage, then drains the transforms in order so that
//! buffered samples reach the sink.

use super::chain::{EffectPipeline, PipelineStage};
use crate::effects::{Drain, StageRole};
use std::ops::ControlFlow;
use tuneshift_core::{Result, ShiftError};

/// Sample counts of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    /// Interleaved samples produced by the source
    pub samples_read: u64,
    /// Interleaved samples handed to the sink
    pub samples_written: u64,
}

/// Progress of a running pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Interleaved samples produced by the source so far
    pub samples_read: u64,
    /// Total samples in the input, when the container reports it
    pub total_samples: Option<u64>,
}

impl Progress {
    /// Completed fraction in `[0.0, 1.0]`, when the total is known
    pub fn fraction(&self) -> Option<f64> {
        match self.total_samples {
            Some(0) => Some(1.0),
            Some(total) => Some((self.samples_read as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// Run `pipeline` to exhaustion
///
/// # Errors
/// `FlowFailed` when the chain is malformed or a stage fails mid-run.
pub fn run(pipeline: &mut EffectPipeline<'_>) -> Result<RunStats> {
    run_with_progress(pipeline, |_| ControlFlow::Continue(()))
}

/// Run `pipeline` to exhaustion, reporting progress after every source block
///
/// Returning [`ControlFlow::Break`] from `on_progress` stops the run.
///
/// # Errors
/// `FlowFailed` when the chain is malformed or a stage fails mid-run,
/// `Cancelled` when `on_progress` breaks.
pub fn run_with_progress<F>(pipeline: &mut EffectPipeline<'_>, mut on_progress: F) -> Result<RunStats>
where
    F: FnMut(&Progress) -> ControlFlow<()>,
{
    check_order(pipeline)?;

    let stages = pipeline.stages_mut();
    let Some((source, rest)) = stages.split_first_mut() else {
        return Err(ShiftError::flow("empty pipeline"));
    };
    let total_samples = source.signal.length;

    let mut stats = RunStats::default();
    let mut block = Vec::new();
    let mut scratch = Vec::new();

    loop {
        block.clear();
        let state = source.effect.drain(&mut block)?;
        stats.samples_read += block.len() as u64;

        push_through(rest, &mut block, &mut scratch, &mut stats)?;

        let progress = Progress {
            samples_read: stats.samples_read,
            total_samples,
        };
        if on_progress(&progress).is_break() {
            tracing::debug!(samples = stats.samples_read, "run cancelled");
            return Err(ShiftError::Cancelled(stats.samples_read));
        }
        if state == Drain::Done {
            break;
        }
    }

    // End of stream: flush every transform through the stages after it
    for index in 0..rest.len() {
        let (current, later) = rest[index..].split_at_mut(1);
        let current = &mut current[0];
        if current.kind.role() != StageRole::Transform {
            continue;
        }
        loop {
            block.clear();
            let state = current.effect.drain(&mut block)?;
            push_through(later, &mut block, &mut scratch, &mut stats)?;
            if state == Drain::Done {
                break;
            }
        }
    }

    tracing::debug!(
        samples_read = stats.samples_read,
        samples_written = stats.samples_written,
        "run complete"
    );
    Ok(stats)
}

/// Feed `block` through `stages`, swapping buffers between stages
fn push_through(
    stages: &mut [PipelineStage<'_>],
    block: &mut Vec<f32>,
    scratch: &mut Vec<f32>,
    stats: &mut RunStats,
) -> Result<()> {
    for stage in stages {
        if block.is_empty() {
            return Ok(());
        }
        if stage.kind.role() == StageRole::Sink {
            stats.samples_written += block.len() as u64;
        }
        scratch.clear();
        stage.effect.flow(block, scratch)?;
        std::mem::swap(block, scratch);
    }
    Ok(())
}

/// Source first, sink last, transforms in between
fn check_order(pipeline: &EffectPipeline<'_>) -> Result<()> {
    let roles = pipeline.roles();
    let names = pipeline.stage_names();

    let well_formed = roles.len() >= 2
        && roles.first() == Some(&StageRole::Source)
        && roles.last() == Some(&StageRole::Sink)
        && roles[1..roles.len() - 1]
            .iter()
            .all(|role| *role == StageRole::Transform);

    if well_formed {
        Ok(())
    } else {
        Err(ShiftError::flow(format!(
            "malformed chain {names:?}: expected a source, optional transforms and a sink"
        )))
    }
}
