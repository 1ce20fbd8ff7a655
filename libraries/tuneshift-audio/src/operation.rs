//! Operation entry points
//!
//! Every operation is the same procedure: make the runtime ready, open the
//! input, open the output with the input's signal, assemble
//! `input -> [transform] -> output`, run it, and tear everything down in
//! reverse order of acquisition. The operations only differ in the optional
//! transform, which is passed as data.

use crate::config::{OperationConfig, RunFailurePolicy};
use crate::effects::{StageArgs, StageRegistry};
use crate::pipeline::{
    run_with_progress, EffectPipeline, InvocationState, InvocationStateMachine, Progress, RunStats,
};
use crate::runtime::{Runtime, LEDGER};
use crate::stream::{InputStream, OutputStream};
use std::fmt;
use std::ops::ControlFlow;
use std::path::Path;
use std::time::{Duration, Instant};
use tuneshift_core::{
    EncodingDescriptor, ErrorKind, Operation, Result, ShiftError, SignalDescriptor, TransformSpec,
};

/// Outcome of a successful operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationReport {
    /// Operation name ("convert" or the transform stage)
    pub operation: String,
    /// Signal decoded from the input
    pub input_signal: SignalDescriptor,
    /// Signal as written to the output
    pub output_signal: SignalDescriptor,
    /// Encoding of the input file
    pub input_encoding: EncodingDescriptor,
    /// Encoding of the output file
    pub output_encoding: EncodingDescriptor,
    /// Samples read and written
    pub stats: RunStats,
    /// Wall-clock time of the whole invocation
    pub elapsed: Duration,
}

impl fmt::Display for OperationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} samples in, {} samples out ({} -> {}) in {:.2?}",
            self.operation,
            self.stats.samples_read,
            self.stats.samples_written,
            self.input_encoding,
            self.output_encoding,
            self.elapsed
        )
    }
}

/// Transcode `input` into `output` without altering the audio
///
/// # Errors
/// See [`run_operation`].
pub fn convert(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &OperationConfig,
) -> Result<OperationReport> {
    run_operation(input, output, None, config)
}

/// Change tempo by `factor` (e.g. `"1.5"` plays 50% faster)
///
/// # Errors
/// See [`run_operation`]; a factor that is not a number in `0.1..=10` is
/// `InvalidStageArgs`.
pub fn tempo(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    factor: &str,
    config: &OperationConfig,
) -> Result<OperationReport> {
    let transform = TransformSpec::new("tempo", vec![factor.to_string()]);
    run_operation(input, output, Some(&transform), config)
}

/// Shift pitch by `cents` (e.g. `"1200"` is one octave up)
///
/// # Errors
/// See [`run_operation`]; a shift that is not a number in `-2400..=2400` is
/// `InvalidStageArgs`.
pub fn pitch(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    cents: &str,
    config: &OperationConfig,
) -> Result<OperationReport> {
    let transform = TransformSpec::new("pitch", vec![cents.to_string()]);
    run_operation(input, output, Some(&transform), config)
}

/// Reverse the whole stream
///
/// # Errors
/// See [`run_operation`].
pub fn reverse(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &OperationConfig,
) -> Result<OperationReport> {
    let transform = TransformSpec::new("reverse", Vec::new());
    run_operation(input, output, Some(&transform), config)
}

/// Run any [`Operation`]
///
/// # Errors
/// See [`run_operation`].
pub fn apply(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    operation: &Operation,
    config: &OperationConfig,
) -> Result<OperationReport> {
    run_operation(input, output, operation.transform().as_ref(), config)
}

/// Run `input -> [transform] -> output`
///
/// Transform arguments are validated before any file is touched. The output
/// path is only created or replaced when the whole invocation succeeds.
///
/// # Errors
/// The first failure encountered, by kind: `InitFailed`, `CannotOpenInput`,
/// `CannotOpenOutput`, `UnknownStage`, `InvalidStageArgs`,
/// `StageAddFailed` or `FlowFailed`.
pub fn run_operation(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    transform: Option<&TransformSpec>,
    config: &OperationConfig,
) -> Result<OperationReport> {
    run_operation_with_progress(input, output, transform, config, |_| ControlFlow::Continue(()))
}

/// [`run_operation`] with a progress callback invoked after every source
/// block; returning [`ControlFlow::Break`] cancels the run.
///
/// # Errors
/// As [`run_operation`], plus `Cancelled`.
pub fn run_operation_with_progress<F>(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    transform: Option<&TransformSpec>,
    config: &OperationConfig,
    on_progress: F,
) -> Result<OperationReport>
where
    F: FnMut(&Progress) -> ControlFlow<()>,
{
    drive(None, input.as_ref(), output.as_ref(), transform, config, on_progress)
}

/// [`run_operation_with_progress`] resolving stages from `registry` instead
/// of the runtime's built-in registry
///
/// The transform must be registered as a transform stage and the registry
/// must provide `input` and `output` stages, e.g. one started from
/// [`StageRegistry::with_builtin_stages`].
///
/// # Errors
/// As [`run_operation_with_progress`].
pub fn run_operation_with_registry<F>(
    registry: &StageRegistry,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    transform: Option<&TransformSpec>,
    config: &OperationConfig,
    on_progress: F,
) -> Result<OperationReport>
where
    F: FnMut(&Progress) -> ControlFlow<()>,
{
    drive(
        Some(registry),
        input.as_ref(),
        output.as_ref(),
        transform,
        config,
        on_progress,
    )
}

fn drive<F>(
    registry: Option<&StageRegistry>,
    input: &Path,
    output: &Path,
    transform: Option<&TransformSpec>,
    config: &OperationConfig,
    on_progress: F,
) -> Result<OperationReport>
where
    F: FnMut(&Progress) -> ControlFlow<()>,
{
    let name = transform.map_or("convert", |t| t.kind.as_str());

    let span = tracing::info_span!("operation", op = name);
    let _enter = span.enter();

    LEDGER.invocation_started();
    let started = Instant::now();
    let mut machine = InvocationStateMachine::new();

    let result = invoke(registry, input, output, transform, config, &mut machine, on_progress).map(
        |((input_signal, input_encoding), (output_signal, output_encoding), stats)| OperationReport {
            operation: name.to_string(),
            input_signal,
            input_encoding,
            output_signal,
            output_encoding,
            stats,
            elapsed: started.elapsed(),
        },
    );
    machine.finish();
    LEDGER.invocation_finished();

    match &result {
        Ok(report) => tracing::info!(
            input = %input.display(),
            output = %output.display(),
            samples = report.stats.samples_written,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "operation complete"
        ),
        Err(e) => tracing::warn!(
            input = %input.display(),
            output = %output.display(),
            state = ?machine.state(),
            "operation failed: {e}"
        ),
    }
    result
}

type StreamInfo = (SignalDescriptor, EncodingDescriptor);

fn invoke<F>(
    registry: Option<&StageRegistry>,
    input: &Path,
    output: &Path,
    transform: Option<&TransformSpec>,
    config: &OperationConfig,
    machine: &mut InvocationStateMachine,
    on_progress: F,
) -> Result<(StreamInfo, StreamInfo, RunStats)>
where
    F: FnMut(&Progress) -> ControlFlow<()>,
{
    let runtime = Runtime::ensure_ready(&config.scratch_dir).map_err(|e| abort(machine, e))?;
    machine.advance(InvocationState::LibraryReady);
    let registry = registry.unwrap_or_else(|| runtime.registry());

    let _serialized = config
        .serialize_invocations
        .then(|| runtime.lock_invocations());

    if let Some(spec) = transform {
        registry
            .validate_transform(spec)
            .map_err(|e| abort(machine, e))?;
    }

    let mut input_stream = InputStream::open(input).map_err(|e| abort(machine, e))?;
    machine.advance(InvocationState::InputOpen);

    let mut output_stream = match OutputStream::open(output, input_stream.signal()) {
        Ok(stream) => stream,
        Err(e) => {
            input_stream.close();
            return Err(abort(machine, e));
        }
    };
    machine.advance(InvocationState::OutputOpen);

    let input_info = (*input_stream.signal(), input_stream.encoding().clone());
    let output_info = (*output_stream.signal(), output_stream.encoding().clone());

    let outcome = build_and_run(
        registry,
        &mut input_stream,
        &mut output_stream,
        transform,
        config,
        machine,
        on_progress,
    );

    let outcome = match outcome {
        Err(e)
            if machine.state() == InvocationState::Running
                && e.kind() == ErrorKind::FlowFailed
                && config.run_failure == RunFailurePolicy::Warn =>
        {
            tracing::warn!("run failed, keeping partial output: {e}");
            Ok(RunStats {
                samples_read: input_stream.samples_read(),
                samples_written: output_stream.samples_written(),
            })
        }
        Err(e) => Err(abort(machine, e)),
        ok => ok,
    };

    // Pipeline is gone; release the output, then the input
    let outcome = match outcome {
        Ok(stats) => match output_stream.close() {
            Ok(()) => Ok(stats),
            Err(e) => Err(abort(machine, e)),
        },
        Err(e) => {
            output_stream.discard();
            Err(e)
        }
    };
    input_stream.close();

    outcome.map(|stats| (input_info, output_info, stats))
}

fn build_and_run<'a, F>(
    registry: &StageRegistry,
    input: &'a mut InputStream,
    output: &'a mut OutputStream,
    transform: Option<&'a TransformSpec>,
    config: &OperationConfig,
    machine: &mut InvocationStateMachine,
    on_progress: F,
) -> Result<RunStats>
where
    F: FnMut(&Progress) -> ControlFlow<()>,
{
    let mut pipeline = EffectPipeline::new(input.encoding(), output.encoding(), &config.scratch_dir)
        .with_block_frames(config.block_frames);
    let mut signal = *input.signal();

    let result = assemble(registry, &mut pipeline, input, output, transform, &mut signal).and_then(|()| {
        machine.advance(InvocationState::ChainBuilt);
        tracing::debug!(stages = ?pipeline.stage_names(), "chain built");
        machine.advance(InvocationState::Running);
        run_with_progress(&mut pipeline, on_progress)
    });

    pipeline.destroy();
    result
}

fn assemble<'a>(
    registry: &StageRegistry,
    pipeline: &mut EffectPipeline<'a>,
    input: &'a mut InputStream,
    output: &'a mut OutputStream,
    transform: Option<&'a TransformSpec>,
    signal: &mut SignalDescriptor,
) -> Result<()> {
    let source = registry
        .find("input")?
        .create()
        .configure(StageArgs::Input(input))?;
    pipeline.append(source, signal)?;

    if let Some(spec) = transform {
        let stage = registry
            .find(&spec.kind)?
            .create()
            .configure(StageArgs::Params(&spec.args))?;
        pipeline.append(stage, signal)?;
    }

    let sink = registry
        .find("output")?
        .create()
        .configure(StageArgs::Output(output))?;
    pipeline.append(sink, signal)?;
    Ok(())
}

fn abort(machine: &mut InvocationStateMachine, error: ShiftError) -> ShiftError {
    machine.abort(&error);
    error
}
