//! Stage Registry - Factory Pattern for Effect Stages
//!
//! Stage kinds are registered by name with a factory that validates the
//! stage arguments and builds an unstarted [`Effect`]. Configuration is a
//! typestate: a [`StageInstance`] can only become a [`ConfiguredStage`] by
//! passing `configure`, and only configured stages can be appended to a
//! pipeline.

use super::params::{expect_none, parse_pitch, parse_tempo};
use super::pitch::PitchStage;
use super::reverse::ReverseStage;
use super::sink::SinkStage;
use super::source::SourceStage;
use super::tempo::TempoStage;
use super::{Effect, StageArgs, StageRole};
use std::collections::HashMap;
use std::fmt::Debug;
use tuneshift_core::{Result, ShiftError, TransformSpec};

/// Factory building an unstarted effect from its arguments
///
/// Factories only validate and store their arguments; buffers, scratch
/// files and resamplers are allocated when the stage starts.
pub type StageFactory = for<'a> fn(StageArgs<'a>) -> Result<Box<dyn Effect + 'a>>;

/// A registered stage kind
#[derive(Clone, Copy)]
pub struct StageKind {
    name: &'static str,
    role: StageRole,
    usage: &'static str,
    description: &'static str,
    factory: StageFactory,
}

impl Debug for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageKind")
            .field("name", &self.name)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl StageKind {
    /// Describe a stage kind for [`StageRegistry::register`]
    pub fn new(
        name: &'static str,
        role: StageRole,
        usage: &'static str,
        description: &'static str,
        factory: StageFactory,
    ) -> Self {
        Self {
            name,
            role,
            usage,
            description,
            factory,
        }
    }

    /// Registry name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Position this stage takes in a chain
    pub fn role(&self) -> StageRole {
        self.role
    }

    /// Argument synopsis
    pub fn usage(&self) -> &'static str {
        self.usage
    }

    /// One-line description
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Create an unconfigured instance
    pub fn create(&self) -> StageInstance {
        StageInstance { kind: *self }
    }
}

/// A stage that has been created but not configured
#[derive(Debug)]
pub struct StageInstance {
    kind: StageKind,
}

impl StageInstance {
    /// Kind this instance was created from
    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    /// Validate `args` and bind them to the stage
    ///
    /// # Errors
    /// `InvalidStageArgs` when the argument variant, count or values do not
    /// fit the stage.
    pub fn configure<'a>(self, args: StageArgs<'a>) -> Result<ConfiguredStage<'a>> {
        let described = args.describe();
        let effect = (self.kind.factory)(args)?;
        tracing::debug!(stage = self.kind.name, args = %described, "stage configured");
        Ok(ConfiguredStage {
            kind: self.kind,
            effect,
        })
    }
}

/// A stage whose arguments were accepted, ready to be appended
pub struct ConfiguredStage<'a> {
    kind: StageKind,
    effect: Box<dyn Effect + 'a>,
}

impl<'a> ConfiguredStage<'a> {
    /// Kind this stage was created from
    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    #[cfg(test)]
    pub(crate) fn from_effect(kind: StageKind, effect: Box<dyn Effect + 'a>) -> Self {
        Self { kind, effect }
    }

    pub(crate) fn into_parts(self) -> (StageKind, Box<dyn Effect + 'a>) {
        (self.kind, self.effect)
    }
}

impl Debug for ConfiguredStage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredStage")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Registry of available stage kinds
#[derive(Debug, Default)]
pub struct StageRegistry {
    kinds: HashMap<&'static str, StageKind>,
}

impl StageRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Create a registry with the built-in stages
    pub fn with_builtin_stages() -> Self {
        let mut registry = Self::new();

        registry.register(StageKind {
            name: "input",
            role: StageRole::Source,
            usage: "<input stream>",
            description: "Read samples from the input stream",
            factory: create_input,
        });
        registry.register(StageKind {
            name: "output",
            role: StageRole::Sink,
            usage: "<output stream>",
            description: "Write samples to the output stream",
            factory: create_output,
        });
        registry.register(StageKind {
            name: "tempo",
            role: StageRole::Transform,
            usage: "factor [segment-ms [search-ms [overlap-ms]]]",
            description: "Change tempo without changing pitch (WSOLA)",
            factory: create_tempo,
        });
        registry.register(StageKind {
            name: "pitch",
            role: StageRole::Transform,
            usage: "cents [segment-ms [search-ms [overlap-ms]]]",
            description: "Shift pitch without changing tempo",
            factory: create_pitch,
        });
        registry.register(StageKind {
            name: "reverse",
            role: StageRole::Transform,
            usage: "",
            description: "Play the whole stream backwards",
            factory: create_reverse,
        });

        registry
    }

    /// Register a stage kind, replacing one with the same name
    pub fn register(&mut self, kind: StageKind) {
        self.kinds.insert(kind.name, kind);
    }

    /// Look up a stage kind by name
    ///
    /// # Errors
    /// `UnknownStage` when no kind with this name is registered.
    pub fn find(&self, name: &str) -> Result<&StageKind> {
        self.kinds
            .get(name)
            .ok_or_else(|| ShiftError::UnknownStage(name.to_string()))
    }

    /// Registered kinds, sorted by role then name
    pub fn kinds(&self) -> Vec<&StageKind> {
        let mut kinds: Vec<&StageKind> = self.kinds.values().collect();
        kinds.sort_by_key(|kind| {
            let order = match kind.role {
                StageRole::Source => 0,
                StageRole::Transform => 1,
                StageRole::Sink => 2,
            };
            (order, kind.name)
        });
        kinds
    }

    /// Check a transform request without binding it to any stream
    ///
    /// # Errors
    /// `UnknownStage` for an unregistered name, `InvalidStageArgs` when the
    /// stage is not a transform or rejects the arguments.
    pub fn validate_transform(&self, spec: &TransformSpec) -> Result<()> {
        let kind = self.find(&spec.kind)?;
        if kind.role != StageRole::Transform {
            return Err(ShiftError::invalid_args(
                kind.name,
                "not a transform stage",
            ));
        }
        kind.create().configure(StageArgs::Params(&spec.args)).map(drop)
    }
}

fn wrong_binding(stage: &str, expected: &str, args: &StageArgs<'_>) -> ShiftError {
    ShiftError::invalid_args(stage, format!("expected {expected}, got {}", args.describe()))
}

fn create_input<'a>(args: StageArgs<'a>) -> Result<Box<dyn Effect + 'a>> {
    match args {
        StageArgs::Input(stream) => Ok(Box::new(SourceStage::new(stream))),
        other => Err(wrong_binding("input", "an input stream", &other)),
    }
}

fn create_output<'a>(args: StageArgs<'a>) -> Result<Box<dyn Effect + 'a>> {
    match args {
        StageArgs::Output(stream) => Ok(Box::new(SinkStage::new(stream))),
        other => Err(wrong_binding("output", "an output stream", &other)),
    }
}

fn create_tempo<'a>(args: StageArgs<'a>) -> Result<Box<dyn Effect + 'a>> {
    match args {
        StageArgs::Params(params) => Ok(Box::new(TempoStage::new(parse_tempo(params)?))),
        other => Err(wrong_binding("tempo", "a tempo factor", &other)),
    }
}

fn create_pitch<'a>(args: StageArgs<'a>) -> Result<Box<dyn Effect + 'a>> {
    match args {
        StageArgs::Params(params) => Ok(Box::new(PitchStage::new(parse_pitch(params)?))),
        other => Err(wrong_binding("pitch", "a pitch shift", &other)),
    }
}

fn create_reverse<'a>(args: StageArgs<'a>) -> Result<Box<dyn Effect + 'a>> {
    match args {
        StageArgs::Params(params) => {
            expect_none("reverse", params)?;
            Ok(Box::new(ReverseStage::new()))
        }
        other => Err(wrong_binding("reverse", "no arguments", &other)),
    }
}
