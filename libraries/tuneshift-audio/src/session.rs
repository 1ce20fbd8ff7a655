//! Editing session
//!
//! A session loads a source file into a WAV working copy and applies
//! operations one after another, each producing a new working file. Steps can
//! be undone down to the loaded copy, and the latest working file can be
//! exported anywhere.

use crate::config::OperationConfig;
use crate::operation::{apply, convert, OperationReport};
use std::path::{Path, PathBuf};
use tuneshift_core::{Operation, Result, ShiftError};

/// One working file and the operation that produced it
#[derive(Debug, Clone)]
pub struct SessionStep {
    /// Operation applied to the previous working file
    pub operation: Operation,
    /// Working file written by this step
    pub file: PathBuf,
    /// Report of the invocation
    pub report: OperationReport,
}

/// Undoable sequence of operations over working WAV files
#[derive(Debug)]
pub struct Session {
    source: PathBuf,
    workdir: PathBuf,
    config: OperationConfig,
    /// Load step first, most recent last
    steps: Vec<SessionStep>,
    next_file: usize,
}

impl Session {
    /// Load `source` into a working copy under `workdir`
    ///
    /// # Errors
    /// `CannotOpenOutput` when `workdir` cannot be created, otherwise any
    /// error of [`convert`].
    pub fn open(
        source: impl AsRef<Path>,
        workdir: impl AsRef<Path>,
        config: OperationConfig,
    ) -> Result<Self> {
        let source = source.as_ref().to_path_buf();
        let workdir = workdir.as_ref().to_path_buf();
        std::fs::create_dir_all(&workdir)
            .map_err(|e| ShiftError::cannot_open_output(&workdir, e))?;

        let mut session = Self {
            source,
            workdir,
            config,
            steps: Vec::new(),
            next_file: 0,
        };

        let file = session.next_working_file();
        let report = convert(&session.source, &file, &session.config)?;
        tracing::info!(source = %session.source.display(), signal = %report.input_signal, "session opened");
        session.steps.push(SessionStep {
            operation: Operation::Convert,
            file,
            report,
        });
        Ok(session)
    }

    /// File the session was opened from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Latest working file
    pub fn current_file(&self) -> &Path {
        &self.latest().file
    }

    /// Steps applied after loading, oldest first
    pub fn applied(&self) -> &[SessionStep] {
        &self.steps[1..]
    }

    /// Run `operation` on the latest working file
    ///
    /// Nothing is recorded when the operation fails.
    ///
    /// # Errors
    /// Any error of the operation.
    pub fn apply(&mut self, operation: Operation) -> Result<&OperationReport> {
        let file = self.next_working_file();
        let report = apply(&self.latest().file, &file, &operation, &self.config)?;

        tracing::debug!(step = self.steps.len(), operation = %operation, "session step applied");
        self.steps.push(SessionStep {
            operation,
            file,
            report,
        });
        Ok(&self.latest().report)
    }

    /// Remove the most recent applied step and its working file
    ///
    /// Returns the undone operation, or `None` when only the loaded copy is
    /// left.
    pub fn undo(&mut self) -> Option<Operation> {
        if self.steps.len() <= 1 {
            return None;
        }
        let step = self.steps.pop()?;
        if let Err(e) = std::fs::remove_file(&step.file) {
            tracing::warn!(file = %step.file.display(), "failed to remove working file: {e}");
        }
        tracing::debug!(operation = %step.operation, "session step undone");
        Some(step.operation)
    }

    /// Write the latest working file to `dest`
    ///
    /// # Errors
    /// Any error of [`convert`].
    pub fn export(&self, dest: impl AsRef<Path>) -> Result<OperationReport> {
        convert(&self.latest().file, dest, &self.config)
    }

    /// Step descriptions, most recent first
    pub fn history(&self) -> Vec<String> {
        self.steps
            .iter()
            .enumerate()
            .rev()
            .map(|(index, step)| {
                if index == 0 {
                    format!("load: {}", file_name(&self.source))
                } else {
                    step.operation.description()
                }
            })
            .collect()
    }

    /// File name for exporting: source stem plus each applied modifier
    ///
    /// e.g. `song_tempo_1.5_reverse.wav`
    pub fn suggested_file_name(&self, extension: &str) -> String {
        let stem = self
            .source
            .file_stem()
            .map_or_else(|| "untitled".into(), |stem| stem.to_string_lossy());

        let mut name = stem.into_owned();
        for step in self.applied() {
            let modifier = step.operation.file_name_modifier();
            if !modifier.is_empty() {
                name.push('_');
                name.push_str(&modifier);
            }
        }
        name.push('.');
        name.push_str(extension.trim_start_matches('.'));
        name
    }

    fn latest(&self) -> &SessionStep {
        // Never empty after `open`
        &self.steps[self.steps.len() - 1]
    }

    fn next_working_file(&mut self) -> PathBuf {
        let path = self.workdir.join(format!("step-{:03}.wav", self.next_file));
        self.next_file += 1;
        path
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}
