/// CLI configuration
///
/// Loaded from an optional `tuneshift.toml` and `TUNESHIFT_*` environment
/// variables; command-line flags are applied on top by `main`.
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tuneshift_audio::OperationConfig;

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "tuneshift.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub operation: OperationConfig,

    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputSettings {
    /// Replace existing output files
    #[serde(default)]
    pub overwrite: bool,

    /// Print progress while an operation runs
    #[serde(default)]
    pub progress: bool,
}

impl CliConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `tuneshift.toml` is used when
    /// present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables, e.g. TUNESHIFT_OPERATION__SCRATCH_DIR
        settings = settings.add_source(
            config::Environment::with_prefix("TUNESHIFT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(settings.build()?.try_deserialize()?)
    }
}
