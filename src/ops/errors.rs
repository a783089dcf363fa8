//! Error taxonomy for generation runs.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::platform::PlatformError;

/// Error raised while generating projects or master files.
///
/// Only [`GenerateError::UnknownPlatform`] aborts a run. Every other variant
/// is tied to a single project or master file and is aggregated into the
/// run summary.
#[derive(Debug, Clone, Error)]
pub enum GenerateError {
    #[error("unknown platform `{token}` (known platforms: {})", .known.join(", "))]
    UnknownPlatform { token: String, known: Vec<String> },

    #[error("project script does not exist: {}", .script.display())]
    MissingScript { script: PathBuf },

    #[error("failed to parse {}: {message}", .script.display())]
    Parse { script: PathBuf, message: String },

    #[error("generator `{generator}` failed for {}: {message}", .script.display())]
    Generator {
        generator: String,
        script: PathBuf,
        message: String,
    },

    #[error("failed to write hash record {}: {message}", .path.display())]
    HashStore { path: PathBuf, message: String },

    #[error("generator `{generator}` failed to write master file {}: {message}", .path.display())]
    MasterFile {
        generator: String,
        path: PathBuf,
        message: String,
    },
}

impl GenerateError {
    /// Whether this error aborts the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GenerateError::UnknownPlatform { .. })
    }

    /// Script or master file the error is about.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            GenerateError::UnknownPlatform { .. } => None,
            GenerateError::MissingScript { script }
            | GenerateError::Parse { script, .. }
            | GenerateError::Generator { script, .. } => Some(script),
            GenerateError::HashStore { path, .. } | GenerateError::MasterFile { path, .. } => {
                Some(path)
            }
        }
    }
}

impl From<PlatformError> for GenerateError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Unknown { token, known } => {
                GenerateError::UnknownPlatform { token, known }
            }
        }
    }
}
