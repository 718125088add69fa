//! Error taxonomy for modules and the merge engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::manifest::validation::ValidationError;

/// Errors raised while loading, watching or merging configuration modules.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The backing source does not exist.
    #[error("configuration source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The backing source exists but could not be decoded.
    #[error("failed to parse {}: {reason}", .path.display())]
    SourceUnparseable { path: PathBuf, reason: String },

    /// No decoder is registered for the file extension.
    #[error("'{}' is not a .json, .yml, .yaml or .toml file", .0.display())]
    SourceExtensionUnsupported(PathBuf),

    /// The file watcher could not be started.
    #[error("failed to watch {}: {reason}", .path.display())]
    WatchSetupFailed { path: PathBuf, reason: String },

    /// The file watcher died after it was started.
    #[error("watch on {} failed: {reason}", .path.display())]
    WatchFailed { path: PathBuf, reason: String },

    /// The configuration has been closed.
    #[error("configuration is closed")]
    ClosedConfiguration,

    /// One or more module watchers did not stop within the shutdown bound.
    #[error("watchers did not stop within {timeout:?}: {}", .modules.join(", "))]
    ShutdownTimedOut { modules: Vec<String>, timeout: Duration },

    /// A dirty-triggered reload failed; the previous merged view is kept.
    #[error("reload of {module} failed: {source}")]
    ReloadFailed {
        module: String,
        #[source]
        source: Arc<ConfigError>,
    },

    /// No module exists at the given position.
    #[error("no module at index {0}")]
    UnknownModule(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The layer manifest is not valid TOML for the manifest schema.
    #[error("manifest parse error: {0}")]
    Manifest(#[from] toml::de::Error),

    /// The layer manifest parsed but failed semantic checks.
    #[error("manifest validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
