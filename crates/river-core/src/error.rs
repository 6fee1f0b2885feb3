//! Error types for the orchestration pipeline.
//!
//! Every variant of [`RiverError`] is fatal: a stage that returns one leaves
//! no pipeline state that later stages may trust. Per-test problems are not
//! errors; they surface as [`Diagnostic`](crate::stages::reconcile::Diagnostic)s
//! and `Unavailable` verdicts instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::plugin::PluginError;
use crate::validation::SchemaError;

/// Result type for pipeline operations.
pub type RiverResult<T> = Result<T, RiverError>;

/// Top-level error type for pipeline operations.
#[derive(Debug, Error)]
pub enum RiverError {
    /// Configuration could not be loaded or is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A plugin could not be loaded or broke its contract.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// The test registry failed schema validation.
    #[error("test registry {} failed validation with {} error(s): {}", .path.display(), .errors.len(), summarize(.errors))]
    Validation {
        path: PathBuf,
        errors: Vec<SchemaError>,
    },

    /// Two registry fragments define the same test under the `error` policy.
    #[error("test '{test}' from {origin} is already defined")]
    Collision { test: String, origin: String },

    /// References are disabled, so no verdict can be produced.
    #[error("no reference plugin configured; a run without a reference cannot produce a verdict")]
    ReferenceDisabled,

    /// A device ran but did not produce a machine-readable report.
    #[error("{role} plugin '{plugin}' produced no execution report (expected {})", .path.display())]
    MissingExecutionReport {
        role: String,
        plugin: String,
        path: PathBuf,
    },

    /// Coverage merge was requested but no databases were found.
    #[error("coverage merge requested but no coverage databases were found in {} source(s)", .sources)]
    MissingCoverage { sources: usize },

    /// Malformed line in a JSON-lines execution report.
    #[error("malformed record at {}:{line}: {source}", .path.display())]
    ReportRecord {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem operation failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML (de)serialization failed.
    #[error("YAML error in {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RiverError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps a YAML error with the file it occurred in.
    pub fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.into(),
            source,
        }
    }

    /// Returns a stable error code for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            RiverError::Config(_) => "RIVER_001",
            RiverError::Plugin(e) => e.code(),
            RiverError::Validation { .. } => "RIVER_002",
            RiverError::Collision { .. } => "RIVER_003",
            RiverError::ReferenceDisabled => "RIVER_004",
            RiverError::MissingExecutionReport { .. } => "RIVER_005",
            RiverError::MissingCoverage { .. } => "RIVER_006",
            RiverError::ReportRecord { .. } => "RIVER_007",
            RiverError::Io { .. } => "RIVER_008",
            RiverError::Yaml { .. } => "RIVER_009",
            RiverError::Json(_) => "RIVER_010",
        }
    }
}

fn summarize(errors: &[SchemaError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
