//! Plugin error types.

use std::path::PathBuf;

use thiserror::Error;

use super::PluginKind;

/// Errors raised while loading or driving a plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No in-process factory and no manifest at the conventional path.
    #[error("{kind} plugin '{name}' not found (searched {})", .path.display())]
    PluginNotFound {
        kind: PluginKind,
        name: String,
        path: PathBuf,
    },

    /// The manifest could not be read or parsed, or declares unknown hooks.
    #[error("invalid plugin manifest {}: {message}", .path.display())]
    InvalidManifest { path: PathBuf, message: String },

    /// The manifest does not declare the expected plugin symbol or role.
    #[error("manifest {} declares '{found}', expected '{expected}'", .path.display())]
    SymbolNotFound {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// The manifest lacks hooks its role requires.
    #[error("plugin '{name}' is missing required hook(s): {}", .hooks.join(", "))]
    MissingHooks { name: String, hooks: Vec<String> },

    /// A hook was called out of order, or returned something it must not.
    #[error("plugin '{plugin}' contract violation: {message}")]
    ContractViolation { plugin: String, message: String },

    /// A hook command exited unsuccessfully.
    #[error("plugin '{plugin}' hook '{hook}' failed{}: {stderr}", exit_suffix(.status))]
    HookFailed {
        plugin: String,
        hook: String,
        status: Option<i32>,
        stderr: String,
    },

    /// A hook command could not be started.
    #[error("plugin '{plugin}' could not start '{program}': {source}")]
    Spawn {
        plugin: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem operation failed inside a hook.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PluginError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a contract violation.
    pub fn contract(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ContractViolation {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Names the plugin on errors raised by trait defaults, which do not
    /// know which plugin they belong to.
    pub(crate) fn attributed_to(self, name: &str) -> Self {
        match self {
            Self::ContractViolation { plugin, message } if plugin.is_empty() => {
                Self::ContractViolation {
                    plugin: name.to_string(),
                    message,
                }
            }
            other => other,
        }
    }

    /// Returns a stable error code for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            PluginError::PluginNotFound { .. } => "PLUGIN_001",
            PluginError::InvalidManifest { .. } => "PLUGIN_002",
            PluginError::SymbolNotFound { .. } => "PLUGIN_003",
            PluginError::MissingHooks { .. } => "PLUGIN_004",
            PluginError::ContractViolation { .. } => "PLUGIN_005",
            PluginError::HookFailed { .. } => "PLUGIN_006",
            PluginError::Spawn { .. } => "PLUGIN_007",
            PluginError::Io { .. } => "PLUGIN_008",
        }
    }
}

fn exit_suffix(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!(" with exit code {}", code),
        None => String::new(),
    }
}
