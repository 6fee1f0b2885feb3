//! Plugin manifest types for filesystem-discovered plugins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::{PluginError, PluginKind};
use crate::report::RecordFilter;

/// Extension of plugin manifest files.
pub const MANIFEST_EXTENSION: &str = "json";

/// An external command bound to one hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookCommand {
    /// Executable name or path. Relative paths resolve against the plugin
    /// directory; bare names are looked up on `PATH`.
    pub program: String,
    /// Arguments, with `{placeholder}` substitution.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables, with `{placeholder}` substitution in values.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl HookCommand {
    /// Creates a hook command.
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: BTreeMap::new(),
        }
    }
}

/// Built-in post-gen steps a generator can opt into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostGenSpec {
    /// Name prefix of temporary run directories to demote into per-test
    /// directories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_dir_prefix: Option<String>,
}

/// Manifest describing a filesystem plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginManifest {
    /// Plugin symbol; must be `<name>_plugin`.
    pub name: String,
    /// Role the plugin implements.
    pub kind: PluginKind,
    /// Plugin version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Description of the plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hook name to command.
    pub hooks: BTreeMap<String, HookCommand>,
    /// Built-in post-gen steps (generators only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_gen: Option<PostGenSpec>,
    /// Record filter for execution reports (devices only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_filter: Option<RecordFilter>,
}

impl PluginManifest {
    /// Creates a manifest with no hooks.
    pub fn new(name: impl Into<String>, kind: PluginKind) -> Self {
        Self {
            name: name.into(),
            kind,
            version: None,
            description: None,
            hooks: BTreeMap::new(),
            post_gen: None,
            record_filter: None,
        }
    }

    /// Adds a hook.
    pub fn with_hook(mut self, hook: &str, command: HookCommand) -> Self {
        self.hooks.insert(hook.to_string(), command);
        self
    }

    /// Reads and parses a manifest file.
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        let text = fs::read_to_string(path).map_err(|e| PluginError::InvalidManifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| PluginError::InvalidManifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Serializes the manifest to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Checks the manifest against the symbol and role it was loaded for.
    pub fn validate(&self, symbol: &str, kind: PluginKind, path: &Path) -> Result<(), PluginError> {
        if self.name != symbol || self.kind != kind {
            return Err(PluginError::SymbolNotFound {
                path: path.to_path_buf(),
                expected: format!("{} ({})", symbol, kind),
                found: format!("{} ({})", self.name, self.kind),
            });
        }

        let unknown: Vec<_> = self
            .hooks
            .keys()
            .filter(|h| !kind.known_hooks().contains(&h.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(PluginError::InvalidManifest {
                path: path.to_path_buf(),
                message: format!("unknown {} hook(s): {}", kind, unknown.join(", ")),
            });
        }

        if let Some(command) = self.hooks.values().find(|c| c.program.trim().is_empty()) {
            return Err(PluginError::InvalidManifest {
                path: path.to_path_buf(),
                message: format!("hook command has an empty program: {:?}", command.args),
            });
        }

        let missing: Vec<_> = kind
            .required_hooks()
            .iter()
            .filter(|h| !self.hooks.contains_key(**h))
            .map(|h| h.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PluginError::MissingHooks {
                name: self.name.clone(),
                hooks: missing,
            });
        }

        if kind == PluginKind::Device && self.post_gen.is_some() {
            return Err(PluginError::InvalidManifest {
                path: path.to_path_buf(),
                message: "post_gen settings are only valid for generators".to_string(),
            });
        }

        Ok(())
    }
}
