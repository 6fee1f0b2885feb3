//! Configuration loading from `river_core.toml`.
//!
//! The configuration is read once per invocation into an immutable
//! [`RiverConfig`] that is passed explicitly to every stage and plugin call.
//! The `[river_core]` table selects suites, devices and plugin search paths,
//! `[coverage]` toggles coverage collection, and every other table is the
//! section of a plugin with the same name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::coverage::ReportKind;

/// Sample configuration written by `river_core setup --config`.
pub const SAMPLE_CONFIG: &str = r#"[river_core]
# Directory holding generated tests, device artifacts and reports
work_dir = "work"
isa = "rv64imafdc"
# Comma separated lists; an empty target disables the device-under-test
generator = "sample_gen"
target = "sample_dut"
reference = "sample_ref"
# Plugin search paths; each plugin lives in <path>/<name>_plugin/
path_to_suite = "plugins"
path_to_target = "plugins"
path_to_ref = "plugins"
# error | first-wins | last-wins
collision_policy = "last-wins"

[coverage]
code = false
functional = false

[sample_gen]
jobs = 1
seed = "random"
count = 1

[sample_dut]
jobs = 1
count = 1

[sample_ref]
jobs = 1
count = 1
"#;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the config file.
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A configured plugin has no section of its own.
    #[error("config has no [{section}] section")]
    MissingSection { section: String },

    /// A key holds a value of the wrong shape.
    #[error("invalid value for {section}.{key}: {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },
}

/// How to resolve two registry fragments that define the same test name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Abort the stage.
    Error,
    /// Keep the entry that was merged first.
    FirstWins,
    /// Overwrite with the entry merged last.
    #[default]
    LastWins,
}

/// The `[coverage]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Collect code coverage.
    #[serde(default)]
    pub code: bool,
    /// Collect functional coverage.
    #[serde(default)]
    pub functional: bool,
    /// Tool-specific keys passed through to plugins.
    #[serde(flatten)]
    pub settings: toml::Table,
}

impl CoverageConfig {
    /// Whether any kind of coverage is enabled.
    pub fn enabled(&self) -> bool {
        self.code || self.functional
    }

    /// Enabled report kinds.
    pub fn kinds(&self) -> Vec<ReportKind> {
        let mut kinds = Vec::new();
        if self.code {
            kinds.push(ReportKind::Code);
        }
        if self.functional {
            kinds.push(ReportKind::Functional);
        }
        kinds
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    river_core: RawCore,
    #[serde(default)]
    coverage: CoverageConfig,
    #[serde(flatten)]
    sections: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCore {
    work_dir: PathBuf,
    isa: String,
    #[serde(default)]
    generator: String,
    #[serde(default)]
    target: String,
    #[serde(default)]
    reference: String,
    #[serde(default)]
    path_to_suite: Option<PathBuf>,
    #[serde(default)]
    path_to_target: Option<PathBuf>,
    #[serde(default)]
    path_to_ref: Option<PathBuf>,
    #[serde(default)]
    collision_policy: CollisionPolicy,
}

/// Immutable pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RiverConfig {
    /// Config file this was loaded from.
    pub source: PathBuf,
    /// Root of every artifact produced by a run.
    pub work_dir: PathBuf,
    /// Target ISA string, injected into every role section.
    pub isa: String,
    /// Generator suites, in run order.
    pub generators: Vec<String>,
    /// Device-under-test plugins; empty means disabled.
    pub targets: Vec<String>,
    /// Reference plugins; empty means disabled.
    pub references: Vec<String>,
    /// Search path for generator plugins.
    pub path_to_suite: PathBuf,
    /// Search path for target plugins.
    pub path_to_target: PathBuf,
    /// Search path for reference plugins.
    pub path_to_ref: PathBuf,
    /// Test-name collision policy for suite and merge-source folding.
    pub collision_policy: CollisionPolicy,
    /// Coverage settings.
    pub coverage: CoverageConfig,
    sections: BTreeMap<String, toml::Table>,
}

impl RiverConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Parses configuration text; relative paths resolve against the
    /// directory of `path`.
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let resolve = |p: Option<PathBuf>| match p {
            Some(p) if p.is_absolute() => p,
            Some(p) => base_dir.join(p),
            None => base_dir.to_path_buf(),
        };

        let mut sections = BTreeMap::new();
        for (name, value) in raw.sections {
            match value {
                toml::Value::Table(table) => {
                    sections.insert(name, table);
                }
                other => {
                    return Err(ConfigError::InvalidValue {
                        section: name,
                        key: String::new(),
                        message: format!("expected a table, got {}", other.type_str()),
                    });
                }
            }
        }

        Ok(Self {
            source: path.to_path_buf(),
            work_dir: resolve(Some(raw.river_core.work_dir)),
            isa: raw.river_core.isa,
            generators: parse_role_list(&raw.river_core.generator),
            targets: parse_role_list(&raw.river_core.target),
            references: parse_role_list(&raw.river_core.reference),
            path_to_suite: resolve(raw.river_core.path_to_suite),
            path_to_target: resolve(raw.river_core.path_to_target),
            path_to_ref: resolve(raw.river_core.path_to_ref),
            collision_policy: raw.river_core.collision_policy,
            coverage: raw.coverage,
            sections,
        })
    }

    /// Returns the section for a plugin name, with the run ISA injected.
    pub fn role(&self, name: &str) -> Result<RoleConfig, ConfigError> {
        let table = self
            .sections
            .get(name)
            .ok_or_else(|| ConfigError::MissingSection {
                section: name.to_string(),
            })?;
        RoleConfig::from_table(name, &self.isa, table)
    }

    /// Returns true if this config has a section for `name`.
    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Returns the target used for coverage merges: the first configured one.
    pub fn primary_target(&self) -> Option<&str> {
        self.targets.first().map(String::as_str)
    }
}

/// Splits a comma separated role list, dropping whitespace and empty names.
pub fn parse_role_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One plugin's configuration section.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleConfig {
    /// Plugin name (the section name).
    pub name: String,
    /// Run ISA.
    pub isa: String,
    /// Job-count hint for the plugin's own parallelism.
    pub jobs: usize,
    /// Seed, as configured (`random` or a number).
    pub seed: Option<String>,
    /// Times to run each test.
    pub count: u32,
    /// Every key of the section, passed through untouched.
    pub settings: toml::Table,
}

impl RoleConfig {
    /// Builds a role config from a TOML table.
    pub fn from_table(name: &str, isa: &str, table: &toml::Table) -> Result<Self, ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            section: name.to_string(),
            key: key.to_string(),
            message: message.to_string(),
        };

        let jobs = match table.get("jobs") {
            None => 1,
            Some(toml::Value::Integer(n)) if *n > 0 => *n as usize,
            Some(_) => return Err(invalid("jobs", "expected a positive integer")),
        };
        let count = match table.get("count") {
            None => 1,
            Some(toml::Value::Integer(n)) if *n > 0 && *n <= u32::MAX as i64 => *n as u32,
            Some(_) => return Err(invalid("count", "expected a positive integer")),
        };
        let seed = table.get("seed").map(value_to_string);

        Ok(Self {
            name: name.to_string(),
            isa: isa.to_string(),
            jobs,
            seed,
            count,
            settings: table.clone(),
        })
    }

    /// Creates a role config with default hints and no extra settings.
    pub fn new(name: impl Into<String>, isa: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            isa: isa.into(),
            jobs: 1,
            seed: None,
            count: 1,
            settings: toml::Table::new(),
        }
    }

    /// Reads a setting as a string, whatever its TOML type.
    pub fn setting(&self, key: &str) -> Option<String> {
        self.settings.get(key).map(value_to_string)
    }
}

fn value_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
