//! Plugin contracts and the loader.
//!
//! # Overview
//!
//! Every external tool the pipeline drives is a plugin in one of two roles:
//!
//! - **Generator** ([`GeneratorPlugin`]): `pre_gen -> gen -> post_gen`,
//!   producing a [`TestRegistry`] fragment.
//! - **Device** ([`DevicePlugin`]), shared by the device-under-test and the
//!   reference model: `init -> build -> run -> post_run`, plus the orthogonal
//!   `merge_db` coverage hook.
//!
//! Plugins are resolved by name through a [`PluginCatalog`]: in-process
//! factories first, then the filesystem convention
//! `<search_path>/<name>_plugin/<name>_plugin.json`, a manifest mapping each
//! hook to an external command (see [`subprocess`]).
//!
//! The sessions ([`GeneratorSession`], [`DeviceSession`]) wrap a loaded plugin
//! and reject hooks called out of order.

mod error;
mod loader;
mod manifest;
mod session;
pub mod subprocess;


pub use error::PluginError;
pub use loader::{
    manifest_path, plugin_symbol, DeviceFactory, GeneratorFactory, PluginCatalog, PluginDescriptor,
};
pub use manifest::{HookCommand, PluginManifest, PostGenSpec, MANIFEST_EXTENSION};
pub use session::{DeviceSession, DeviceState, GeneratorSession, GeneratorState};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{CoverageConfig, RiverConfig, RoleConfig};
use crate::coverage::CoverageArtifact;
use crate::registry::TestRegistry;
use crate::report::RecordFilter;

/// Role a plugin is loaded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Generator,
    Device,
}

impl PluginKind {
    /// Returns the lowercase kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Generator => "generator",
            PluginKind::Device => "device",
        }
    }

    /// Hooks a manifest of this kind must provide.
    pub fn required_hooks(&self) -> &'static [&'static str] {
        match self {
            PluginKind::Generator => &["gen"],
            PluginKind::Device => &["build", "run"],
        }
    }

    /// Every hook name a manifest of this kind may declare.
    pub fn known_hooks(&self) -> &'static [&'static str] {
        match self {
            PluginKind::Generator => &["pre_gen", "gen", "post_gen"],
            PluginKind::Device => &["init", "build", "run", "post_run", "merge_db"],
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the comparison a device plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    /// Device under test.
    Target,
    /// Golden reference model.
    Reference,
}

impl DeviceRole {
    /// Per-test dump file this role writes into the test's work directory.
    pub fn dump_file_name(&self) -> &'static str {
        match self {
            DeviceRole::Target => "dut.dump",
            DeviceRole::Reference => "ref.dump",
        }
    }

    /// Directory under the run's work directory owned by devices of this role.
    pub fn subdir(&self) -> &'static str {
        match self {
            DeviceRole::Target => "dut",
            DeviceRole::Reference => "ref",
        }
    }

    /// Returns the lowercase role name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceRole::Target => "target",
            DeviceRole::Reference => "reference",
        }
    }

    /// Plugin search path configured for this role.
    pub fn search_path<'a>(&self, config: &'a RiverConfig) -> &'a Path {
        match self {
            DeviceRole::Target => &config.path_to_target,
            DeviceRole::Reference => &config.path_to_ref,
        }
    }

    /// Device work directory: `<work_dir>/<dut|ref>/<name>`.
    pub fn work_dir(&self, config: &RiverConfig, name: &str) -> PathBuf {
        config.work_dir.join(self.subdir()).join(name)
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to a generator's `gen` hook.
#[derive(Debug, Clone, Copy)]
pub struct GenRequest<'a> {
    /// Run configuration; `config.source` is the config path.
    pub config: &'a RiverConfig,
    /// The suite's own section, with job/seed/count hints.
    pub role: &'a RoleConfig,
    /// Directory the plugin was loaded from.
    pub module_dir: &'a Path,
    /// Directory the suite writes its tests into.
    pub output_dir: &'a Path,
}

/// Inputs to a device's `init` hook.
#[derive(Debug, Clone, Copy)]
pub struct DeviceInit<'a> {
    /// Run configuration.
    pub config: &'a RiverConfig,
    /// The device's own section.
    pub settings: &'a RoleConfig,
    /// Registry of the tests to build and run.
    pub registry: &'a TestRegistry,
    /// Where that registry is persisted.
    pub registry_path: &'a Path,
    /// Directory the device owns for build and run artifacts.
    pub work_dir: &'a Path,
    /// Coverage settings, when coverage collection was requested.
    pub coverage: Option<&'a CoverageConfig>,
    /// Directory the plugin was loaded from.
    pub plugin_path: &'a Path,
    /// Run ISA.
    pub isa: &'a str,
    /// Side of the comparison.
    pub role: DeviceRole,
}

/// A test generator.
pub trait GeneratorPlugin {
    /// Prepares the output directory.
    ///
    /// The default clears and recreates it.
    fn pre_gen(&mut self, role: &RoleConfig, output_dir: &Path) -> Result<(), PluginError> {
        let _ = role;
        prepare_output_dir(output_dir)
    }

    /// Generates tests and describes them.
    fn gen(&mut self, request: &GenRequest<'_>) -> Result<TestRegistry, PluginError>;

    /// Finalizes generated artifacts.
    fn post_gen(&mut self, role: &RoleConfig, output_dir: &Path) -> Result<(), PluginError>;
}

/// A device under test or a reference model.
pub trait DevicePlugin {
    /// Receives the run inputs.
    fn init(&mut self, init: &DeviceInit<'_>) -> Result<(), PluginError>;

    /// Builds every test of the registry passed to `init`.
    fn build(&mut self) -> Result<(), PluginError>;

    /// Runs the built tests, writing one dump per test.
    ///
    /// Returns the execution report path without extension; the report
    /// itself is `<path>.json`.
    fn run(&mut self, module_dir: &Path) -> Result<PathBuf, PluginError>;

    /// Cleans up after a complete comparison.
    fn post_run(&mut self, registry: &TestRegistry, config: &RiverConfig) -> Result<(), PluginError> {
        let _ = (registry, config);
        Ok(())
    }

    /// Merges coverage databases into `output_db`, returning the HTML
    /// summaries written.
    fn merge_db(
        &mut self,
        db_files: &[CoverageArtifact],
        output_db: &Path,
        config: &RiverConfig,
    ) -> Result<Vec<PathBuf>, PluginError> {
        let _ = (db_files, output_db, config);
        Err(PluginError::contract("", "merge_db is not supported by this device"))
    }

    /// Which execution report records count toward outcomes.
    fn record_filter(&self) -> RecordFilter {
        RecordFilter::default()
    }
}

/// Clears and recreates a generator output directory.
pub(crate) fn prepare_output_dir(output_dir: &Path) -> Result<(), PluginError> {
    if output_dir.exists() {
        fs::remove_dir_all(output_dir).map_err(|e| PluginError::io(output_dir, e))?;
    }
    fs::create_dir_all(output_dir).map_err(|e| PluginError::io(output_dir, e))
}
