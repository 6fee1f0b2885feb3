//! Setup stage: sample configuration and plugin scaffolding.
//!
//! Scaffolded plugins are subprocess plugins whose hooks run small `sh`
//! scripts next to the manifest. The scripts are placeholders that satisfy
//! the hook contract without doing any real work.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::SAMPLE_CONFIG;
use crate::error::{RiverError, RiverResult};
use crate::plugin::{manifest_path, HookCommand, PluginKind, PluginManifest};

/// File name of the sample configuration.
pub const CONFIG_FILE: &str = "river_core.toml";

/// Which plugin role to scaffold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaffoldRole {
    Generator,
    Target,
    Reference,
}

impl ScaffoldRole {
    fn kind(self) -> PluginKind {
        match self {
            ScaffoldRole::Generator => PluginKind::Generator,
            ScaffoldRole::Target | ScaffoldRole::Reference => PluginKind::Device,
        }
    }

    fn description(self) -> &'static str {
        match self {
            ScaffoldRole::Generator => "test generator",
            ScaffoldRole::Target => "device under test",
            ScaffoldRole::Reference => "reference model",
        }
    }
}

/// Files written by [`write_sample_config`] or [`scaffold_plugin`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupOutcome {
    /// Files created.
    pub written: Vec<PathBuf>,
    /// Files that already existed and were left alone.
    pub skipped: Vec<PathBuf>,
}

impl SetupOutcome {
    fn merge(&mut self, other: SetupOutcome) {
        self.written.extend(other.written);
        self.skipped.extend(other.skipped);
    }
}

/// Writes `river_core.toml` into `dir` unless one is already there.
pub fn write_sample_config(dir: &Path) -> RiverResult<SetupOutcome> {
    let mut outcome = SetupOutcome::default();
    write_new(&dir.join(CONFIG_FILE), SAMPLE_CONFIG, &mut outcome)?;
    Ok(outcome)
}

/// Creates `<dir>/<name>_plugin/` with a manifest and hook scripts.
pub fn scaffold_plugin(dir: &Path, name: &str, role: ScaffoldRole) -> RiverResult<SetupOutcome> {
    let manifest_file = manifest_path(dir, name);
    let plugin_dir = manifest_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.to_path_buf());
    fs::create_dir_all(&plugin_dir).map_err(|e| RiverError::io(&plugin_dir, e))?;

    let mut outcome = SetupOutcome::default();
    let manifest = sample_manifest(name, role);
    let json = manifest.to_json_pretty()?;
    write_new(&manifest_file, &format!("{}\n", json), &mut outcome)?;

    for (file, body) in sample_scripts(role) {
        write_new(&plugin_dir.join(file), body, &mut outcome)?;
    }
    info!("scaffolded {} plugin {} in {}", role.description(), name, plugin_dir.display());
    Ok(outcome)
}

/// Runs every requested setup step.
pub fn run(
    dir: &Path,
    config: bool,
    plugins: &[(ScaffoldRole, String)],
) -> RiverResult<SetupOutcome> {
    let mut outcome = SetupOutcome::default();
    if config {
        outcome.merge(write_sample_config(dir)?);
    }
    for (role, name) in plugins {
        outcome.merge(scaffold_plugin(dir, name, *role)?);
    }
    Ok(outcome)
}

fn sample_manifest(name: &str, role: ScaffoldRole) -> PluginManifest {
    let symbol = format!("{}_plugin", name);
    let mut manifest = PluginManifest::new(symbol, role.kind());
    manifest.version = Some("0.1.0".to_string());
    manifest.description = Some(format!("Sample {} plugin", role.description()));
    match role {
        ScaffoldRole::Generator => manifest.with_hook(
            "gen",
            HookCommand::new("sh", &["gen.sh", "{fragment}", "{output_dir}", "{count}"]),
        ),
        ScaffoldRole::Target | ScaffoldRole::Reference => manifest
            .with_hook(
                "build",
                HookCommand::new("sh", &["build.sh", "{work_dir}", "{registry}"]),
            )
            .with_hook(
                "run",
                HookCommand::new("sh", &["run.sh", "{work_dir}", "{report}", "{role}"]),
            ),
    }
}

fn sample_scripts(role: ScaffoldRole) -> Vec<(&'static str, &'static str)> {
    match role {
        ScaffoldRole::Generator => vec![(
            "gen.sh",
            "#!/bin/sh\n# $1: fragment to write, $2: output directory, $3: test count\nmkdir -p \"$2\"\necho '{}' > \"$1\"\n",
        )],
        ScaffoldRole::Target | ScaffoldRole::Reference => vec![
            (
                "build.sh",
                "#!/bin/sh\n# $1: work directory, $2: test list\nmkdir -p \"$1\"\n",
            ),
            (
                "run.sh",
                "#!/bin/sh\n# $1: work directory, $2: report path without extension, $3: role\n: > \"$2.json\"\n",
            ),
        ],
    }
}

fn write_new(path: &Path, contents: &str, outcome: &mut SetupOutcome) -> RiverResult<()> {
    if path.exists() {
        warn!("{} already exists; leaving it untouched", path.display());
        outcome.skipped.push(path.to_path_buf());
        return Ok(());
    }
    fs::write(path, contents).map_err(|e| RiverError::io(path, e))?;
    outcome.written.push(path.to_path_buf());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiverConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sample_config_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let outcome = write_sample_config(tmp.path()).unwrap();
        assert_eq!(outcome.written, vec![tmp.path().join(CONFIG_FILE)]);

        let config = RiverConfig::load(&tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.generators, vec!["sample_gen".to_string()]);
        assert_eq!(config.work_dir, tmp.path().join("work"));
        assert!(config.has_section("sample_ref"));
    }

    #[test]
    fn test_existing_config_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "# mine\n").unwrap();

        let outcome = write_sample_config(tmp.path()).unwrap();
        assert!(outcome.written.is_empty());
        assert_eq!(outcome.skipped, vec![path.clone()]);
        assert_eq!(fs::read_to_string(path).unwrap(), "# mine\n");
    }

    #[test]
    fn test_scaffolded_manifests_validate() {
        let tmp = tempfile::tempdir().unwrap();
        let plugins = [
            (ScaffoldRole::Generator, "sample_gen".to_string()),
            (ScaffoldRole::Target, "sample_dut".to_string()),
            (ScaffoldRole::Reference, "sample_ref".to_string()),
        ];
        let outcome = run(tmp.path(), false, &plugins).unwrap();
        assert_eq!(outcome.written.len(), 2 + 3 + 3);

        for (role, name) in &plugins {
            let path = manifest_path(tmp.path(), name);
            let manifest = PluginManifest::load(&path).unwrap();
            manifest
                .validate(&format!("{}_plugin", name), role.kind(), &path)
                .unwrap();
        }
        assert!(tmp.path().join("sample_dut_plugin/run.sh").is_file());
    }
}
