//! Filesystem plugins whose hooks are external commands.
//!
//! # Protocol
//!
//! Each hook named in the manifest is spawned with its arguments after
//! `{placeholder}` substitution. The working directory is the plugin
//! directory and stdin is closed. Exit code 0 is success; anything else is
//! a fatal [`PluginError::HookFailed`] carrying stderr.
//!
//! | placeholder | value |
//! |-------------|-------|
//! | `{output_dir}` | generator output directory |
//! | `{config_path}` | configuration file |
//! | `{module_dir}`, `{plugin_path}` | plugin directory |
//! | `{work_dir}` | device work directory |
//! | `{registry}` | persisted test list |
//! | `{isa}`, `{jobs}`, `{seed}`, `{count}` | run ISA and role hints |
//! | `{report}` | execution report path, without `.json` |
//! | `{fragment}` | file `gen` writes its YAML test mapping to |
//! | `{db_list}` | file listing coverage databases, one per line |
//! | `{output_db}` | coverage merge output directory |
//! | `{summary}` | file `merge_db` writes HTML summary paths to |
//!
//! Unknown placeholders are left untouched.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use super::{
    prepare_output_dir, DeviceInit, DevicePlugin, GenRequest, GeneratorPlugin, HookCommand,
    PluginError, PluginManifest,
};
use crate::config::{RiverConfig, RoleConfig};
use crate::coverage::CoverageArtifact;
use crate::registry::TestRegistry;
use crate::regression::{self, RegressionList};
use crate::report::RecordFilter;
use crate::validation::validate_registry_value;

/// File a subprocess generator's `gen` hook writes its tests to, inside the
/// output directory. Removed once read.
pub const FRAGMENT_FILE: &str = ".river_fragment.yaml";

/// Base name of a subprocess device's execution report, inside its work
/// directory.
pub const REPORT_BASENAME: &str = "report";

/// File listing coverage databases for `merge_db`, inside the output directory.
pub const DB_LIST_FILE: &str = "db_list.txt";

/// File `merge_db` writes HTML summary paths to, inside the output directory.
pub const MERGE_SUMMARY_FILE: &str = "merge_db_summary.txt";

/// Placeholder values for hook arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookContext {
    values: BTreeMap<String, String>,
}

impl HookContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a placeholder value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Sets a placeholder to a path.
    pub fn set_path(&mut self, key: &str, path: &Path) -> &mut Self {
        self.set(key, path.to_string_lossy())
    }

    /// Returns a placeholder value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Sets the hints every hook of a role sees.
    pub fn set_role(&mut self, role: &RoleConfig) -> &mut Self {
        self.set("isa", role.isa.as_str())
            .set("jobs", role.jobs.to_string())
            .set("seed", role.seed.clone().unwrap_or_else(|| "random".to_string()))
            .set("count", role.count.to_string())
    }

    /// Replaces every `{key}` in `text` with its value in one left-to-right
    /// pass. Substituted values are never expanded again.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}').map(|close| (close, &after[..close])) {
                Some((close, key)) if !key.contains('{') => match self.values.get(key) {
                    Some(value) => {
                        out.push_str(value);
                        rest = &after[close + 1..];
                    }
                    None => {
                        out.push_str(&rest[open..open + close + 2]);
                        rest = &after[close + 1..];
                    }
                },
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Runs one hook command.
pub fn run_hook(
    plugin: &str,
    hook: &str,
    command: &HookCommand,
    context: &HookContext,
    plugin_dir: &Path,
) -> Result<(), PluginError> {
    let program = resolve_program(&command.program, plugin_dir).map_err(|source| {
        PluginError::Spawn {
            plugin: plugin.to_string(),
            program: command.program.clone(),
            source,
        }
    })?;

    let args: Vec<String> = command.args.iter().map(|a| context.substitute(a)).collect();
    debug!("{}: {} -> {} {}", plugin, hook, program.display(), args.join(" "));

    let mut cmd = Command::new(&program);
    cmd.args(&args);
    for (key, value) in &command.env {
        cmd.env(key, context.substitute(value));
    }
    if plugin_dir.is_dir() {
        cmd.current_dir(plugin_dir);
    }
    cmd.stdin(Stdio::null());

    let output = cmd.output().map_err(|source| PluginError::Spawn {
        plugin: plugin.to_string(),
        program: command.program.clone(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        debug!("{}: {}", plugin, line);
    }

    if !output.status.success() {
        return Err(PluginError::HookFailed {
            plugin: plugin.to_string(),
            hook: hook.to_string(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

fn resolve_program(program: &str, plugin_dir: &Path) -> io::Result<PathBuf> {
    if program.contains('/') || program.contains(std::path::MAIN_SEPARATOR) {
        let path = Path::new(program);
        return Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            plugin_dir.join(path)
        });
    }
    which::which(program).map_err(|e| io::Error::new(io::ErrorKind::NotFound, e.to_string()))
}

/// Generator driven by manifest hooks.
#[derive(Debug, Clone)]
pub struct SubprocessGenerator {
    name: String,
    dir: PathBuf,
    manifest: PluginManifest,
}

impl SubprocessGenerator {
    /// Creates a generator from a validated manifest.
    pub fn new(name: &str, dir: PathBuf, manifest: PluginManifest) -> Self {
        Self {
            name: name.to_string(),
            dir,
            manifest,
        }
    }

    fn context(&self, role: &RoleConfig, output_dir: &Path) -> HookContext {
        let mut context = HookContext::new();
        context
            .set_role(role)
            .set_path("output_dir", output_dir)
            .set_path("module_dir", &self.dir)
            .set_path("plugin_path", &self.dir);
        context
    }

    fn run_optional(&self, hook: &str, context: &HookContext) -> Result<(), PluginError> {
        match self.manifest.hooks.get(hook) {
            Some(command) => run_hook(&self.name, hook, command, context, &self.dir),
            None => Ok(()),
        }
    }

    fn merge_regression_list(&self, role: &RoleConfig, output_dir: &Path) -> Result<(), PluginError> {
        let Some(setting) = role.setting("regress_list") else {
            return Ok(());
        };
        let path = PathBuf::from(setting);
        let path = if path.is_absolute() {
            path
        } else {
            output_dir.parent().unwrap_or(output_dir).join(path)
        };

        let builtin = |e: crate::RiverError| PluginError::HookFailed {
            plugin: self.name.clone(),
            hook: "post_gen".to_string(),
            status: None,
            stderr: e.to_string(),
        };
        let entry = regression::scan_suite_dir(output_dir).map_err(builtin)?;
        let mut list = RegressionList::load(&path).map_err(builtin)?;
        list.merge_suite(&self.name, entry);
        list.save(&path).map_err(builtin)?;
        info!("{}: regression list updated at {}", self.name, path.display());
        Ok(())
    }
}

impl GeneratorPlugin for SubprocessGenerator {
    fn pre_gen(&mut self, role: &RoleConfig, output_dir: &Path) -> Result<(), PluginError> {
        prepare_output_dir(output_dir)?;
        self.run_optional("pre_gen", &self.context(role, output_dir))
    }

    fn gen(&mut self, request: &GenRequest<'_>) -> Result<TestRegistry, PluginError> {
        let fragment = request.output_dir.join(FRAGMENT_FILE);
        let mut context = self.context(request.role, request.output_dir);
        context
            .set_path("config_path", &request.config.source)
            .set_path("fragment", &fragment);

        // `gen` is required, so validation guarantees it is present
        let command = self
            .manifest
            .hooks
            .get("gen")
            .ok_or_else(|| PluginError::MissingHooks {
                name: self.name.clone(),
                hooks: vec!["gen".to_string()],
            })?;
        run_hook(&self.name, "gen", command, &context, &self.dir)?;

        let text = fs::read_to_string(&fragment).map_err(|e| {
            PluginError::contract(
                &self.name,
                format!("gen did not write a test list to {}: {}", fragment.display(), e),
            )
        })?;
        fs::remove_file(&fragment).map_err(|e| PluginError::io(&fragment, e))?;
        parse_fragment(&self.name, &text)
    }

    fn post_gen(&mut self, role: &RoleConfig, output_dir: &Path) -> Result<(), PluginError> {
        self.run_optional("post_gen", &self.context(role, output_dir))?;

        if let Some(prefix) = self
            .manifest
            .post_gen
            .as_ref()
            .and_then(|p| p.run_dir_prefix.as_deref())
        {
            let moved = regression::demote_run_dirs(output_dir, prefix).map_err(|e| {
                PluginError::HookFailed {
                    plugin: self.name.clone(),
                    hook: "post_gen".to_string(),
                    status: None,
                    stderr: e.to_string(),
                }
            })?;
            debug!("{}: demoted {} test(s)", self.name, moved);
        }

        self.merge_regression_list(role, output_dir)
    }
}

/// Parses the YAML a generator wrote, which must be a valid test mapping.
fn parse_fragment(plugin: &str, text: &str) -> Result<TestRegistry, PluginError> {
    let value: serde_yaml::Value = serde_yaml::from_str(text)
        .map_err(|e| PluginError::contract(plugin, format!("gen wrote malformed YAML: {}", e)))?;
    if !value.is_mapping() {
        return Err(PluginError::contract(
            plugin,
            "gen must produce a mapping from test name to test entry",
        ));
    }
    let errors = validate_registry_value(&value);
    if !errors.is_empty() {
        let listed: Vec<_> = errors.iter().map(|e| e.to_string()).collect();
        return Err(PluginError::contract(
            plugin,
            format!("gen produced an invalid test list: {}", listed.join("; ")),
        ));
    }
    serde_yaml::from_value(value)
        .map_err(|e| PluginError::contract(plugin, format!("gen produced an invalid test list: {}", e)))
}

/// Device driven by manifest hooks.
#[derive(Debug, Clone)]
pub struct SubprocessDevice {
    name: String,
    dir: PathBuf,
    manifest: PluginManifest,
    context: HookContext,
    work_dir: Option<PathBuf>,
}

impl SubprocessDevice {
    /// Creates a device from a validated manifest.
    pub fn new(name: &str, dir: PathBuf, manifest: PluginManifest) -> Self {
        Self {
            name: name.to_string(),
            dir,
            manifest,
            context: HookContext::new(),
            work_dir: None,
        }
    }

    fn run_required(&self, hook: &str) -> Result<(), PluginError> {
        let command = self.manifest.hooks.get(hook).ok_or_else(|| PluginError::MissingHooks {
            name: self.name.clone(),
            hooks: vec![hook.to_string()],
        })?;
        run_hook(&self.name, hook, command, &self.context, &self.dir)
    }

    fn run_optional(&self, hook: &str) -> Result<(), PluginError> {
        match self.manifest.hooks.get(hook) {
            Some(command) => run_hook(&self.name, hook, command, &self.context, &self.dir),
            None => Ok(()),
        }
    }
}

impl DevicePlugin for SubprocessDevice {
    fn init(&mut self, init: &DeviceInit<'_>) -> Result<(), PluginError> {
        fs::create_dir_all(init.work_dir).map_err(|e| PluginError::io(init.work_dir, e))?;

        let coverage = init
            .coverage
            .map(|c| {
                c.kinds()
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();

        let mut context = HookContext::new();
        context
            .set_role(init.settings)
            .set("isa", init.isa)
            .set("role", init.role.as_str())
            .set("coverage", coverage)
            .set_path("config_path", &init.config.source)
            .set_path("work_dir", init.work_dir)
            .set_path("registry", init.registry_path)
            .set_path("plugin_path", init.plugin_path)
            .set_path("module_dir", &self.dir);
        self.context = context;
        self.work_dir = Some(init.work_dir.to_path_buf());

        debug!("{}: initialized with {} test(s)", self.name, init.registry.len());
        self.run_optional("init")
    }

    fn build(&mut self) -> Result<(), PluginError> {
        self.run_required("build")
    }

    fn run(&mut self, module_dir: &Path) -> Result<PathBuf, PluginError> {
        let work_dir = self
            .work_dir
            .clone()
            .ok_or_else(|| PluginError::contract(&self.name, "run called before init"))?;
        let report = work_dir.join(REPORT_BASENAME);
        self.context
            .set_path("module_dir", module_dir)
            .set_path("report", &report);
        self.run_required("run")?;
        Ok(report)
    }

    fn post_run(&mut self, _registry: &TestRegistry, _config: &RiverConfig) -> Result<(), PluginError> {
        self.run_optional("post_run")
    }

    fn merge_db(
        &mut self,
        db_files: &[CoverageArtifact],
        output_db: &Path,
        config: &RiverConfig,
    ) -> Result<Vec<PathBuf>, PluginError> {
        let Some(command) = self.manifest.hooks.get("merge_db") else {
            return Err(PluginError::contract(
                &self.name,
                "merge_db is not supported by this device",
            ));
        };

        fs::create_dir_all(output_db).map_err(|e| PluginError::io(output_db, e))?;
        let db_list = output_db.join(DB_LIST_FILE);
        let summary = output_db.join(MERGE_SUMMARY_FILE);
        let listing: String = db_files
            .iter()
            .map(|a| format!("{}\n", a.path.display()))
            .collect();
        fs::write(&db_list, listing).map_err(|e| PluginError::io(&db_list, e))?;

        let mut context = HookContext::new();
        context
            .set("isa", config.isa.as_str())
            .set_path("config_path", &config.source)
            .set_path("plugin_path", &self.dir)
            .set_path("module_dir", &self.dir)
            .set_path("output_db", output_db)
            .set_path("db_list", &db_list)
            .set_path("summary", &summary);
        run_hook(&self.name, "merge_db", command, &context, &self.dir)?;

        let text = fs::read_to_string(&summary).map_err(|e| {
            PluginError::contract(
                &self.name,
                format!("merge_db did not write {}: {}", summary.display(), e),
            )
        })?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| {
                let path = PathBuf::from(l);
                if path.is_absolute() {
                    path
                } else {
                    output_db.join(path)
                }
            })
            .collect())
    }

    fn record_filter(&self) -> RecordFilter {
        self.manifest.record_filter.clone().unwrap_or_default()
    }
}
