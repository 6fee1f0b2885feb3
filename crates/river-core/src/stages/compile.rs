//! Compile/run stage: drive every target and reference device, then
//! reconcile their dumps.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use crate::config::RiverConfig;
use crate::error::{RiverError, RiverResult};
use crate::plugin::{DeviceInit, DeviceRole, DeviceSession, PluginCatalog};
use crate::registry::TestRegistry;
use crate::report::{RunReport, RunSummary};
use crate::stages::reconcile::{self, Diagnostic};

/// How far a device's lifecycle is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum StageFlag {
    /// The device is not loaded at all.
    Disabled,
    /// `init` only.
    Init,
    /// `init` and `build`.
    Build,
    /// `init`, `build` and `run`.
    #[default]
    Run,
}

impl StageFlag {
    /// Returns the flag name as accepted on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageFlag::Disabled => "none",
            StageFlag::Init => "init",
            StageFlag::Build => "build",
            StageFlag::Run => "run",
        }
    }
}

impl fmt::Display for StageFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "init" => Ok(StageFlag::Init),
            "build" => Ok(StageFlag::Build),
            "run" => Ok(StageFlag::Run),
            "none" | "disabled" => Ok(StageFlag::Disabled),
            other => Err(format!(
                "unknown stage '{}', expected one of init, build, run, none",
                other
            )),
        }
    }
}

/// Options for one compile/run invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Test list produced by the generation stage.
    pub test_list: PathBuf,
    /// Lifecycle depth for targets.
    pub dut_stage: StageFlag,
    /// Lifecycle depth for references.
    pub ref_stage: StageFlag,
    /// Pass the coverage section to devices.
    pub coverage: bool,
    /// Compare dumps after running.
    pub compare: bool,
}

impl CompileOptions {
    /// Full run with comparison and no coverage.
    pub fn new(test_list: impl Into<PathBuf>) -> Self {
        Self {
            test_list: test_list.into(),
            dut_stage: StageFlag::Run,
            ref_stage: StageFlag::Run,
            coverage: false,
            compare: true,
        }
    }
}

/// Result of the compile/run stage.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    /// Registry with updated verdicts, as persisted.
    pub registry: TestRegistry,
    /// Verdict totals.
    pub summary: RunSummary,
    /// Tests whose verdict could not be decided.
    pub diagnostics: Vec<Diagnostic>,
    /// The run report written under `<work_dir>/reports/`.
    pub report: PathBuf,
}

/// Runs every configured device to the requested depth, reconciles dumps,
/// persists verdicts and writes the run report.
pub fn run(
    config: &RiverConfig,
    catalog: &PluginCatalog,
    options: &CompileOptions,
) -> RiverResult<CompileOutcome> {
    if config.references.is_empty() {
        return Err(RiverError::ReferenceDisabled);
    }

    let mut registry = TestRegistry::load(&options.test_list)?;
    info!(
        "loaded {} test(s) from {}",
        registry.len(),
        options.test_list.display()
    );

    let mut targets = Vec::new();
    if config.targets.is_empty() {
        warn!("DuT plugin disabled");
    } else {
        for name in &config.targets {
            if let Some(session) = drive_device(
                config,
                catalog,
                &registry,
                options,
                name,
                DeviceRole::Target,
            )? {
                targets.push(session);
            }
        }
    }

    let mut references = Vec::new();
    for name in &config.references {
        if let Some(session) = drive_device(
            config,
            catalog,
            &registry,
            options,
            name,
            DeviceRole::Reference,
        )? {
            references.push(session);
        }
    }

    let reconciliation = reconcile::reconcile(
        config,
        &mut registry,
        &options.test_list,
        &mut targets,
        &mut references,
        options.compare,
    )?;

    let mut report = RunReport::new(config, &registry);
    report.target_outcomes = reconciliation.target_outcomes;
    report.reference_outcomes = reconciliation.reference_outcomes;
    report.diagnostics = reconciliation.diagnostics.clone();
    let report_path = report.write(&config.work_dir)?;

    Ok(CompileOutcome {
        summary: registry.summary(),
        registry,
        diagnostics: reconciliation.diagnostics,
        report: report_path,
    })
}

fn drive_device(
    config: &RiverConfig,
    catalog: &PluginCatalog,
    registry: &TestRegistry,
    options: &CompileOptions,
    name: &str,
    role: DeviceRole,
) -> RiverResult<Option<DeviceSession>> {
    let stage = match role {
        DeviceRole::Target => options.dut_stage,
        DeviceRole::Reference => options.ref_stage,
    };
    if stage == StageFlag::Disabled {
        warn!("{} plugin {} disabled", role, name);
        return Ok(None);
    }

    let settings = config.role(name)?;
    info!(
        "loading {} {} (jobs {}, count {})",
        role, name, settings.jobs, settings.count
    );
    let descriptor = catalog.load_device(name, role.search_path(config))?;
    let mut session = DeviceSession::new(descriptor, role);
    let plugin_path = session.module_dir();
    let work_dir = role.work_dir(config, name);

    session.init(&DeviceInit {
        config,
        settings: &settings,
        registry,
        registry_path: &options.test_list,
        work_dir: &work_dir,
        coverage: options.coverage.then_some(&config.coverage),
        plugin_path: &plugin_path,
        isa: &config.isa,
        role,
    })?;
    if stage >= StageFlag::Build {
        session.build()?;
    }
    if stage >= StageFlag::Run {
        let report = session.run(&plugin_path)?;
        info!("{} {} finished; report at {}", role, name, display_report(&report));
    }
    Ok(Some(session))
}

fn display_report(base: &Path) -> String {
    crate::report::ExecutionReport::json_path(base)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_flag_parse_and_order() {
        assert_eq!("build".parse::<StageFlag>().unwrap(), StageFlag::Build);
        assert_eq!("None".parse::<StageFlag>().unwrap(), StageFlag::Disabled);
        assert!("sim".parse::<StageFlag>().is_err());
        assert!(StageFlag::Run > StageFlag::Build);
        assert!(StageFlag::Init > StageFlag::Disabled);
        assert_eq!(StageFlag::default(), StageFlag::Run);
    }

    #[test]
    fn test_reference_disabled_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RiverConfig::from_toml_str(
            "[river_core]\nwork_dir = \"w\"\nisa = \"rv64gc\"\ntarget = \"dut\"\nreference = \"\"\n",
            &tmp.path().join("river_core.toml"),
        )
        .unwrap();
        let err = run(
            &config,
            &PluginCatalog::new(),
            &CompileOptions::new(tmp.path().join("test_list.yaml")),
        )
        .unwrap_err();
        assert!(matches!(err, RiverError::ReferenceDisabled));
    }
}
