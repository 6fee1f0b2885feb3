//! Scripted in-process plugins.
//!
//! [`ScriptedGenerator`] lays out one directory per test and returns the
//! matching registry fragment. [`ScriptedDevice`] writes the dumps it was
//! told to write and a JSON-lines execution report listing them. Both record
//! every hook call in a shared [`HookLog`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use river_core::config::RoleConfig;
use river_core::report::RecordFilter;
use river_core::{
    CoverageArtifact, DeviceInit, DevicePlugin, DeviceRole, GenRequest, GeneratorPlugin,
    PluginCatalog, PluginError, RiverConfig, TestRegistry,
};

use crate::fixtures::{entry, GENERATOR, REFERENCE, TARGET};

/// Ordered record of `"<plugin>:<hook>"` calls.
#[derive(Debug, Clone, Default)]
pub struct HookLog(Rc<RefCell<Vec<String>>>);

impl HookLog {
    fn push(&self, plugin: &str, hook: &str) {
        self.0.borrow_mut().push(format!("{}:{}", plugin, hook));
    }

    /// All calls so far.
    pub fn calls(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// True if `plugin` saw `hook`.
    pub fn saw(&self, plugin: &str, hook: &str) -> bool {
        let call = format!("{}:{}", plugin, hook);
        self.0.borrow().iter().any(|c| *c == call)
    }
}

/// Generator producing a fixed list of tests.
#[derive(Debug, Clone)]
pub struct ScriptedGenerator {
    tests: Vec<String>,
    log: HookLog,
}

impl ScriptedGenerator {
    pub fn new(tests: &[&str]) -> Self {
        Self {
            tests: tests.iter().map(|t| t.to_string()).collect(),
            log: HookLog::default(),
        }
    }

    /// Shares `log` with this generator.
    pub fn with_log(mut self, log: &HookLog) -> Self {
        self.log = log.clone();
        self
    }
}

impl GeneratorPlugin for ScriptedGenerator {
    fn gen(&mut self, request: &GenRequest<'_>) -> Result<TestRegistry, PluginError> {
        self.log.push(GENERATOR, "gen");
        let mut fragment = TestRegistry::new();
        for test in &self.tests {
            let work_dir = request.output_dir.join(test);
            fs::create_dir_all(&work_dir).map_err(|e| PluginError::io(&work_dir, e))?;
            let mut generated = entry(test, &work_dir);
            generated.isa = request.role.isa.clone();
            fs::write(&generated.asm_file, "li x1, 1\n")
                .map_err(|e| PluginError::io(&generated.asm_file, e))?;
            fs::write(&generated.linker_file, "SECTIONS {}\n")
                .map_err(|e| PluginError::io(&generated.linker_file, e))?;
            fragment.insert(test.as_str(), generated);
        }
        Ok(fragment)
    }

    fn post_gen(&mut self, _role: &RoleConfig, _output_dir: &Path) -> Result<(), PluginError> {
        self.log.push(GENERATOR, "post_gen");
        Ok(())
    }
}

/// Device writing scripted dumps and a JSON-lines report.
#[derive(Debug, Clone)]
pub struct ScriptedDevice {
    name: &'static str,
    role: DeviceRole,
    dumps: BTreeMap<String, String>,
    write_report: bool,
    log: HookLog,
    work_dir: Option<PathBuf>,
    registry: TestRegistry,
}

impl ScriptedDevice {
    fn new(name: &'static str, role: DeviceRole) -> Self {
        Self {
            name,
            role,
            dumps: BTreeMap::new(),
            write_report: true,
            log: HookLog::default(),
            work_dir: None,
            registry: TestRegistry::new(),
        }
    }

    /// The device under test, registered as `scripted_dut`.
    pub fn target() -> Self {
        Self::new(TARGET, DeviceRole::Target)
    }

    /// The reference model, registered as `scripted_ref`.
    pub fn reference() -> Self {
        Self::new(REFERENCE, DeviceRole::Reference)
    }

    /// Writes `contents` as this side's dump for `test`.
    pub fn dump(mut self, test: &str, contents: &str) -> Self {
        self.dumps.insert(test.to_string(), contents.to_string());
        self
    }

    /// Runs without writing an execution report.
    pub fn without_report(mut self) -> Self {
        self.write_report = false;
        self
    }

    /// Shares `log` with this device.
    pub fn with_log(mut self, log: &HookLog) -> Self {
        self.log = log.clone();
        self
    }

    fn write_report_file(&self, base: &Path) -> Result<(), PluginError> {
        let mut lines = String::new();
        for (test, _) in self.registry.iter() {
            let outcome = if self.dumps.contains_key(test) {
                "passed"
            } else {
                "failed"
            };
            let record = serde_json::json!({
                "$report_type": "TestReport",
                "nodeid": format!("{}::{}", self.name, test),
                "outcome": outcome,
            });
            lines.push_str(&record.to_string());
            lines.push('\n');
        }
        lines.push_str("{\"$report_type\": \"SessionFinish\", \"exitstatus\": 0}\n");
        let path = base.with_extension("json");
        fs::write(&path, lines).map_err(|e| PluginError::io(&path, e))
    }
}

impl DevicePlugin for ScriptedDevice {
    fn init(&mut self, init: &DeviceInit<'_>) -> Result<(), PluginError> {
        self.log.push(self.name, "init");
        if init.role != self.role {
            return Err(PluginError::contract(self.name, "initialized with the wrong role"));
        }
        self.work_dir = Some(init.work_dir.to_path_buf());
        self.registry = init.registry.clone();
        Ok(())
    }

    fn build(&mut self) -> Result<(), PluginError> {
        self.log.push(self.name, "build");
        let work_dir = self
            .work_dir
            .as_ref()
            .ok_or_else(|| PluginError::contract(self.name, "build before init"))?;
        fs::create_dir_all(work_dir).map_err(|e| PluginError::io(work_dir, e))
    }

    fn run(&mut self, _module_dir: &Path) -> Result<PathBuf, PluginError> {
        self.log.push(self.name, "run");
        for (test, entry) in self.registry.iter() {
            if let Some(contents) = self.dumps.get(test) {
                let path = entry.dump_path(self.role);
                fs::write(&path, contents).map_err(|e| PluginError::io(&path, e))?;
            }
        }
        let work_dir = self
            .work_dir
            .clone()
            .ok_or_else(|| PluginError::contract(self.name, "run before init"))?;
        let base = work_dir.join("report");
        if self.write_report {
            self.write_report_file(&base)?;
        }
        Ok(base)
    }

    fn post_run(&mut self, _registry: &TestRegistry, _config: &RiverConfig) -> Result<(), PluginError> {
        self.log.push(self.name, "post_run");
        Ok(())
    }

    fn merge_db(
        &mut self,
        db_files: &[CoverageArtifact],
        output_db: &Path,
        _config: &RiverConfig,
    ) -> Result<Vec<PathBuf>, PluginError> {
        self.log.push(self.name, "merge_db");
        let dir = output_db.join("final_coverage");
        fs::create_dir_all(&dir).map_err(|e| PluginError::io(&dir, e))?;
        let html = dir.join("index.html");
        let listing: Vec<_> = db_files.iter().map(|a| a.path.display().to_string()).collect();
        fs::write(&html, listing.join("\n")).map_err(|e| PluginError::io(&html, e))?;
        Ok(vec![html])
    }

    fn record_filter(&self) -> RecordFilter {
        RecordFilter::default()
    }
}

/// Catalog registering the scripted generator and both devices under the
/// names [`crate::fixtures::config_text`] configures.
pub fn catalog(
    generator: ScriptedGenerator,
    target: ScriptedDevice,
    reference: ScriptedDevice,
) -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    catalog.register_generator(GENERATOR, move || Box::new(generator.clone()));
    catalog.register_device(TARGET, move || Box::new(target.clone()));
    catalog.register_device(REFERENCE, move || Box::new(reference.clone()));
    catalog
}
