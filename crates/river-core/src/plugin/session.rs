//! Lifecycle enforcement around loaded plugins.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{
    DeviceInit, DevicePlugin, DeviceRole, GenRequest, GeneratorPlugin, PluginDescriptor,
    PluginError,
};
use crate::config::{RiverConfig, RoleConfig};
use crate::coverage::CoverageArtifact;
use crate::registry::TestRegistry;
use crate::report::RecordFilter;

/// Generator lifecycle position.
///
/// Each state names the last hook that completed. `Done` is reached through
/// [`GeneratorSession::finish`] once the fragment has been taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Uninitialized,
    PreGen,
    Gen,
    PostGen,
    Done,
}

/// Device lifecycle position.
///
/// `Done` is reached through [`DeviceSession::finish`] after `post_run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Uninitialized,
    Init,
    Built,
    Run,
    PostRun,
    Done,
}

/// A loaded generator plus its lifecycle state.
pub struct GeneratorSession {
    descriptor: PluginDescriptor<dyn GeneratorPlugin>,
    state: GeneratorState,
}

impl GeneratorSession {
    /// Starts a session for a freshly loaded generator.
    pub fn new(descriptor: PluginDescriptor<dyn GeneratorPlugin>) -> Self {
        Self {
            descriptor,
            state: GeneratorState::Uninitialized,
        }
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Directory the plugin was loaded from.
    pub fn module_dir(&self) -> PathBuf {
        self.descriptor.module_dir()
    }

    /// Current lifecycle position.
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Runs `pre_gen`.
    pub fn pre_gen(&mut self, role: &RoleConfig, output_dir: &Path) -> Result<(), PluginError> {
        self.expect(GeneratorState::Uninitialized, "pre_gen")?;
        debug!("{}: pre_gen {}", self.name(), output_dir.display());
        self.descriptor
            .instance
            .pre_gen(role, output_dir)
            .map_err(|e| e.attributed_to(&self.descriptor.name))?;
        self.state = GeneratorState::PreGen;
        Ok(())
    }

    /// Runs `gen`, returning the generated fragment.
    pub fn gen(&mut self, request: &GenRequest<'_>) -> Result<TestRegistry, PluginError> {
        self.expect(GeneratorState::PreGen, "gen")?;
        debug!("{}: gen", self.name());
        let fragment = self
            .descriptor
            .instance
            .gen(request)
            .map_err(|e| e.attributed_to(&self.descriptor.name))?;
        self.state = GeneratorState::Gen;
        Ok(fragment)
    }

    /// Runs `post_gen`.
    pub fn post_gen(&mut self, role: &RoleConfig, output_dir: &Path) -> Result<(), PluginError> {
        self.expect(GeneratorState::Gen, "post_gen")?;
        debug!("{}: post_gen", self.name());
        self.descriptor
            .instance
            .post_gen(role, output_dir)
            .map_err(|e| e.attributed_to(&self.descriptor.name))?;
        self.state = GeneratorState::PostGen;
        Ok(())
    }

    /// Closes the session; no hook is accepted afterwards.
    pub fn finish(&mut self) -> Result<(), PluginError> {
        self.expect(GeneratorState::PostGen, "finish")?;
        self.state = GeneratorState::Done;
        Ok(())
    }

    fn expect(&self, state: GeneratorState, hook: &str) -> Result<(), PluginError> {
        if self.state != state {
            return Err(PluginError::contract(
                self.name(),
                format!("{} called in state {:?}, expected {:?}", hook, self.state, state),
            ));
        }
        Ok(())
    }
}

/// A loaded device plus its lifecycle state.
pub struct DeviceSession {
    descriptor: PluginDescriptor<dyn DevicePlugin>,
    role: DeviceRole,
    state: DeviceState,
    report: Option<PathBuf>,
}

impl DeviceSession {
    /// Starts a session for a freshly loaded device.
    pub fn new(descriptor: PluginDescriptor<dyn DevicePlugin>, role: DeviceRole) -> Self {
        Self {
            descriptor,
            role,
            state: DeviceState::Uninitialized,
            report: None,
        }
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Side of the comparison.
    pub fn role(&self) -> DeviceRole {
        self.role
    }

    /// Directory the plugin was loaded from.
    pub fn module_dir(&self) -> PathBuf {
        self.descriptor.module_dir()
    }

    /// Current lifecycle position.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Report path returned by `run`, without extension.
    pub fn report_path(&self) -> Option<&Path> {
        self.report.as_deref()
    }

    /// The device's record filter.
    pub fn record_filter(&self) -> RecordFilter {
        self.descriptor.instance.record_filter()
    }

    /// Runs `init`.
    pub fn init(&mut self, init: &DeviceInit<'_>) -> Result<(), PluginError> {
        self.expect(DeviceState::Uninitialized, "init")?;
        if init.role != self.role {
            return Err(PluginError::contract(
                self.name(),
                format!("initialized as {} but loaded as {}", init.role, self.role),
            ));
        }
        debug!("{}: init {}", self.name(), init.work_dir.display());
        self.descriptor
            .instance
            .init(init)
            .map_err(|e| e.attributed_to(&self.descriptor.name))?;
        self.state = DeviceState::Init;
        Ok(())
    }

    /// Runs `build`.
    pub fn build(&mut self) -> Result<(), PluginError> {
        self.expect(DeviceState::Init, "build")?;
        debug!("{}: build", self.name());
        self.descriptor
            .instance
            .build()
            .map_err(|e| e.attributed_to(&self.descriptor.name))?;
        self.state = DeviceState::Built;
        Ok(())
    }

    /// Runs `run`, remembering the returned report path.
    pub fn run(&mut self, module_dir: &Path) -> Result<PathBuf, PluginError> {
        self.expect(DeviceState::Built, "run")?;
        debug!("{}: run", self.name());
        let report = self
            .descriptor
            .instance
            .run(module_dir)
            .map_err(|e| e.attributed_to(&self.descriptor.name))?;
        self.report = Some(report.clone());
        self.state = DeviceState::Run;
        Ok(report)
    }

    /// Runs `post_run`.
    pub fn post_run(&mut self, registry: &TestRegistry, config: &RiverConfig) -> Result<(), PluginError> {
        self.expect(DeviceState::Run, "post_run")?;
        debug!("{}: post_run", self.name());
        self.descriptor
            .instance
            .post_run(registry, config)
            .map_err(|e| e.attributed_to(&self.descriptor.name))?;
        self.state = DeviceState::PostRun;
        Ok(())
    }

    /// Closes the session; no lifecycle hook is accepted afterwards.
    pub fn finish(&mut self) -> Result<(), PluginError> {
        self.expect(DeviceState::PostRun, "finish")?;
        self.state = DeviceState::Done;
        Ok(())
    }

    /// Runs `merge_db`. Valid in any state.
    pub fn merge_db(
        &mut self,
        db_files: &[CoverageArtifact],
        output_db: &Path,
        config: &RiverConfig,
    ) -> Result<Vec<PathBuf>, PluginError> {
        debug!("{}: merge_db over {} database(s)", self.name(), db_files.len());
        self.descriptor
            .instance
            .merge_db(db_files, output_db, config)
            .map_err(|e| e.attributed_to(&self.descriptor.name))
    }

    fn expect(&self, state: DeviceState, hook: &str) -> Result<(), PluginError> {
        if self.state != state {
            return Err(PluginError::contract(
                self.name(),
                format!("{} called in state {:?}, expected {:?}", hook, self.state, state),
            ));
        }
        Ok(())
    }
}
