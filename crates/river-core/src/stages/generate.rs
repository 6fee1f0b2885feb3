//! Generation stage: run every generator suite and build the test registry.

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::config::{ConfigError, RiverConfig};
use crate::error::{RiverError, RiverResult};
use crate::plugin::{GenRequest, GeneratorSession, PluginCatalog};
use crate::registry::{MergeStats, TestRegistry, TEST_LIST_FILE};
use crate::validation::validate_registry_value;

/// What one suite contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteOutcome {
    /// Suite name.
    pub name: String,
    /// Directory the suite generated into.
    pub output_dir: PathBuf,
    /// Tests in the suite's fragment.
    pub tests: usize,
    /// How the fragment folded into the registry.
    pub stats: MergeStats,
}

/// Result of the generation stage.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    /// The merged, validated registry.
    pub registry: TestRegistry,
    /// Where it was persisted.
    pub test_list: PathBuf,
    /// Per-suite contributions, in run order.
    pub suites: Vec<SuiteOutcome>,
}

/// Runs `pre_gen -> gen -> post_gen` for every configured suite in order,
/// merges the fragments under the collision policy, validates the result and
/// writes `<work_dir>/test_list.yaml`.
pub fn run(config: &RiverConfig, catalog: &PluginCatalog) -> RiverResult<GenerateOutcome> {
    if config.generators.is_empty() {
        return Err(ConfigError::InvalidValue {
            section: "river_core".to_string(),
            key: "generator".to_string(),
            message: "no generator suite configured".to_string(),
        }
        .into());
    }

    info!("work directory: {}", config.work_dir.display());
    info!("ISA: {}", config.isa);

    let mut registry = TestRegistry::new();
    let mut suites = Vec::new();

    for suite in &config.generators {
        let role = config.role(suite)?;
        info!(
            "loading suite {} (jobs {}, seed {}, count {})",
            suite,
            role.jobs,
            role.seed.as_deref().unwrap_or("random"),
            role.count
        );

        let descriptor = catalog.load_generator(suite, &config.path_to_suite)?;
        let mut session = GeneratorSession::new(descriptor);
        let output_dir = config.work_dir.join(suite);
        let module_dir = session.module_dir();

        session.pre_gen(&role, &output_dir)?;
        let fragment = session.gen(&GenRequest {
            config,
            role: &role,
            module_dir: &module_dir,
            output_dir: &output_dir,
        })?;
        session.post_gen(&role, &output_dir)?;
        session.finish()?;

        let tests = fragment.len();
        if tests == 0 {
            warn!("suite {} generated no tests", suite);
        }
        let stats = registry.merge(fragment, config.collision_policy, suite)?;
        info!("suite {} generated {} test(s)", suite, tests);

        suites.push(SuiteOutcome {
            name: suite.clone(),
            output_dir,
            tests,
            stats,
        });
    }

    let test_list = config.work_dir.join(TEST_LIST_FILE);
    let value = serde_yaml::to_value(&registry).map_err(|e| RiverError::yaml(&test_list, e))?;
    let errors = validate_registry_value(&value);
    if !errors.is_empty() {
        for e in &errors {
            error!("{}", e);
        }
        return Err(RiverError::Validation {
            path: test_list,
            errors,
        });
    }

    registry.save(&test_list)?;
    info!("test list with {} test(s) written to {}", registry.len(), test_list.display());

    Ok(GenerateOutcome {
        registry,
        test_list,
        suites,
    })
}
