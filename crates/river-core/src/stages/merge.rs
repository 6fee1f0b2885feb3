//! Merge stage: fold several run directories into one and merge their
//! coverage databases.
//!
//! The output directory is laid out as:
//!
//! ```text
//! <output>/
//!   asm/<test>/        copied test work directories
//!   common/            shared extra_compile files
//!   final_coverage/
//!   reports/coverage_report.json
//!   test_list.yaml     merged, relocated registry
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{ConfigError, RiverConfig};
use crate::confirm::Confirm;
use crate::coverage::{self, CoverageArtifact, CoverageTool};
use crate::error::{RiverError, RiverResult};
use crate::fsutil;
use crate::plugin::{DeviceRole, DeviceSession, PluginCatalog};
use crate::registry::{TestRegistry, TEST_LIST_FILE};
use crate::report::CoverageReport;
use crate::validation::{is_plain_test_name, SchemaError, ROOT};
use crate::RIVER_VERSION;

/// Copied test directories.
pub const ASM_DIR: &str = "asm";
/// Shared auxiliary sources.
pub const COMMON_DIR: &str = "common";
/// Merged coverage output.
pub const FINAL_COVERAGE_DIR: &str = "final_coverage";

/// Result of a merge.
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    /// The output directory exists and the user chose not to overwrite it.
    Declined,
    /// The merge ran.
    Merged(MergeSummary),
}

/// What a completed merge produced.
#[derive(Debug, Clone)]
pub struct MergeSummary {
    /// Merge output directory.
    pub output: PathBuf,
    /// The merged, relocated registry.
    pub registry: TestRegistry,
    /// Where it was persisted.
    pub test_list: PathBuf,
    /// Coverage databases found across sources.
    pub artifacts: Vec<CoverageArtifact>,
    /// HTML summaries returned by the target's `merge_db`.
    pub merged_html: Vec<PathBuf>,
    /// True if the source directories were deleted.
    pub sources_removed: bool,
}

/// Merges `sources` into `output`.
///
/// Every source registry is loaded and folded under the collision policy
/// before anything on disk changes, so a collision under
/// [`CollisionPolicy::Error`](crate::config::CollisionPolicy::Error) leaves
/// the output untouched.
pub fn run(
    config: &RiverConfig,
    catalog: &PluginCatalog,
    sources: &[PathBuf],
    output: &Path,
    confirm: &dyn Confirm,
) -> RiverResult<MergeOutcome> {
    let mut folded = TestRegistry::new();
    for source in sources {
        let source_label = source.display().to_string();
        let registry = TestRegistry::load(&source.join(TEST_LIST_FILE))?;
        let stats = folded.merge(registry, config.collision_policy, &source_label)?;
        debug!(
            "{}: {} added, {} replaced, {} kept",
            source_label, stats.added, stats.replaced, stats.kept
        );
    }

    if output.exists() {
        let prompt = format!("{} already exists. Overwrite?", output.display());
        if !confirm.confirm(&prompt) {
            info!("keeping {}; merge aborted", output.display());
            return Ok(MergeOutcome::Declined);
        }
        fsutil::remove_dir(output)?;
        info!("{} deleted", output.display());
    }

    let asm_dir = output.join(ASM_DIR);
    let common_dir = output.join(COMMON_DIR);
    for dir in [
        &asm_dir,
        &common_dir,
        &output.join(FINAL_COVERAGE_DIR),
        &output.join(crate::report::REPORTS_DIR),
    ] {
        std::fs::create_dir_all(dir).map_err(|e| RiverError::io(dir, e))?;
    }

    let mut merged = TestRegistry::new();
    for (name, entry) in folded.iter() {
        let test_dir = asm_test_dir(&asm_dir, name)?;
        fsutil::copy_dir_recursive(&entry.work_dir, &test_dir)?;

        let mut relocated = entry.relocated(name, &test_dir);
        if let Some(extra) = &entry.extra_compile {
            let mut copied = Vec::with_capacity(extra.len());
            for file in extra {
                copied.push(fsutil::copy_into(file, &common_dir)?);
            }
            relocated.extra_compile = Some(copied);
        }
        merged.insert(name, relocated);
    }
    info!("copied {} test(s) from {} source(s)", merged.len(), sources.len());

    let tool = config.primary_target().and_then(CoverageTool::from_target);
    let kinds = config.coverage.kinds();
    let mut artifacts = Vec::new();
    for source in sources {
        match tool {
            Some(tool) => artifacts.extend(coverage::collect(source, tool, &kinds)?),
            None if config.coverage.enabled() => {
                warn!("cannot tell which coverage tool produced {}", source.display());
            }
            None => {}
        }
    }

    let mut merged_html = Vec::new();
    if config.coverage.enabled() {
        if artifacts.is_empty() {
            return Err(RiverError::MissingCoverage {
                sources: sources.len(),
            });
        }
        let target = config.primary_target().ok_or_else(|| ConfigError::InvalidValue {
            section: "river_core".to_string(),
            key: "target".to_string(),
            message: "coverage merge needs a target plugin".to_string(),
        })?;
        info!("merging {} coverage database(s) with {}", artifacts.len(), target);
        let descriptor = catalog.load_device(target, &config.path_to_target)?;
        let mut session = DeviceSession::new(descriptor, DeviceRole::Target);
        merged_html = session.merge_db(&artifacts, output, config)?;
    }

    let test_list = output.join(TEST_LIST_FILE);
    merged.save(&test_list)?;
    info!("merged test list with {} test(s) written to {}", merged.len(), test_list.display());

    CoverageReport {
        name: "RiVer Core Coverage Report".to_string(),
        version: RIVER_VERSION.to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        isa: config.isa.clone(),
        target: config.primary_target().map(str::to_string),
        sources: sources.to_vec(),
        databases: artifacts.clone(),
        merged_html: merged_html.clone(),
        tests: merged.len(),
    }
    .write(output)?;

    let listed: Vec<_> = sources.iter().map(|s| s.display().to_string()).collect();
    let prompt = format!("Delete source directories {}?", listed.join(", "));
    let sources_removed = confirm.confirm(&prompt);
    if sources_removed {
        for source in sources {
            fsutil::remove_dir(source)?;
            info!("{} deleted", source.display());
        }
    } else {
        info!("source directories kept");
    }

    Ok(MergeOutcome::Merged(MergeSummary {
        output: output.to_path_buf(),
        registry: merged,
        test_list,
        artifacts,
        merged_html,
        sources_removed,
    }))
}

/// `<asm_dir>/<name>`, refusing names that would resolve elsewhere.
fn asm_test_dir(asm_dir: &Path, name: &str) -> RiverResult<PathBuf> {
    if !is_plain_test_name(name) {
        return Err(RiverError::Validation {
            path: asm_dir.to_path_buf(),
            errors: vec![SchemaError::new(
                name,
                ROOT,
                "test name must be a single path component",
            )],
        });
    }
    Ok(asm_dir.join(name))
}
