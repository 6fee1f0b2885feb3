//! End-to-End Merge Tests for RiVer Core
//!
//! Tests verify:
//! - Several run directories fold into one relocated test list
//! - Duplicate test names follow the collision policy
//! - Confirmation gates overwriting the output and deleting the sources
//! - Coverage databases are collected and handed to the target's `merge_db`
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p river-tests --test e2e_merge
//! ```

use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use river_core::registry::TEST_LIST_FILE;
use river_core::stages::merge::{self, MergeOutcome, MergeSummary};
use river_core::{AlwaysNo, AlwaysYes, Confirm, PluginCatalog, RiverConfig, RiverError, TestRegistry};
use river_tests::fixtures::{config_text, REFERENCE};
use river_tests::plugins::{catalog, HookLog, ScriptedDevice, ScriptedGenerator};
use river_tests::RunFixture;

/// Answers from a fixed script, recording every prompt.
struct Scripted {
    answers: RefCell<Vec<bool>>,
    prompts: RefCell<Vec<String>>,
}

impl Scripted {
    fn new(answers: &[bool]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().rev().copied().collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }
}

impl Confirm for Scripted {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answers.borrow_mut().pop().unwrap_or(false)
    }
}

fn default_catalog() -> PluginCatalog {
    catalog(
        ScriptedGenerator::new(&[]),
        ScriptedDevice::target(),
        ScriptedDevice::reference(),
    )
}

fn merged(outcome: MergeOutcome) -> MergeSummary {
    match outcome {
        MergeOutcome::Merged(summary) => summary,
        MergeOutcome::Declined => panic!("merge was declined"),
    }
}

fn sources(fixture: &RunFixture) -> Vec<PathBuf> {
    vec![
        fixture.run_dir("run1", &["a", "shared"], "one"),
        fixture.run_dir("run2", &["shared", "b"], "two"),
    ]
}

// ============================================================================
// Collision policy
// ============================================================================

/// Test a test defined by two sources ends up once, as the later source has it.
#[test]
fn test_shared_test_last_wins() {
    let fixture = RunFixture::new();
    let config = fixture.config("");
    let sources = sources(&fixture);
    let output = fixture.path().join("merged");

    let summary = merged(merge::run(&config, &default_catalog(), &sources, &output, &AlwaysNo).unwrap());

    assert_eq!(summary.registry.names().collect::<Vec<_>>(), vec!["a", "shared", "b"]);
    let shared = summary.registry.get("shared").unwrap();
    assert_eq!(shared.work_dir, output.join("asm").join("shared"));
    assert_eq!(shared.asm_file, output.join("asm/shared/shared.S"));
    assert_eq!(shared.linker_file, output.join("asm/shared/shared.ld"));
    assert_eq!(fs::read_to_string(shared.work_dir.join("marker")).unwrap(), "two");
    assert!(shared.asm_file.is_file());

    let reloaded = TestRegistry::load(&output.join(TEST_LIST_FILE)).unwrap();
    assert_eq!(reloaded, summary.registry);
    assert!(output.join("reports/coverage_report.json").is_file());
    assert!(!summary.sources_removed);
    assert!(sources.iter().all(|s| s.is_dir()));
}

/// Test the first definition is kept under first-wins.
#[test]
fn test_shared_test_first_wins() {
    let fixture = RunFixture::new();
    let config = fixture.config("collision_policy = \"first-wins\"");
    let sources = sources(&fixture);
    let output = fixture.path().join("merged");

    let summary = merged(merge::run(&config, &default_catalog(), &sources, &output, &AlwaysNo).unwrap());

    let shared = summary.registry.get("shared").unwrap();
    assert_eq!(fs::read_to_string(shared.work_dir.join("marker")).unwrap(), "one");
    assert_eq!(summary.registry.len(), 3);
}

/// Test a duplicate aborts the merge under the error policy.
#[test]
fn test_shared_test_is_error_under_strict_policy() {
    let fixture = RunFixture::new();
    let config = fixture.config("collision_policy = \"error\"");
    let sources = sources(&fixture);
    let output = fixture.path().join("merged");

    let err = merge::run(&config, &default_catalog(), &sources, &output, &AlwaysNo).unwrap_err();
    match err {
        RiverError::Collision { test, origin } => {
            assert_eq!(test, "shared");
            assert!(origin.ends_with("run2"));
        }
        other => panic!("expected collision, got {other}"),
    }
}

/// Test a collision under the error policy aborts before the output exists.
#[test]
fn test_collision_leaves_no_partial_output() {
    let fixture = RunFixture::new();
    let config = fixture.config("collision_policy = \"error\"");
    let sources = sources(&fixture);
    let output = fixture.path().join("merged");

    let err = merge::run(&config, &default_catalog(), &sources, &output, &AlwaysNo).unwrap_err();

    assert!(matches!(err, RiverError::Collision { .. }));
    assert!(!output.exists());
}

// ============================================================================
// Test names
// ============================================================================

/// Test names that resolve outside the output directory are rejected before
/// anything is deleted or copied.
#[test]
fn test_path_like_test_names_are_rejected() {
    let fixture = RunFixture::new();
    let config = fixture.config("");
    let victim = fixture.path().join("victim");
    fs::create_dir_all(&victim).unwrap();
    fs::write(victim.join("precious"), "keep").unwrap();

    let run1 = fixture.run_dir("run1", &["t_abs", "t_up"], "one");
    let list = run1.join(TEST_LIST_FILE);
    let text = fs::read_to_string(&list)
        .unwrap()
        .replacen("t_abs:\n", &format!("{:?}:\n", victim.display().to_string()), 1)
        .replacen("t_up:\n", "\"../../escaped\":\n", 1);
    fs::write(&list, text).unwrap();

    let output = fixture.path().join("merged");
    let err = merge::run(&config, &default_catalog(), &[run1], &output, &AlwaysNo).unwrap_err();

    match err {
        RiverError::Validation { errors, .. } => {
            assert_eq!(errors.len(), 2);
            assert!(errors.iter().all(|e| e.message.contains("single path component")));
        }
        other => panic!("expected validation failure, got {other}"),
    }
    assert_eq!(fs::read_to_string(victim.join("precious")).unwrap(), "keep");
    assert!(!fixture.path().join("escaped").exists());
    assert!(!output.exists());
}

// ============================================================================
// Confirmation
// ============================================================================

/// Test declining to overwrite leaves the existing output alone.
#[test]
fn test_declined_overwrite_keeps_output() {
    let fixture = RunFixture::new();
    let config = fixture.config("");
    let sources = sources(&fixture);
    let output = fixture.path().join("merged");
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("keep.txt"), "mine").unwrap();

    let outcome = merge::run(&config, &default_catalog(), &sources, &output, &AlwaysNo).unwrap();

    assert!(matches!(outcome, MergeOutcome::Declined));
    assert_eq!(fs::read_to_string(output.join("keep.txt")).unwrap(), "mine");
    assert!(!output.join(TEST_LIST_FILE).exists());
}

/// Test accepting both prompts replaces the output and deletes the sources.
#[test]
fn test_accepted_prompts_replace_output_and_remove_sources() {
    let fixture = RunFixture::new();
    let config = fixture.config("");
    let sources = sources(&fixture);
    let output = fixture.path().join("merged");
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("stale.txt"), "old").unwrap();

    let summary = merged(merge::run(&config, &default_catalog(), &sources, &output, &AlwaysYes).unwrap());

    assert!(summary.sources_removed);
    assert!(!output.join("stale.txt").exists());
    assert!(sources.iter().all(|s| !s.exists()));
    assert!(output.join("asm/a/a.S").is_file());
}

/// Test the overwrite and delete questions are asked separately.
#[test]
fn test_overwrite_then_keep_sources() {
    let fixture = RunFixture::new();
    let config = fixture.config("");
    let sources = sources(&fixture);
    let output = fixture.path().join("merged");
    fs::create_dir_all(&output).unwrap();

    let confirm = Scripted::new(&[true, false]);
    let summary = merged(merge::run(&config, &default_catalog(), &sources, &output, &confirm).unwrap());

    let prompts = confirm.prompts.borrow();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("Overwrite"));
    assert!(prompts[1].contains("run1"));
    assert!(!summary.sources_removed);
    assert!(sources.iter().all(|s| s.is_dir()));
}

// ============================================================================
// Shared files and coverage
// ============================================================================

/// Test extra compile files are gathered into common/ and the entry points there.
#[test]
fn test_extra_compile_files_move_to_common() {
    let fixture = RunFixture::new();
    let config = fixture.config("");
    let run1 = fixture.run_dir("run1", &["a"], "one");
    let shared = fixture.path().join("run1/crt.S");
    fs::write(&shared, "_start:\n").unwrap();

    let list = run1.join(TEST_LIST_FILE);
    let mut registry = TestRegistry::load(&list).unwrap();
    registry.get_mut("a").unwrap().extra_compile = Some(vec![shared.clone()]);
    registry.save(&list).unwrap();

    let output = fixture.path().join("merged");
    let summary = merged(merge::run(&config, &default_catalog(), &[run1], &output, &AlwaysNo).unwrap());

    let common = output.join("common/crt.S");
    assert_eq!(summary.registry.get("a").unwrap().extra_compile, Some(vec![common.clone()]));
    assert_eq!(fs::read_to_string(common).unwrap(), "_start:\n");
}

/// Test coverage requested without databases is fatal.
#[test]
fn test_coverage_without_databases_is_fatal() {
    let fixture = RunFixture::new();
    let config = fixture.config_with_tables("", "\n[coverage]\ncode = true\n");
    let sources = sources(&fixture);
    let output = fixture.path().join("merged");

    let err = merge::run(&config, &default_catalog(), &sources, &output, &AlwaysNo).unwrap_err();
    assert!(matches!(err, RiverError::MissingCoverage { sources: 2 }));
}

/// Test coverage databases from every source reach the target's merge hook.
#[test]
fn test_coverage_databases_are_merged_by_target() {
    let fixture = RunFixture::new();
    let path = fixture.path().join("river_core.toml");
    fs::write(
        &path,
        config_text("core_questa", REFERENCE, "", "\n[coverage]\ncode = true\n"),
    )
    .unwrap();
    let config = RiverConfig::load(&path).unwrap();

    let sources = sources(&fixture);
    for (i, source) in sources.iter().enumerate() {
        let dir = source.join("final_coverage");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("run{}.ucdb", i)), "db").unwrap();
    }

    let log = HookLog::default();
    let mut catalog = PluginCatalog::new();
    let device = ScriptedDevice::target().with_log(&log);
    catalog.register_device("core_questa", move || Box::new(device.clone()));

    let output = fixture.path().join("merged");
    let summary = merged(merge::run(&config, &catalog, &sources, &output, &AlwaysNo).unwrap());

    assert_eq!(summary.artifacts.len(), 2);
    assert!(summary.artifacts.iter().all(|a| a.path.extension().unwrap() == "ucdb"));
    assert_eq!(summary.merged_html, vec![output.join("final_coverage/index.html")]);
    assert_eq!(log.calls().len(), 1);

    let report: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(output.join("reports/coverage_report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["target"], "core_questa");
    assert_eq!(report["databases"].as_array().unwrap().len(), 2);
    assert_eq!(report["tests"], 3);
}
