//! Subprocess Plugin Tests for RiVer Core
//!
//! Drives the whole pipeline through manifest plugins whose hooks are small
//! `sh` scripts, exercising placeholder substitution, fragment handling,
//! run-directory demotion, the regression list and hook failures.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p river-tests --test subprocess_plugins
//! ```

#![cfg(unix)]

use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};

use river_core::plugin::{manifest_path, HookCommand, PluginManifest, PostGenSpec};
use river_core::regression::RegressionList;
use river_core::stages::compile::{self, CompileOptions};
use river_core::stages::{generate, setup};
use river_core::{PluginCatalog, PluginError, PluginKind, RiverConfig, RiverError, Verdict};
use river_tests::RunFixture;

const GEN_SCRIPT: &str = r#"#!/bin/sh
out="$1"; fragment="$2"; isa="$3"
mkdir -p "$out/run_0"
printf 'SECTIONS {}\n' > "$out/run_0/run_0.ld"
: > "$fragment"
for t in t1 t2; do
  printf 'li x1, 1\n' > "$out/run_0/$t.S"
  cat >> "$fragment" <<EOF
$t:
  cc: riscv64-unknown-elf-gcc
  cc_args: ["-static"]
  linker_args: []
  isa: "$isa"
  mabi: lp64
  march: "$isa"
  work_dir: "$out/$t"
  asm_file: "$out/$t/$t.S"
  linker_file: "$out/$t/$t.ld"
EOF
done
"#;

const BUILD_SCRIPT: &str = "#!/bin/sh\nmkdir -p \"$1\"\n";

const RUN_SCRIPT: &str = r#"#!/bin/sh
work_dir="$1"; dump="$2"; report="$3"; t2_state="$4"
: > "$report.json"
for t in "$work_dir"/../../sub_gen/*/; do
  if [ "$(basename "$t")" = t2 ]; then
    printf '%s\n' "$t2_state" > "$t$dump"
  else
    printf 'x1 0x1\n' > "$t$dump"
  fi
  printf '{"$report_type": "TestReport", "outcome": "passed"}\n' >> "$report.json"
done
"#;

fn write_plugin(search: &Path, name: &str, manifest: &PluginManifest, scripts: &[(&str, &str)]) {
    let path = manifest_path(search, name);
    let dir = path.parent().unwrap();
    fs::create_dir_all(dir).unwrap();
    fs::write(&path, manifest.to_json_pretty().unwrap()).unwrap();
    for (file, body) in scripts {
        fs::write(dir.join(file), body).unwrap();
    }
}

fn generator_manifest() -> PluginManifest {
    let mut manifest = PluginManifest::new("sub_gen_plugin", PluginKind::Generator).with_hook(
        "gen",
        HookCommand::new("sh", &["gen.sh", "{output_dir}", "{fragment}", "{isa}"]),
    );
    manifest.post_gen = Some(PostGenSpec {
        run_dir_prefix: Some("run_".to_string()),
    });
    manifest
}

fn device_manifest(symbol: &str, dump: &str, t2_state: &str, build_exit: Option<&str>) -> PluginManifest {
    let build = match build_exit {
        Some(code) => HookCommand::new("sh", &["-c", code]),
        None => HookCommand::new("sh", &["build.sh", "{work_dir}"]),
    };
    PluginManifest::new(symbol, PluginKind::Device)
        .with_hook("build", build)
        .with_hook(
            "run",
            HookCommand::new("sh", &["run.sh", "{work_dir}", dump, "{report}", t2_state]),
        )
}

/// Lays out the three plugins under `<root>/plugins` and returns the config.
fn project(fixture: &RunFixture, ref_t2: &str, dut_build_exit: Option<&str>) -> RiverConfig {
    let plugins = fixture.path().join("plugins");
    write_plugin(&plugins, "sub_gen", &generator_manifest(), &[("gen.sh", GEN_SCRIPT)]);
    let device_scripts = [("build.sh", BUILD_SCRIPT), ("run.sh", RUN_SCRIPT)];
    write_plugin(
        &plugins,
        "sub_dut",
        &device_manifest("sub_dut_plugin", "dut.dump", "x2 0x2", dut_build_exit),
        &device_scripts,
    );
    write_plugin(
        &plugins,
        "sub_ref",
        &device_manifest("sub_ref_plugin", "ref.dump", ref_t2, None),
        &device_scripts,
    );

    let path = fixture.path().join("river_core.toml");
    fs::write(
        &path,
        r#"[river_core]
work_dir = "work"
isa = "rv32imc"
generator = "sub_gen"
target = "sub_dut"
reference = "sub_ref"
path_to_suite = "plugins"
path_to_target = "plugins"
path_to_ref = "plugins"

[sub_gen]
jobs = 1
seed = "random"
regress_list = "regress.yaml"

[sub_dut]
jobs = 1

[sub_ref]
jobs = 1
"#,
    )
    .unwrap();
    RiverConfig::load(&path).unwrap()
}

// ============================================================================
// Full pipeline
// ============================================================================

/// Test generation through a manifest generator demotes run directories.
#[test]
fn test_subprocess_generator_demotes_run_dirs() {
    let fixture = RunFixture::new();
    let config = project(&fixture, "x2 0x2", None);

    let outcome = generate::run(&config, &PluginCatalog::new()).unwrap();

    let suite_dir = config.work_dir.join("sub_gen");
    assert_eq!(outcome.registry.names().collect::<Vec<_>>(), vec!["t1", "t2"]);
    assert_eq!(outcome.registry.get("t1").unwrap().isa, "rv32imc");
    assert!(suite_dir.join("t1/t1.S").is_file());
    assert!(suite_dir.join("t2/t2.ld").is_file());
    assert!(!suite_dir.join("run_0").exists());
    assert!(!suite_dir.join(".river_fragment.yaml").exists());
}

/// Test the generator's post_gen records its suite in the regression list.
#[test]
fn test_subprocess_generator_updates_regression_list() {
    let fixture = RunFixture::new();
    let config = project(&fixture, "x2 0x2", None);
    generate::run(&config, &PluginCatalog::new()).unwrap();

    let list = RegressionList::load(&config.work_dir.join("regress.yaml")).unwrap();
    let suite = list.suite("sub_gen").unwrap();
    assert_eq!(suite.global_testpath, config.work_dir.join("sub_gen"));
    let names: Vec<_> = suite.tests.keys().cloned().collect();
    assert_eq!(names, vec!["t1".to_string(), "t2".to_string()]);
    assert_eq!(suite.tests["t2"].testname, "t2.S");
    assert_eq!(suite.tests["t2"].ld, "t2.ld");
}

/// Test manifest devices produce dumps and reports that reconcile.
#[test]
fn test_subprocess_devices_reconcile() {
    let fixture = RunFixture::new();
    let config = project(&fixture, "x2 0x3", None);
    let catalog = PluginCatalog::new();
    let generated = generate::run(&config, &catalog).unwrap();

    let outcome = compile::run(&config, &catalog, &CompileOptions::new(&generated.test_list)).unwrap();

    assert_eq!(outcome.registry.get("t1").unwrap().result, Verdict::Passed);
    assert_eq!(outcome.registry.get("t2").unwrap().result, Verdict::Failed);
    assert!(config.work_dir.join("dut/sub_dut/report.json").is_file());
    assert!(config.work_dir.join("ref/sub_ref/report.json").is_file());
}

/// Test a failing hook aborts the stage with its exit status.
#[test]
fn test_failing_build_hook_is_fatal() {
    let fixture = RunFixture::new();
    let config = project(&fixture, "x2 0x2", Some("echo broken toolchain >&2; exit 3"));
    let catalog = PluginCatalog::new();
    let generated = generate::run(&config, &catalog).unwrap();

    let err = compile::run(&config, &catalog, &CompileOptions::new(&generated.test_list)).unwrap_err();
    match err {
        RiverError::Plugin(PluginError::HookFailed {
            plugin,
            hook,
            status,
            stderr,
        }) => {
            assert_eq!(plugin, "sub_dut");
            assert_eq!(hook, "build");
            assert_eq!(status, Some(3));
            assert_eq!(stderr, "broken toolchain");
        }
        other => panic!("expected hook failure, got {other}"),
    }
}

// ============================================================================
// Scaffolding
// ============================================================================

/// Test the sample config and scaffolded plugins run through every stage.
#[test]
fn test_scaffolded_project_runs() {
    let fixture = RunFixture::new();
    setup::write_sample_config(fixture.path()).unwrap();
    let plugins: PathBuf = fixture.path().join("plugins");
    setup::run(
        &plugins,
        false,
        &[
            (setup::ScaffoldRole::Generator, "sample_gen".to_string()),
            (setup::ScaffoldRole::Target, "sample_dut".to_string()),
            (setup::ScaffoldRole::Reference, "sample_ref".to_string()),
        ],
    )
    .unwrap();

    let config = RiverConfig::load(&fixture.path().join(setup::CONFIG_FILE)).unwrap();
    let catalog = PluginCatalog::new();
    let generated = generate::run(&config, &catalog).unwrap();
    assert!(generated.registry.is_empty());

    let outcome = compile::run(&config, &catalog, &CompileOptions::new(&generated.test_list)).unwrap();
    assert_eq!(outcome.summary.total, 0);
    assert!(outcome.report.is_file());
}
