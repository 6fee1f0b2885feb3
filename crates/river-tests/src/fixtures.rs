//! Test fixture utilities for configurations, registries and run directories.

use std::fs;
use std::path::{Path, PathBuf};

use river_core::registry::TEST_LIST_FILE;
use river_core::{RiverConfig, TestEntry, TestRegistry, Verdict};
use tempfile::TempDir;

/// Generator, target and reference names used by [`crate::plugins::catalog`].
pub const GENERATOR: &str = "scripted_gen";
pub const TARGET: &str = "scripted_dut";
pub const REFERENCE: &str = "scripted_ref";

/// A temporary project root holding a `river_core.toml`.
pub struct RunFixture {
    pub root: TempDir,
}

impl RunFixture {
    /// Create a new empty project root.
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp dir");
        Self { root }
    }

    /// Get the project root path.
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Writes a config using the scripted plugin names and loads it.
    ///
    /// `extra` is appended to the `[river_core]` table and may set keys the
    /// template leaves out, such as `collision_policy`.
    pub fn config(&self, extra: &str) -> RiverConfig {
        self.config_from(&config_text(TARGET, REFERENCE, extra, ""))
    }

    /// Writes a config with explicit target and reference lists; an empty
    /// list disables the role.
    pub fn config_with_devices(&self, target: &str, reference: &str) -> RiverConfig {
        self.config_from(&config_text(target, reference, "", ""))
    }

    /// Like [`RunFixture::config`], with extra tables appended at the end.
    pub fn config_with_tables(&self, extra: &str, tables: &str) -> RiverConfig {
        self.config_from(&config_text(TARGET, REFERENCE, extra, tables))
    }

    fn config_from(&self, text: &str) -> RiverConfig {
        let path = self.path().join("river_core.toml");
        fs::write(&path, text).expect("Failed to write config");
        RiverConfig::load(&path).expect("Failed to load config")
    }

    /// Creates a prior run directory `<root>/<name>` with a saved test list
    /// whose tests each own a work directory holding `.S`, `.ld` and a
    /// `marker` file containing `marker`.
    pub fn run_dir(&self, name: &str, tests: &[&str], marker: &str) -> PathBuf {
        let dir = self.path().join(name);
        let mut registry = TestRegistry::new();
        for test in tests {
            let work_dir = dir.join("suite").join(test);
            fs::create_dir_all(&work_dir).expect("Failed to create test dir");
            fs::write(work_dir.join(format!("{}.S", test)), "nop\n").expect("Failed to write asm");
            fs::write(work_dir.join(format!("{}.ld", test)), "SECTIONS {}\n")
                .expect("Failed to write linker script");
            fs::write(work_dir.join("marker"), marker).expect("Failed to write marker");
            registry.insert(*test, entry(test, &work_dir));
        }
        registry
            .save(&dir.join(TEST_LIST_FILE))
            .expect("Failed to save test list");
        dir
    }
}

impl Default for RunFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Config text wired to the scripted plugins.
pub fn config_text(target: &str, reference: &str, extra: &str, tables: &str) -> String {
    format!(
        r#"[river_core]
work_dir = "work"
isa = "rv64imac"
generator = "{generator}"
target = "{target}"
reference = "{reference_list}"
{extra}

[{generator}]
jobs = 2
seed = 42
count = 1

[{dut}]
jobs = 1

[{reference}]
jobs = 1
{tables}
"#,
        generator = GENERATOR,
        dut = TARGET,
        reference = REFERENCE,
        target = target,
        reference_list = reference,
        extra = extra,
        tables = tables,
    )
}

/// A complete test entry owning `work_dir`.
pub fn entry(name: &str, work_dir: &Path) -> TestEntry {
    TestEntry {
        cc: "riscv64-unknown-elf-gcc".to_string(),
        cc_args: vec!["-mcmodel=medany".to_string(), "-nostdlib".to_string()],
        linker_args: vec!["-static".to_string()],
        isa: "rv64imac".to_string(),
        mabi: "lp64".to_string(),
        march: "rv64imac".to_string(),
        work_dir: work_dir.to_path_buf(),
        asm_file: work_dir.join(format!("{}.S", name)),
        linker_file: work_dir.join(format!("{}.ld", name)),
        extra_compile: None,
        result: Verdict::Unavailable,
    }
}
