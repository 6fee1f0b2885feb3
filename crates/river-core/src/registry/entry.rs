//! Test entry and verdict types.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::plugin::DeviceRole;

/// Per-test outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Verdict {
    /// Not compared yet, or one of the dumps is missing.
    #[default]
    Unavailable,
    /// Device and reference dumps are byte-identical.
    Passed,
    /// Device and reference dumps differ.
    Failed,
}

impl Verdict {
    /// All verdict names, in serialized form.
    pub const NAMES: [&'static str; 3] = ["Unavailable", "Passed", "Failed"];

    /// Returns the serialized name of this verdict.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Unavailable => "Unavailable",
            Verdict::Passed => "Passed",
            Verdict::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestEntry {
    /// Compiler identifier (e.g. `riscv64-unknown-elf-gcc`).
    pub cc: String,
    /// Ordered compiler flags.
    pub cc_args: Vec<String>,
    /// Ordered linker flags.
    pub linker_args: Vec<String>,
    /// Target ISA string.
    pub isa: String,
    /// Target ABI string.
    pub mabi: String,
    /// Target architecture string.
    pub march: String,
    /// Working directory owning every file generated for this test.
    pub work_dir: PathBuf,
    /// Assembly source.
    pub asm_file: PathBuf,
    /// Linker script.
    pub linker_file: PathBuf,
    /// Auxiliary files shared across tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_compile: Option<Vec<PathBuf>>,
    /// Comparison verdict.
    #[serde(default)]
    pub result: Verdict,
}

impl TestEntry {
    /// Path of the dump a device role writes for this test.
    pub fn dump_path(&self, role: DeviceRole) -> PathBuf {
        self.work_dir.join(role.dump_file_name())
    }

    /// Returns the entry with every path rebased under `work_dir`, keeping the
    /// conventional `<name>.S` / `<name>.ld` layout.
    pub fn relocated(&self, name: &str, work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            asm_file: work_dir.join(format!("{}.S", name)),
            linker_file: work_dir.join(format!("{}.ld", name)),
            ..self.clone()
        }
    }
}
