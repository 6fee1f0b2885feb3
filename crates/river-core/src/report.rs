//! Execution reports and run summaries.
//!
//! Devices write one JSON object per line to `<report>.json`. Only records
//! accepted by the device's [`RecordFilter`] count toward outcome totals.
//! The orchestrator in turn writes machine-readable summaries under
//! `<work_dir>/reports/`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::coverage::CoverageArtifact;
use crate::error::{RiverError, RiverResult};
use crate::registry::{TestRegistry, Verdict};
use crate::stages::reconcile::Diagnostic;
use crate::RIVER_VERSION;

/// Directory under a work or merge directory holding summary reports.
pub const REPORTS_DIR: &str = "reports";

/// File name of the run summary.
pub const RUN_REPORT_FILE: &str = "report.json";

/// File name of the coverage merge summary.
pub const COVERAGE_REPORT_FILE: &str = "coverage_report.json";

/// Selects which report records describe test outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Key that tags a record's type.
    pub key: String,
    /// Value of `key` that marks a test record.
    pub value: String,
    /// Key holding the outcome of a test record.
    pub outcome_key: String,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self {
            key: "$report_type".to_string(),
            value: "TestReport".to_string(),
            outcome_key: "outcome".to_string(),
        }
    }
}

impl RecordFilter {
    /// Returns true if `record` is a test record.
    pub fn matches(&self, record: &Value) -> bool {
        record.get(&self.key).and_then(Value::as_str) == Some(self.value.as_str())
    }

    /// Returns the outcome string of a record, if it has one.
    pub fn outcome<'a>(&self, record: &'a Value) -> Option<&'a str> {
        record.get(&self.outcome_key).and_then(Value::as_str)
    }
}

/// Outcome totals over the filtered records of one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub passed: usize,
    pub failed: usize,
    /// Skipped, errored, or records without an outcome.
    pub other: usize,
}

impl OutcomeCounts {
    /// Total records counted.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.other
    }
}

/// A device's JSON-lines execution report.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// Path of the `.json` file.
    pub path: PathBuf,
    /// Every record, unfiltered, in file order.
    pub records: Vec<Value>,
}

impl ExecutionReport {
    /// Maps the extension-less path a device returns from `run` to the
    /// report file, by appending `.json`.
    pub fn json_path(base: &Path) -> PathBuf {
        let mut os = base.as_os_str().to_os_string();
        os.push(".json");
        PathBuf::from(os)
    }

    /// Returns true if the report for `base` exists.
    pub fn exists(base: &Path) -> bool {
        Self::json_path(base).is_file()
    }

    /// Loads the report for an extension-less `base` path.
    pub fn load(base: &Path) -> RiverResult<Self> {
        let path = Self::json_path(base);
        let text = fs::read_to_string(&path).map_err(|e| RiverError::io(&path, e))?;
        Self::parse(&text, path)
    }

    /// Parses JSON-lines text. Blank lines are skipped.
    pub fn parse(text: &str, path: PathBuf) -> RiverResult<Self> {
        let mut records = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|source| RiverError::ReportRecord {
                path: path.clone(),
                line: i + 1,
                source,
            })?;
            records.push(record);
        }
        Ok(Self { path, records })
    }

    /// Records accepted by `filter`.
    pub fn filtered<'a>(&'a self, filter: &'a RecordFilter) -> impl Iterator<Item = &'a Value> + 'a {
        self.records.iter().filter(move |r| filter.matches(r))
    }

    /// Counts outcomes of the records accepted by `filter`.
    pub fn counts(&self, filter: &RecordFilter) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for record in self.filtered(filter) {
            match filter.outcome(record) {
                Some("passed") => counts.passed += 1,
                Some("failed") => counts.failed += 1,
                _ => counts.other += 1,
            }
        }
        counts
    }
}

/// Verdict totals over a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub unavailable: usize,
}

impl RunSummary {
    /// Counts one verdict.
    pub fn record(&mut self, verdict: Verdict) {
        self.total += 1;
        match verdict {
            Verdict::Passed => self.passed += 1,
            Verdict::Failed => self.failed += 1,
            Verdict::Unavailable => self.unavailable += 1,
        }
    }
}

/// One test's line in the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub result: Verdict,
    pub work_dir: PathBuf,
}

/// Outcome totals for one device's report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceOutcome {
    pub plugin: String,
    pub report: PathBuf,
    pub counts: OutcomeCounts,
}

/// Summary of one compile/run invocation, written to `reports/report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub name: String,
    pub version: String,
    pub created_at: String,
    pub isa: String,
    pub generators: Vec<String>,
    pub targets: Vec<String>,
    pub references: Vec<String>,
    pub summary: RunSummary,
    pub tests: Vec<TestResult>,
    #[serde(default)]
    pub target_outcomes: Vec<DeviceOutcome>,
    #[serde(default)]
    pub reference_outcomes: Vec<DeviceOutcome>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    /// Builds a report from the final registry.
    pub fn new(config: &crate::RiverConfig, registry: &TestRegistry) -> Self {
        Self {
            name: "RiVer Core Verification Report".to_string(),
            version: RIVER_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            isa: config.isa.clone(),
            generators: config.generators.clone(),
            targets: config.targets.clone(),
            references: config.references.clone(),
            summary: registry.summary(),
            tests: registry
                .iter()
                .map(|(name, entry)| TestResult {
                    name: name.to_string(),
                    result: entry.result,
                    work_dir: entry.work_dir.clone(),
                })
                .collect(),
            target_outcomes: Vec::new(),
            reference_outcomes: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Writes the report to `<dir>/reports/report.json`.
    pub fn write(&self, dir: &Path) -> RiverResult<PathBuf> {
        let path = dir.join(REPORTS_DIR).join(RUN_REPORT_FILE);
        write_json(&path, self)?;
        info!("run report saved at {}", path.display());
        Ok(path)
    }
}

/// Summary of a coverage merge, written to `reports/coverage_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub name: String,
    pub version: String,
    pub created_at: String,
    pub isa: String,
    pub target: Option<String>,
    pub sources: Vec<PathBuf>,
    pub databases: Vec<CoverageArtifact>,
    /// HTML summaries returned by the target's `merge_db`.
    pub merged_html: Vec<PathBuf>,
    pub tests: usize,
}

impl CoverageReport {
    /// Writes the report to `<dir>/reports/coverage_report.json`.
    pub fn write(&self, dir: &Path) -> RiverResult<PathBuf> {
        let path = dir.join(REPORTS_DIR).join(COVERAGE_REPORT_FILE);
        write_json(&path, self)?;
        info!("coverage report saved at {}", path.display());
        Ok(path)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RiverResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RiverError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|e| RiverError::io(path, e))
}
