//! Result reconciliation: device dumps against reference dumps.
//!
//! A test passes when `<work_dir>/dut.dump` and `<work_dir>/ref.dump` are
//! byte-identical and fails when they differ. A missing dump is a per-test
//! [`Diagnostic`] that leaves the verdict `Unavailable`; it never aborts the
//! run. A device that ran but wrote no execution report at all does.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::RiverConfig;
use crate::error::{RiverError, RiverResult};
use crate::plugin::{DeviceRole, DeviceSession, DeviceState};
use crate::registry::{TestEntry, TestRegistry, Verdict};
use crate::report::{DeviceOutcome, ExecutionReport};

/// A test whose verdict could not be decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Test name.
    pub test: String,
    /// Side whose dump is missing.
    pub side: DeviceRole,
    /// The missing dump.
    pub path: PathBuf,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} dump for test {} is missing ({})",
            self.side,
            self.test,
            self.path.display()
        )
    }
}

/// What reconciliation did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Tests left `Unavailable` because a dump was missing.
    pub diagnostics: Vec<Diagnostic>,
    /// Outcome counts from each target's execution report.
    pub target_outcomes: Vec<DeviceOutcome>,
    /// Outcome counts from each reference's execution report.
    pub reference_outcomes: Vec<DeviceOutcome>,
    /// True if dumps were compared and `post_run` was called.
    pub compared: bool,
}

/// Decides one test's verdict from its dumps.
///
/// Returns the diagnostic for the first missing dump, checking the target
/// side first. Read failures other than a missing file are fatal.
pub fn compare_entry(name: &str, entry: &TestEntry) -> RiverResult<Result<Verdict, Diagnostic>> {
    let target = entry.dump_path(DeviceRole::Target);
    let reference = entry.dump_path(DeviceRole::Reference);
    for (side, path) in [(DeviceRole::Target, &target), (DeviceRole::Reference, &reference)] {
        if !path.is_file() {
            return Ok(Err(Diagnostic {
                test: name.to_string(),
                side,
                path: path.clone(),
            }));
        }
    }
    let equal = files_equal(&target, &reference).map_err(|e| RiverError::io(&target, e))?;
    Ok(Ok(if equal { Verdict::Passed } else { Verdict::Failed }))
}

/// Byte-exact file comparison.
pub fn files_equal(a: &Path, b: &Path) -> io::Result<bool> {
    if a.metadata()?.len() != b.metadata()?.len() {
        return Ok(false);
    }
    let mut ra = BufReader::new(File::open(a)?);
    let mut rb = BufReader::new(File::open(b)?);
    let mut buf_a = [0u8; 8192];
    let mut buf_b = [0u8; 8192];
    loop {
        let n = read_full(&mut ra, &mut buf_a)?;
        let m = read_full(&mut rb, &mut buf_b)?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Updates every verdict in `registry` and persists it to `registry_path`.
///
/// Sessions are the devices loaded by the compile stage. Only sessions that
/// completed `run` contribute reports; if either side has none, nothing can
/// be compared and every verdict is `Unavailable`.
pub fn reconcile(
    config: &RiverConfig,
    registry: &mut TestRegistry,
    registry_path: &Path,
    targets: &mut [DeviceSession],
    references: &mut [DeviceSession],
    compare: bool,
) -> RiverResult<Reconciliation> {
    let mut outcome = Reconciliation::default();

    if !compare {
        info!("comparison disabled; no verdicts will be available");
        registry.reset_verdicts();
        registry.save(registry_path)?;
        return Ok(outcome);
    }

    if targets.is_empty() {
        warn!("DuT plugin disabled; nothing to compare against the reference");
        registry.reset_verdicts();
        registry.save(registry_path)?;
        return Ok(outcome);
    }

    outcome.target_outcomes = collect_outcomes(targets)?;
    outcome.reference_outcomes = collect_outcomes(references)?;

    if outcome.target_outcomes.is_empty() || outcome.reference_outcomes.is_empty() {
        debug!("a device side did not run; resetting verdicts");
        registry.reset_verdicts();
        registry.save(registry_path)?;
        return Ok(outcome);
    }

    for (name, entry) in registry.iter_mut() {
        match compare_entry(name, entry)? {
            Ok(Verdict::Passed) => {
                info!("dumps for test {} match. TEST PASSED", name);
                entry.result = Verdict::Passed;
            }
            Ok(verdict) => {
                error!("dumps for test {} do not match. TEST FAILED", name);
                entry.result = verdict;
            }
            Err(diagnostic) => {
                error!("{}", diagnostic);
                entry.result = Verdict::Unavailable;
                outcome.diagnostics.push(diagnostic);
            }
        }
    }
    registry.save(registry_path)?;

    for session in targets.iter_mut().chain(references.iter_mut()) {
        if session.state() == DeviceState::Run {
            session.post_run(registry, config)?;
            session.finish()?;
        }
    }
    outcome.compared = true;
    Ok(outcome)
}

/// Loads the report of every session that ran.
fn collect_outcomes(sessions: &[DeviceSession]) -> RiverResult<Vec<DeviceOutcome>> {
    let mut outcomes = Vec::new();
    for session in sessions {
        if session.state() != DeviceState::Run {
            continue;
        }
        let Some(base) = session.report_path() else {
            continue;
        };
        if !ExecutionReport::exists(base) {
            return Err(RiverError::MissingExecutionReport {
                role: session.role().to_string(),
                plugin: session.name().to_string(),
                path: ExecutionReport::json_path(base),
            });
        }
        let report = ExecutionReport::load(base)?;
        let counts = report.counts(&session.record_filter());
        debug!(
            "{} report: {} passed, {} failed, {} other",
            session.name(),
            counts.passed,
            counts.failed,
            counts.other
        );
        outcomes.push(DeviceOutcome {
            plugin: session.name().to_string(),
            report: report.path,
            counts,
        });
    }
    Ok(outcomes)
}
