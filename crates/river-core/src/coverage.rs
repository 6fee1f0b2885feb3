//! Coverage artifacts and per-tool database layouts.
//!
//! Coverage databases are opaque to the pipeline: they are located on disk,
//! tagged with the tool that produced them, and handed to the target
//! device's `merge_db` hook.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{RiverError, RiverResult};

/// Kind of coverage a database holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Code,
    Functional,
}

impl ReportKind {
    /// Returns the lowercase kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Code => "code",
            ReportKind::Functional => "functional",
        }
    }
}

/// Simulator that produced a coverage database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageTool {
    Cadence,
    Questa,
    Verilator,
}

/// Where a tool leaves its databases inside a run directory.
struct Layout {
    db_dir: &'static str,
    db_pattern: &'static str,
    html_pattern: Option<&'static str>,
}

impl CoverageTool {
    /// All known tools.
    pub const ALL: [CoverageTool; 3] = [
        CoverageTool::Cadence,
        CoverageTool::Questa,
        CoverageTool::Verilator,
    ];

    /// Infers the tool from a target plugin name such as `chromite_questa`.
    pub fn from_target(target: &str) -> Option<Self> {
        let lower = target.to_ascii_lowercase();
        Self::ALL.into_iter().find(|tool| lower.contains(tool.as_str()))
    }

    /// Returns the lowercase tool name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageTool::Cadence => "cadence",
            CoverageTool::Questa => "questa",
            CoverageTool::Verilator => "verilator",
        }
    }

    fn layout(&self) -> Layout {
        match self {
            CoverageTool::Cadence => Layout {
                db_dir: "reports/final_coverage",
                db_pattern: "*.ucd",
                html_pattern: Some("reports/final_coverage_html/*.html"),
            },
            CoverageTool::Questa => Layout {
                db_dir: "final_coverage",
                db_pattern: "*.ucdb",
                html_pattern: Some("cov_html/*.html"),
            },
            CoverageTool::Verilator => Layout {
                db_dir: "final_coverage",
                db_pattern: "*.dat",
                html_pattern: None,
            },
        }
    }
}

impl fmt::Display for CoverageTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coverage database found in a run directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageArtifact {
    /// Database path.
    pub path: PathBuf,
    /// Producing tool.
    pub tool: CoverageTool,
    /// Coverage kinds the database was collected for. Simulators write
    /// code and functional coverage into the same database.
    pub kinds: Vec<ReportKind>,
    /// HTML summary next to the database, if the tool writes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<PathBuf>,
}

/// Collects every coverage database `tool` left in `run_dir`, tagged with
/// the enabled `kinds`.
///
/// A run directory without the tool's coverage directory yields an empty
/// list and a warning; whether that is fatal is the caller's decision.
pub fn collect(
    run_dir: &Path,
    tool: CoverageTool,
    kinds: &[ReportKind],
) -> RiverResult<Vec<CoverageArtifact>> {
    let layout = tool.layout();
    let db_dir = run_dir.join(layout.db_dir);
    if !db_dir.is_dir() {
        warn!("no coverage databases found in {}", run_dir.display());
        return Ok(Vec::new());
    }

    let html = match layout.html_pattern {
        Some(pattern) => glob_sorted(run_dir, pattern)?.into_iter().next(),
        None => None,
    };
    let artifacts: Vec<_> = glob_sorted(&db_dir, layout.db_pattern)?
        .into_iter()
        .map(|path| CoverageArtifact {
            path,
            tool,
            kinds: kinds.to_vec(),
            html: html.clone(),
        })
        .collect();

    debug!(
        "found {} {} database(s) in {}",
        artifacts.len(),
        tool,
        run_dir.display()
    );
    Ok(artifacts)
}

fn glob_sorted(dir: &Path, pattern: &str) -> RiverResult<Vec<PathBuf>> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        pattern
    );
    let paths = glob::glob(&full).map_err(|e| {
        RiverError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
        )
    })?;
    let mut found = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            RiverError::io(path, e.into_error())
        })?;
        found.push(path);
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"db").unwrap();
    }

    #[test]
    fn test_tool_from_target_name() {
        assert_eq!(CoverageTool::from_target("chromite_questa"), Some(CoverageTool::Questa));
        assert_eq!(CoverageTool::from_target("Chromite_Cadence"), Some(CoverageTool::Cadence));
        assert_eq!(CoverageTool::from_target("chromite_verilator"), Some(CoverageTool::Verilator));
        assert_eq!(CoverageTool::from_target("spike"), None);
    }

    #[test]
    fn test_collect_questa_with_html() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("final_coverage/b.ucdb"));
        touch(&tmp.path().join("final_coverage/a.ucdb"));
        touch(&tmp.path().join("final_coverage/ignored.dat"));
        touch(&tmp.path().join("cov_html/index.html"));

        let found = collect(tmp.path(), CoverageTool::Questa, &[ReportKind::Code]).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].path.ends_with("final_coverage/a.ucdb"));
        assert!(found[1].path.ends_with("final_coverage/b.ucdb"));
        assert!(found[0].html.as_ref().unwrap().ends_with("cov_html/index.html"));
    }

    #[test]
    fn test_collect_cadence_layout() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("reports/final_coverage/merged.ucd"));
        let found = collect(tmp.path(), CoverageTool::Cadence, &[ReportKind::Functional]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kinds, vec![ReportKind::Functional]);
        assert_eq!(found[0].html, None);
    }

    #[test]
    fn test_collect_tags_every_enabled_kind() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("final_coverage/run.dat"));
        let kinds = [ReportKind::Code, ReportKind::Functional];
        let found = collect(tmp.path(), CoverageTool::Verilator, &kinds).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kinds, kinds.to_vec());
    }

    #[test]
    fn test_collect_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let found = collect(tmp.path(), CoverageTool::Verilator, &[ReportKind::Code]).unwrap();
        assert!(found.is_empty());
    }
}
