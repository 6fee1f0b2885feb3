//! Regression list: the persisted per-suite index of generated tests.
//!
//! ```yaml
//! microtesk:
//!   global_testpath: /work/microtesk
//!   tests:
//!     add_01:
//!       testname: add_01.S
//!       ld: add_01.ld
//! ```
//!
//! Generators that emit tests into temporary run directories use
//! [`demote_run_dirs`] and [`scan_suite_dir`] in their post-gen step, then
//! fold the result in with [`RegressionList::merge_suite`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{RiverError, RiverResult};
use crate::fsutil;

/// Files of one generated test, relative to its directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFiles {
    /// Assembly file name.
    pub testname: String,
    /// Linker script file name.
    pub ld: String,
}

/// One suite's section of the regression list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteEntry {
    /// Directory all test directories of the suite live in.
    pub global_testpath: PathBuf,
    /// Test directory name to its files.
    #[serde(default)]
    pub tests: BTreeMap<String, TestFiles>,
}

/// Suite name to suite entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegressionList {
    pub suites: BTreeMap<String, SuiteEntry>,
}

impl RegressionList {
    /// Loads a regression list; a missing or empty file is an empty list.
    pub fn load(path: &Path) -> RiverResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|e| RiverError::io(path, e))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).map_err(|e| RiverError::yaml(path, e))
    }

    /// Writes the regression list, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> RiverResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RiverError::io(parent, e))?;
        }
        let yaml = serde_yaml::to_string(self).map_err(|e| RiverError::yaml(path, e))?;
        fs::write(path, yaml).map_err(|e| RiverError::io(path, e))
    }

    /// Folds `entry` into the section for `suite`.
    ///
    /// Same-named tests of that suite are overwritten, its other tests are
    /// kept, and other suites are not touched. Merging the same entry twice
    /// leaves the list unchanged.
    pub fn merge_suite(&mut self, suite: &str, entry: SuiteEntry) {
        let section = self.suites.entry(suite.to_string()).or_default();
        section.global_testpath = entry.global_testpath;
        section.tests.extend(entry.tests);
    }

    /// Returns the section for `suite`.
    pub fn suite(&self, suite: &str) -> Option<&SuiteEntry> {
        self.suites.get(suite)
    }
}

/// Moves every test out of the temporary run directories under `gendir`.
///
/// A run directory is any directory whose name starts with `prefix` and that
/// holds `.S` files. Each `<run>/<test>.S` becomes `<gendir>/<test>/<test>.S`
/// next to a copy of the run's `<run>.ld` saved as `<test>.ld`. Run
/// directories are removed afterwards. Returns the number of tests moved.
pub fn demote_run_dirs(gendir: &Path, prefix: &str) -> RiverResult<usize> {
    let mut run_dirs = Vec::new();
    for entry in WalkDir::new(gendir).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(gendir).to_path_buf();
            RiverError::io(path, e.into())
        })?;
        let is_run_dir = entry.file_type().is_dir()
            && entry.file_name().to_string_lossy().starts_with(prefix);
        if is_run_dir {
            run_dirs.push(entry.into_path());
        }
    }
    run_dirs.sort();

    let mut moved = 0;
    for run_dir in &run_dirs {
        let ld_name = run_dir
            .file_name()
            .map(|n| format!("{}.ld", n.to_string_lossy()))
            .unwrap_or_default();
        let ld_path = run_dir.join(&ld_name);
        let parent = run_dir.parent().unwrap_or(gendir);

        for asm in files_with_extension(run_dir, "S")? {
            let Some(test) = asm.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let test_dir = parent.join(&test);
            fs::create_dir_all(&test_dir).map_err(|e| RiverError::io(&test_dir, e))?;
            if ld_path.is_file() {
                let target = test_dir.join(format!("{}.ld", test));
                fs::copy(&ld_path, &target).map_err(|e| RiverError::io(&ld_path, e))?;
            }
            let target = test_dir.join(format!("{}.S", test));
            fs::rename(&asm, &target).map_err(|e| RiverError::io(&asm, e))?;
            debug!("demoted {} to {}", asm.display(), test_dir.display());
            moved += 1;
        }
        fsutil::remove_dir(run_dir)?;
    }
    Ok(moved)
}

/// Describes every test directory directly below `gendir`.
pub fn scan_suite_dir(gendir: &Path) -> RiverResult<SuiteEntry> {
    let mut tests = BTreeMap::new();
    let entries = fs::read_dir(gendir).map_err(|e| RiverError::io(gendir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| RiverError::io(gendir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let mut files = TestFiles::default();
        for file in files_with_extension(&path, "S")?.into_iter().take(1) {
            files.testname = file_name(&file);
        }
        for file in files_with_extension(&path, "ld")?.into_iter().take(1) {
            files.ld = file_name(&file);
        }
        tests.insert(file_name(&path), files);
    }
    Ok(SuiteEntry {
        global_testpath: gendir.to_path_buf(),
        tests,
    })
}

fn files_with_extension(dir: &Path, ext: &str) -> RiverResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| RiverError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| RiverError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == ext) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn suite(root: &str, tests: &[&str]) -> SuiteEntry {
        SuiteEntry {
            global_testpath: PathBuf::from(root),
            tests: tests
                .iter()
                .map(|t| {
                    (
                        t.to_string(),
                        TestFiles {
                            testname: format!("{}.S", t),
                            ld: format!("{}.ld", t),
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_merge_suite_overwrites_and_keeps() {
        let mut list = RegressionList::default();
        list.merge_suite("microtesk", suite("/old", &["a", "b"]));
        list.merge_suite("aapg", suite("/aapg", &["x"]));

        let mut update = suite("/new", &["b", "c"]);
        update.tests.get_mut("b").unwrap().ld = "shared.ld".to_string();
        list.merge_suite("microtesk", update);

        let micro = list.suite("microtesk").unwrap();
        assert_eq!(micro.global_testpath, PathBuf::from("/new"));
        assert_eq!(micro.tests.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(micro.tests["b"].ld, "shared.ld");
        assert_eq!(list.suite("aapg").unwrap(), &suite("/aapg", &["x"]));
    }

    #[test]
    fn test_merge_suite_is_fixed_point() {
        let mut list = RegressionList::default();
        list.merge_suite("microtesk", suite("/w", &["a"]));
        let once = list.clone();
        list.merge_suite("microtesk", suite("/w", &["a"]));
        assert_eq!(list, once);
    }

    #[test]
    fn test_yaml_shape() {
        let mut list = RegressionList::default();
        list.merge_suite("microtesk", suite("/w/microtesk", &["add_01"]));
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("regress.yaml");
        list.save(&path).unwrap();

        let value: serde_yaml::Value =
            serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            value["microtesk"]["tests"]["add_01"]["testname"].as_str(),
            Some("add_01.S")
        );
        assert_eq!(RegressionList::load(&path).unwrap(), list);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let list = RegressionList::load(&tmp.path().join("none.yaml")).unwrap();
        assert!(list.suites.is_empty());
    }

    #[test]
    fn test_demote_and_scan() {
        let tmp = tempfile::tempdir().unwrap();
        let gendir = tmp.path();
        let run = gendir.join("microtesk_rv64");
        fs::create_dir_all(&run).unwrap();
        fs::write(run.join("microtesk_rv64.ld"), "SECTIONS {}").unwrap();
        fs::write(run.join("add_01.S"), "add x1, x2, x3").unwrap();
        fs::write(run.join("sub_01.S"), "sub x1, x2, x3").unwrap();

        assert_eq!(demote_run_dirs(gendir, "microtesk_").unwrap(), 2);
        assert!(!run.exists());
        assert_eq!(
            fs::read_to_string(gendir.join("add_01/add_01.S")).unwrap(),
            "add x1, x2, x3"
        );
        assert!(gendir.join("sub_01/sub_01.ld").is_file());

        let entry = scan_suite_dir(gendir).unwrap();
        assert_eq!(entry, suite(&gendir.to_string_lossy(), &["add_01", "sub_01"]));
    }
}
