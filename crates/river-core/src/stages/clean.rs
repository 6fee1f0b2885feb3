//! Clean stage: reclaim the configured work directory.

use tracing::info;

use crate::config::RiverConfig;
use crate::confirm::Confirm;
use crate::error::RiverResult;
use crate::fsutil;

/// Result of a clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanOutcome {
    /// The work directory did not exist.
    NothingToClean,
    /// The work directory was deleted.
    Removed,
    /// The user kept it.
    Declined,
}

/// Deletes `config.work_dir` after confirmation.
pub fn run(config: &RiverConfig, confirm: &dyn Confirm) -> RiverResult<CleanOutcome> {
    let work_dir = &config.work_dir;
    if !work_dir.exists() {
        info!("{} does not exist; nothing to clean", work_dir.display());
        return Ok(CleanOutcome::NothingToClean);
    }

    let prompt = format!("{} will be deleted. Continue?", work_dir.display());
    if !confirm.confirm(&prompt) {
        info!("keeping {}", work_dir.display());
        return Ok(CleanOutcome::Declined);
    }

    fsutil::remove_dir(work_dir)?;
    info!("{} deleted", work_dir.display());
    Ok(CleanOutcome::Removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::{AlwaysNo, AlwaysYes};
    use std::fs;

    fn config(root: &std::path::Path) -> RiverConfig {
        RiverConfig::from_toml_str(
            "[river_core]\nwork_dir = \"work\"\nisa = \"rv32i\"\n",
            &root.join("river_core.toml"),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_work_dir_is_nothing_to_clean() {
        let tmp = tempfile::tempdir().unwrap();
        let outcome = run(&config(tmp.path()), &AlwaysYes).unwrap();
        assert_eq!(outcome, CleanOutcome::NothingToClean);
    }

    #[test]
    fn test_declined_keeps_work_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        fs::create_dir_all(config.work_dir.join("suite")).unwrap();

        assert_eq!(run(&config, &AlwaysNo).unwrap(), CleanOutcome::Declined);
        assert!(config.work_dir.join("suite").is_dir());

        assert_eq!(run(&config, &AlwaysYes).unwrap(), CleanOutcome::Removed);
        assert!(!config.work_dir.exists());
    }
}
