//! Filesystem helpers shared by the stages.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{RiverError, RiverResult};

/// Removes `dir` if it exists and creates it again, empty.
pub(crate) fn recreate_dir(dir: &Path) -> RiverResult<()> {
    remove_dir(dir)?;
    fs::create_dir_all(dir).map_err(|e| RiverError::io(dir, e))
}

/// Removes `dir` and everything below it. A missing directory is not an error.
pub(crate) fn remove_dir(dir: &Path) -> RiverResult<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| RiverError::io(dir, e))?;
    }
    Ok(())
}

/// Copies the tree at `src` into `dst`, overwriting existing files.
pub(crate) fn copy_dir_recursive(src: &Path, dst: &Path) -> RiverResult<u64> {
    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            RiverError::io(path, e.into())
        })?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| RiverError::io(&target, e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| RiverError::io(entry.path(), e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copies `src` into `dir`, keeping its file name.
pub(crate) fn copy_into(src: &Path, dir: &Path) -> RiverResult<std::path::PathBuf> {
    let name = src.file_name().ok_or_else(|| {
        RiverError::io(
            src,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let target = dir.join(name);
    fs::copy(src, &target).map_err(|e| RiverError::io(src, e))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_dir_recursive() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.S"), "nop").unwrap();
        fs::write(src.join("nested/b.ld"), "SECTIONS {}").unwrap();

        let dst = tmp.path().join("dst");
        assert_eq!(copy_dir_recursive(&src, &dst).unwrap(), 2);
        assert_eq!(fs::read_to_string(dst.join("nested/b.ld")).unwrap(), "SECTIONS {}");
    }

    #[test]
    fn test_recreate_dir_clears_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("out");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stale"), "x").unwrap();
        recreate_dir(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_remove_missing_dir_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        remove_dir(&tmp.path().join("never")).unwrap();
    }
}
