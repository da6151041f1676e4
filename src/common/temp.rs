//! Utilities for managing work directories.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Remove `work_dir` if it exists from a previous run and create it fresh.
pub fn prepare_work_dir(work_dir: &Path) -> Result<()> {
    if work_dir.exists() {
        fs::remove_dir_all(work_dir)
            .with_context(|| format!("Failed to clean {}", work_dir.display()))?;
    }
    fs::create_dir_all(work_dir)
        .with_context(|| format!("Failed to create {}", work_dir.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_work_dir_starts_empty() {
        let temp = TempDir::new().unwrap();
        let work = temp.path().join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(work.join("stale"), "x").unwrap();

        prepare_work_dir(&work).unwrap();

        assert!(work.is_dir());
        assert_eq!(fs::read_dir(&work).unwrap().count(), 0);
    }
}
