//! Build environment checks (root tree, output directory, inputs).

use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::system::{Kernel, KernelLookup, PackageDb};

use super::types::CheckResult;

/// Check the configured inputs and output location.
pub fn check_build_environment(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();

    if config.image_name.is_some() {
        results.push(CheckResult::pass("image name"));
    } else {
        results.push(CheckResult::fail(
            "image name",
            "Not set. Set PXE_IMAGE_NAME or pass --name.",
        ));
    }

    results.extend(check_root_tree(&config.root_dir));
    results.push(check_writable_dir("target directory", &config.target_dir));
    results.push(check_writable_dir("work directory", &config.work_dir));

    if let Some(source) = &config.initrd_source {
        if source.is_dir() {
            results.push(CheckResult::pass_with("initrd source", &source.display().to_string()));
        } else {
            results.push(CheckResult::fail(
                "initrd source",
                &format!("{} is not a directory", source.display()),
            ));
        }
    }

    for key in &config.signing_keys {
        let name = format!("signing key {}", key.display());
        if key.is_file() {
            results.push(CheckResult::pass(&name));
        } else if config.initrd_source.is_none() {
            results.push(CheckResult::warn(&name, "Not found, unused without a boot image"));
        } else {
            results.push(CheckResult::fail(&name, "Not found"));
        }
    }

    results
}

/// Kernel, hypervisor and package database inside the root tree.
fn check_root_tree(root_dir: &Path) -> Vec<CheckResult> {
    if !root_dir.join("boot").is_dir() {
        return vec![CheckResult::fail(
            "root tree",
            &format!("{} has no boot/ directory", root_dir.display()),
        )];
    }

    let mut results = vec![CheckResult::pass_with("root tree", &root_dir.display().to_string())];

    match Kernel::new(root_dir).and_then(|kernel| {
        let found = kernel.get_kernel(false)?;
        Ok((found, kernel.get_xen_hypervisor()))
    }) {
        Ok((Some(kernel), hypervisor)) => {
            results.push(CheckResult::pass_with(
                "kernel",
                &format!("{} ({})", kernel.source.display(), kernel.version),
            ));
            match hypervisor {
                Some(xen) => results.push(CheckResult::pass_with(
                    "hypervisor",
                    &xen.filename.display().to_string(),
                )),
                None => results.push(CheckResult::fail("hypervisor", "No boot/xen.gz in root tree")),
            }
        }
        Ok((None, _)) => results.push(CheckResult::fail("kernel", "No kernel found in boot/")),
        Err(e) => results.push(CheckResult::fail("kernel", &format!("{:#}", e))),
    }

    match PackageDb::detect(root_dir) {
        Some(db) => results.push(CheckResult::pass_with("package database", &format!("{:?}", db))),
        None => results.push(CheckResult::fail(
            "package database",
            "No rpm or dpkg database, package exports will fail",
        )),
    }

    results
}

fn check_writable_dir(name: &str, dir: &Path) -> CheckResult {
    if let Err(e) = fs::create_dir_all(dir) {
        return CheckResult::fail(name, &format!("Cannot create {}: {}", dir.display(), e));
    }

    let test_file = dir.join(".preflight-test");
    match fs::write(&test_file, "test") {
        Ok(_) => {
            let _ = fs::remove_file(&test_file);
            CheckResult::pass_with(name, &dir.display().to_string())
        }
        Err(e) => CheckResult::fail(name, &format!("Cannot write to {}: {}", dir.display(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preflight::types::CheckStatus;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn status(results: &[CheckResult], name: &str) -> Option<CheckStatus> {
        results.iter().find(|r| r.name == name).map(|r| r.status)
    }

    #[test]
    fn test_missing_root_tree_fails() {
        let temp = TempDir::new().unwrap();
        let config = Config::from_vars(temp.path(), &HashMap::new()).unwrap();
        let results = check_build_environment(&config);

        assert_eq!(status(&results, "image name"), Some(CheckStatus::Fail));
        assert_eq!(status(&results, "root tree"), Some(CheckStatus::Fail));
        assert_eq!(status(&results, "target directory"), Some(CheckStatus::Pass));
        assert!(temp.path().join("output").is_dir());
    }

    #[test]
    fn test_root_tree_without_hypervisor() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir_all(root.join("boot")).unwrap();
        fs::create_dir_all(root.join("var/lib/rpm")).unwrap();
        fs::write(root.join("boot/vmlinuz"), "kernel").unwrap();

        let results = check_root_tree(&root);

        assert_eq!(status(&results, "kernel"), Some(CheckStatus::Pass));
        assert_eq!(status(&results, "hypervisor"), Some(CheckStatus::Fail));
        assert_eq!(status(&results, "package database"), Some(CheckStatus::Pass));
    }
}
