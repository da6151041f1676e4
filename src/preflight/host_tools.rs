//! Host tool availability checks.

use crate::config::Config;
use crate::process;
use crate::system::PackageDb;

use super::types::CheckResult;

/// Check the host tools the configured build will run.
pub fn check_host_tools(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let (mkfs, mkfs_package) = config.filesystem.tool();
    let mut required_tools = vec![
        (mkfs, mkfs_package, "Required to create the root filesystem image"),
        ("cp", "coreutils", "Required to copy kernel and hypervisor"),
        ("tar", "tar", "Required to create the PXE archive"),
        ("xz", "xz", "Required to compress the image and archive"),
        ("md5sum", "coreutils", "Required for the image checksum"),
    ];

    if config.initrd_source.is_some() {
        required_tools.push(("cpio", "cpio", "Required to pack the initrd"));
        required_tools.push(("gzip", "gzip", "Required to compress the initrd"));
    }

    match PackageDb::detect(&config.root_dir) {
        Some(PackageDb::Rpm) => {
            required_tools.push(("rpm", "rpm", "Required to export the package list"))
        }
        Some(PackageDb::Dpkg) => {
            required_tools.push(("dpkg-query", "dpkg", "Required to export the package list"));
            required_tools.push(("dpkg", "dpkg", "Required to verify packages"));
        }
        None => {}
    }

    for (tool, package, purpose) in required_tools {
        results.push(check_tool_exists(tool, package, purpose, true));
    }

    results.push(check_tool_exists(
        "kversion",
        "kiwi-tools",
        "Kernel versions will be reported as no-version-found",
        false,
    ));

    results
}

/// Check if a tool exists in PATH.
fn check_tool_exists(tool: &str, package: &str, purpose: &str, required: bool) -> CheckResult {
    match process::which(tool) {
        Some(path) => CheckResult::pass_with(tool, &path),
        None => {
            let msg = format!("Not found. Install '{}' package. {}", package, purpose);
            if required {
                CheckResult::fail(tool, &msg)
            } else {
                CheckResult::warn(tool, &msg)
            }
        }
    }
}
