//! Preflight checks for a PXE build.
//!
//! Validates host tools and the configured inputs before starting a build.
//! Run with `pxe-builder preflight` to check everything is ready.

mod environment;
mod host_tools;
mod types;

use anyhow::{bail, Result};
use tracing::info;

use crate::config::Config;

pub use host_tools::check_host_tools;
pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Run all preflight checks.
pub fn run_preflight(config: &Config) -> PreflightReport {
    let mut checks = Vec::new();

    info!("checking host tools");
    checks.extend(host_tools::check_host_tools(config));

    info!("checking build environment");
    checks.extend(environment::check_build_environment(config));

    PreflightReport { checks }
}

/// Run preflight and bail if any checks fail.
pub fn run_preflight_or_fail(config: &Config) -> Result<()> {
    let report = run_preflight(config);
    report.print();

    if !report.all_passed() {
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above before building.",
            report.fail_count()
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}
