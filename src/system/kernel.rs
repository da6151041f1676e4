//! Kernel and hypervisor resolution inside a prepared root tree.
//!
//! Distributions disagree on what the kernel in `/boot` is called: x86 ships
//! `vmlinuz-<release>`, arm64 ships `Image-<release>`, u-boot targets ship
//! `uImage-<release>`, and SUSE keeps a gzipped `vmlinux-<release>.gz` next to
//! the bootable image. [`Kernel`] builds an ordered list of candidate names from
//! the installed module trees and picks the first one present.
//!
//! ```text
//! <root>/
//! ├── boot/
//! │   ├── vmlinuz -> vmlinuz-6.4.0-default
//! │   ├── vmlinuz-6.4.0-default
//! │   ├── vmlinux-6.4.0-default.gz    # probed for the version when present
//! │   └── xen.gz                      # hypervisor, looked up by exact name
//! └── lib/modules/
//!     └── 6.4.0-default/              # drives the versioned candidate names
//! ```
//!
//! Versions come from the external `kversion` tool. The probe never fails the
//! lookup: empty output (including a missing `kversion`) becomes
//! [`NO_VERSION_FOUND`].

use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::BuildError;
use crate::process::{command_line, CommandRunner, HostRunner};

/// Version reported when the probe produced no output.
pub const NO_VERSION_FOUND: &str = "no-version-found";

/// Architecture independent names, tried before any versioned name.
const GENERIC_KERNEL_NAMES: &[&str] = &["vmlinux", "vmlinuz"];

/// Prefixes combined with each module-tree version, in priority order.
const KERNEL_PREFIXES: &[&str] = &["uImage", "Image", "zImage", "vmlinuz", "vmlinux", "image"];

/// Module tree locations, the usr-merged one as fallback.
const MODULE_DIRS: &[&str] = &["lib/modules", "usr/lib/modules"];

const XEN_HYPERVISOR_NAME: &str = "xen.gz";

/// A resolved kernel binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelInfo {
    /// `<root>/boot/<candidate>`, the uncompressed name even when only the
    /// `.gz` sibling exists.
    pub filename: PathBuf,
    /// The file on disk to copy: `filename` if present, else its `.gz`.
    pub source: PathBuf,
    /// Output of `kversion`, or [`NO_VERSION_FOUND`].
    pub version: String,
    /// Basename of the matched file after resolving symlinks.
    pub name: String,
}

/// A resolved Xen hypervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HypervisorInfo {
    pub filename: PathBuf,
    pub name: String,
}

/// Lookup and copy operations the PXE pipeline needs from a kernel resolver.
pub trait KernelLookup {
    /// Find the first candidate kernel present under `boot/`.
    ///
    /// Returns `Ok(None)` when nothing matches, unless `raise_on_not_found`
    /// is set, in which case [`BuildError::KernelLookup`] is returned.
    fn get_kernel(&self, raise_on_not_found: bool) -> Result<Option<KernelInfo>>;

    /// Find `boot/xen.gz`.
    fn get_xen_hypervisor(&self) -> Option<HypervisorInfo>;

    /// Look the kernel up and copy it into `target_dir`, by default as
    /// `kernel-<version>.kernel`.
    fn copy_kernel(&self, target_dir: &Path, file_name: Option<&str>) -> Result<PathBuf> {
        let kernel = self
            .get_kernel(true)?
            .ok_or_else(|| anyhow!("No kernel to copy into {}", target_dir.display()))?;
        self.copy_resolved_kernel(&kernel, target_dir, file_name)
    }

    /// Copy an already resolved kernel without looking it up again.
    fn copy_resolved_kernel(
        &self,
        kernel: &KernelInfo,
        target_dir: &Path,
        file_name: Option<&str>,
    ) -> Result<PathBuf>;

    /// Copy the hypervisor into `target_dir`, by default as `hypervisor-<name>`.
    fn copy_xen_hypervisor(&self, target_dir: &Path, file_name: Option<&str>) -> Result<PathBuf>;
}

/// Kernel resolver for one root tree.
pub struct Kernel<R = HostRunner> {
    root_dir: PathBuf,
    kernel_names: Vec<String>,
    runner: R,
}

impl Kernel<HostRunner> {
    /// Create a resolver that probes versions with the host's `kversion`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_runner(root_dir, HostRunner)
    }
}

impl<R: CommandRunner> Kernel<R> {
    /// Create a resolver with an explicit command runner.
    pub fn with_runner(root_dir: impl Into<PathBuf>, runner: R) -> Result<Self> {
        let root_dir = root_dir.into();
        let versions = module_versions(&root_dir)?;
        let kernel_names = kernel_names_for(&versions);
        debug!(root = %root_dir.display(), candidates = ?kernel_names, "kernel lookup candidates");

        Ok(Self {
            root_dir,
            kernel_names,
            runner,
        })
    }

    /// Replace the candidate list.
    pub fn with_kernel_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kernel_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn kernel_names(&self) -> &[String] {
        &self.kernel_names
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn boot_dir(&self) -> PathBuf {
        self.root_dir.join("boot")
    }

    /// The gzipped `vmlinux-<release>.gz`, if the root ships one.
    fn vmlinux_version_source(&self) -> Option<PathBuf> {
        let boot_dir = self.boot_dir();
        self.kernel_names
            .iter()
            .filter(|name| name.starts_with("vmlinux-"))
            .map(|name| boot_dir.join(format!("{}.gz", name)))
            .find(|path| path.exists())
    }

    fn probe_version(&self, kernel_file: &Path) -> Result<String> {
        let command = command_line(["kversion".to_string(), path_string(kernel_file)]);
        let result = self.runner.run(&command, false)?;

        let version = result.stdout_trimmed();
        if version.is_empty() {
            debug!(file = %kernel_file.display(), "kversion returned no output");
            Ok(NO_VERSION_FOUND.to_string())
        } else {
            Ok(version.to_string())
        }
    }

    fn copy(&self, source: &Path, destination: &Path) -> Result<()> {
        let command = command_line(["cp".to_string(), path_string(source), path_string(destination)]);
        self.runner.run(&command, true)?;
        Ok(())
    }
}

impl<R: CommandRunner> KernelLookup for Kernel<R> {
    fn get_kernel(&self, raise_on_not_found: bool) -> Result<Option<KernelInfo>> {
        let boot_dir = self.boot_dir();

        for kernel_name in &self.kernel_names {
            let kernel_file = boot_dir.join(kernel_name);
            let compressed_file = boot_dir.join(format!("{}.gz", kernel_name));

            let matched = if compressed_file.exists() {
                compressed_file
            } else if kernel_file.exists() {
                kernel_file.clone()
            } else {
                continue;
            };

            let version_source = self
                .vmlinux_version_source()
                .unwrap_or_else(|| matched.clone());
            let version = self.probe_version(&version_source)?;

            let real_path = fs::canonicalize(&matched)
                .with_context(|| format!("Failed to resolve {}", matched.display()))?;
            let name = real_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| kernel_name.clone());

            let source = if kernel_file.exists() {
                kernel_file.clone()
            } else {
                matched
            };

            info!(kernel = %source.display(), %version, "kernel found");
            return Ok(Some(KernelInfo {
                filename: kernel_file,
                source,
                version,
                name,
            }));
        }

        if raise_on_not_found {
            return Err(BuildError::KernelLookup {
                boot_dir,
                candidates: self.kernel_names.clone(),
            }
            .into());
        }
        Ok(None)
    }

    fn get_xen_hypervisor(&self) -> Option<HypervisorInfo> {
        let xen_file = self.boot_dir().join(XEN_HYPERVISOR_NAME);
        if !xen_file.exists() {
            debug!(path = %xen_file.display(), "no xen hypervisor");
            return None;
        }
        Some(HypervisorInfo {
            filename: xen_file,
            name: XEN_HYPERVISOR_NAME.to_string(),
        })
    }

    fn copy_resolved_kernel(
        &self,
        kernel: &KernelInfo,
        target_dir: &Path,
        file_name: Option<&str>,
    ) -> Result<PathBuf> {
        let file_name = file_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("kernel-{}.kernel", kernel.version));
        let destination = target_dir.join(file_name);
        self.copy(&kernel.source, &destination)?;
        Ok(destination)
    }

    fn copy_xen_hypervisor(&self, target_dir: &Path, file_name: Option<&str>) -> Result<PathBuf> {
        let Some(hypervisor) = self.get_xen_hypervisor() else {
            bail!(
                "No hypervisor to copy: {} does not exist",
                self.boot_dir().join(XEN_HYPERVISOR_NAME).display()
            );
        };
        let file_name = file_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("hypervisor-{}", hypervisor.name));
        let destination = target_dir.join(file_name);
        self.copy(&hypervisor.filename, &destination)?;
        Ok(destination)
    }
}

/// Versions of the installed module trees, sorted.
///
/// A root without a module tree has no versions.
pub fn module_versions(root_dir: &Path) -> Result<Vec<String>> {
    let Some(modules_dir) = MODULE_DIRS
        .iter()
        .map(|dir| root_dir.join(dir))
        .find(|dir| dir.is_dir())
    else {
        return Ok(Vec::new());
    };

    let mut versions = Vec::new();
    for entry in fs::read_dir(&modules_dir)
        .with_context(|| format!("Failed to list {}", modules_dir.display()))?
    {
        let entry = entry?;
        if entry.path().is_dir() {
            versions.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    versions.sort();
    Ok(versions)
}

/// Ordered candidate names for the given module-tree versions.
pub fn kernel_names_for(versions: &[String]) -> Vec<String> {
    let mut names: Vec<String> = GENERIC_KERNEL_NAMES.iter().map(|n| n.to_string()).collect();
    for prefix in KERNEL_PREFIXES {
        for version in versions {
            names.push(format!("{}-{}", prefix, version));
        }
    }
    names
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
