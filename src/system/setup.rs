//! Metadata exports from the prepared root tree.
//!
//! The package database of the root (rpm or dpkg) is queried from the host
//! with `--root`/`--admindir`, so nothing runs inside the root itself.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::builder::services::SystemSetup;
use crate::common::{copy_tree, write_file_with_dirs};
use crate::process::{command_line, CommandRunner, HostRunner};

const MODPROBE_DIR: &str = "etc/modprobe.d";

const RPM_QUERY_FORMAT: &str =
    r"%{NAME}|%{EPOCH}|%{VERSION}|%{RELEASE}|%{ARCH}|%{DISTURL}|%{LICENSE}\n";

// dpkg has no epoch/release/disturl/license columns of the same shape.
const DPKG_QUERY_FORMAT: &str = r"${Package}|None|${Version}|None|${Architecture}|None|None\n";

/// Package manager owning the root's package database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageDb {
    Rpm,
    Dpkg,
}

impl PackageDb {
    /// Detect the database present in `root_dir`.
    pub fn detect(root_dir: &Path) -> Option<Self> {
        if root_dir.join("var/lib/rpm").is_dir() || root_dir.join("usr/lib/sysimage/rpm").is_dir()
        {
            Some(PackageDb::Rpm)
        } else if root_dir.join("var/lib/dpkg/status").is_file() {
            Some(PackageDb::Dpkg)
        } else {
            None
        }
    }

    fn list_command(&self, root_dir: &Path) -> Vec<String> {
        let root = root_dir.to_string_lossy().into_owned();
        match self {
            PackageDb::Rpm => command_line([
                "rpm",
                "--root",
                root.as_str(),
                "-qa",
                "--qf",
                RPM_QUERY_FORMAT,
            ]),
            PackageDb::Dpkg => {
                let admindir = root_dir.join("var/lib/dpkg").to_string_lossy().into_owned();
                command_line([
                    "dpkg-query",
                    "--admindir",
                    admindir.as_str(),
                    "-W",
                    "-f",
                    DPKG_QUERY_FORMAT,
                ])
            }
        }
    }

    fn verify_command(&self, root_dir: &Path) -> Vec<String> {
        let root = root_dir.to_string_lossy().into_owned();
        match self {
            PackageDb::Rpm => command_line(["rpm", "--root", root.as_str(), "-Va"]),
            PackageDb::Dpkg => command_line(["dpkg", "--root", root.as_str(), "-V"]),
        }
    }
}

/// [`SystemSetup`] for one root tree.
pub struct RootSetup<R = HostRunner> {
    root_dir: PathBuf,
    image_base: String,
    runner: R,
}

impl RootSetup<HostRunner> {
    /// `image_base` is `<name>.<arch>-<version>`, the stem of the export files.
    pub fn new(root_dir: impl Into<PathBuf>, image_base: impl Into<String>) -> Self {
        Self::with_runner(root_dir, image_base, HostRunner)
    }
}

impl<R: CommandRunner> RootSetup<R> {
    pub fn with_runner(
        root_dir: impl Into<PathBuf>,
        image_base: impl Into<String>,
        runner: R,
    ) -> Self {
        Self {
            root_dir: root_dir.into(),
            image_base: image_base.into(),
            runner,
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn package_list_filename(&self, target_dir: &Path) -> PathBuf {
        target_dir.join(format!("{}.packages", self.image_base))
    }

    pub fn verification_filename(&self, target_dir: &Path) -> PathBuf {
        target_dir.join(format!("{}.verified", self.image_base))
    }

    fn package_db(&self) -> Result<PackageDb> {
        match PackageDb::detect(&self.root_dir) {
            Some(db) => Ok(db),
            None => bail!(
                "No rpm or dpkg package database found in {}",
                self.root_dir.display()
            ),
        }
    }
}

impl<R: CommandRunner> SystemSetup for RootSetup<R> {
    fn export_modprobe_setup(&self, target_root_dir: &Path) -> Result<()> {
        let source = self.root_dir.join(MODPROBE_DIR);
        if !source.is_dir() {
            debug!(path = %source.display(), "no modprobe configuration to export");
            return Ok(());
        }

        let destination = target_root_dir.join(MODPROBE_DIR);
        let copied = copy_tree(&source, &destination)
            .with_context(|| format!("Failed to export {}", source.display()))?;
        info!(files = copied, destination = %destination.display(), "exported modprobe setup");
        Ok(())
    }

    fn export_package_list(&self, target_dir: &Path) -> Result<PathBuf> {
        let db = self.package_db()?;
        let result = self.runner.run(&db.list_command(&self.root_dir), true)?;

        let mut packages: Vec<&str> = result
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        packages.sort_unstable();
        packages.dedup();

        let mut content = packages.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }

        let filename = self.package_list_filename(target_dir);
        write_file_with_dirs(&filename, content)?;
        info!(packages = packages.len(), file = %filename.display(), "exported package list");
        Ok(filename)
    }

    fn export_package_verification(&self, target_dir: &Path) -> Result<PathBuf> {
        let db = self.package_db()?;
        let result = self.runner.run(&db.verify_command(&self.root_dir), false)?;
        if !result.success() {
            warn!(
                code = result.code(),
                "package verification reported differences"
            );
        }

        let filename = self.verification_filename(target_dir);
        write_file_with_dirs(&filename, &result.stdout)?;
        info!(file = %filename.display(), "exported package verification");
        Ok(filename)
    }
}
