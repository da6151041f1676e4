//! Root filesystem image creation.
//!
//! The PXE client mounts this image as its root, so the format must be one
//! the boot image's kernel can mount:
//!
//! - squashfs: compressed, read-only, the usual choice for network boot
//! - erofs: read-only, better random access
//! - ext4: writable, sized from the tree plus headroom

use anyhow::{bail, Context, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::builder::services::FileSystemBuilder;
use crate::process::Cmd;

/// Fixed overhead added to ext4 images for metadata and journal.
const EXT4_HEADROOM_BYTES: u64 = 64 * 1024 * 1024;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileSystemType {
    #[default]
    Squashfs,
    Erofs,
    Ext4,
}

impl FileSystemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileSystemType::Squashfs => "squashfs",
            FileSystemType::Erofs => "erofs",
            FileSystemType::Ext4 => "ext4",
        }
    }

    /// Host tool and the package that ships it.
    pub fn tool(&self) -> (&'static str, &'static str) {
        match self {
            FileSystemType::Squashfs => ("mksquashfs", "squashfs-tools"),
            FileSystemType::Erofs => ("mkfs.erofs", "erofs-utils"),
            FileSystemType::Ext4 => ("mkfs.ext4", "e2fsprogs"),
        }
    }
}

impl fmt::Display for FileSystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileSystemType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "squashfs" => Ok(FileSystemType::Squashfs),
            "erofs" => Ok(FileSystemType::Erofs),
            "ext4" => Ok(FileSystemType::Ext4),
            other => bail!(
                "Unknown filesystem '{}': expected squashfs, erofs or ext4",
                other
            ),
        }
    }
}

/// [`FileSystemBuilder`] that packs a root tree with the host mkfs tools.
#[derive(Debug, Clone)]
pub struct RootFilesystem {
    root_dir: PathBuf,
    target_dir: PathBuf,
    image_base: String,
    fs_type: FileSystemType,
}

impl RootFilesystem {
    pub fn new(
        root_dir: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
        image_base: &str,
        fs_type: FileSystemType,
    ) -> Self {
        Self {
            root_dir: root_dir.into(),
            target_dir: target_dir.into(),
            image_base: image_base.to_string(),
            fs_type,
        }
    }

    /// `<target_dir>/<image_base>.<fs_type>`
    pub fn filename(&self) -> PathBuf {
        self.target_dir
            .join(format!("{}.{}", self.image_base, self.fs_type))
    }

    fn build_squashfs(&self, output: &Path) -> Result<()> {
        Cmd::new("mksquashfs")
            .arg_path(&self.root_dir)
            .arg_path(output)
            .args(["-comp", "xz"])
            .args(["-b", "1M"])
            .arg("-noappend") // Always create fresh
            .error_msg("mksquashfs failed. Install squashfs-tools.")
            .run_interactive()?;
        Ok(())
    }

    fn build_erofs(&self, output: &Path) -> Result<()> {
        // mkfs.erofs takes OUTPUT before SOURCE
        Cmd::new("mkfs.erofs")
            .arg("-zlz4hc")
            .arg("-T0") // Reproducible builds (timestamp=0)
            .arg_path(output)
            .arg_path(&self.root_dir)
            .error_msg("mkfs.erofs failed. Install erofs-utils.")
            .run_interactive()?;
        Ok(())
    }

    fn build_ext4(&self, output: &Path) -> Result<()> {
        let size_kib = ext4_size_bytes(tree_size(&self.root_dir)) / 1024;
        Cmd::new("mkfs.ext4")
            .args(["-q", "-F"])
            .arg("-d")
            .arg_path(&self.root_dir)
            .arg_path(output)
            .arg(format!("{}k", size_kib))
            .error_msg("mkfs.ext4 failed. Install e2fsprogs.")
            .run()?;
        Ok(())
    }
}

impl FileSystemBuilder for RootFilesystem {
    fn create(&self) -> Result<PathBuf> {
        if !self.root_dir.is_dir() {
            bail!(
                "Root directory does not exist: {}",
                self.root_dir.display()
            );
        }
        fs::create_dir_all(&self.target_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.target_dir.display()
            )
        })?;

        let output = self.filename();
        if output.exists() {
            fs::remove_file(&output)
                .with_context(|| format!("Failed to remove stale {}", output.display()))?;
        }

        info!(fs = %self.fs_type, root = %self.root_dir.display(), "creating root filesystem image");
        match self.fs_type {
            FileSystemType::Squashfs => self.build_squashfs(&output)?,
            FileSystemType::Erofs => self.build_erofs(&output)?,
            FileSystemType::Ext4 => self.build_ext4(&output)?,
        }

        let metadata = fs::metadata(&output)?;
        info!("{} image created: {} MB", self.fs_type, metadata.len() / 1024 / 1024);
        Ok(output)
    }
}

/// Apparent size of all regular files below `root`.
pub fn tree_size(root: &Path) -> u64 {
    let mut total = 0;
    for entry in WalkDir::new(root) {
        match entry {
            Ok(e) => {
                if e.file_type().is_file() {
                    total += e.metadata().map(|m| m.len()).unwrap_or(0);
                }
            }
            Err(e) => warn!("Error reading tree entry: {}", e),
        }
    }
    total
}

/// Image size for a tree of `content_bytes`: 30% slack plus fixed headroom.
pub fn ext4_size_bytes(content_bytes: u64) -> u64 {
    content_bytes + content_bytes * 3 / 10 + EXT4_HEADROOM_BYTES
}
