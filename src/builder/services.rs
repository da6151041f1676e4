//! Capabilities the PXE pipeline consumes.
//!
//! Each external step of the build is a trait so the caller decides what runs:
//! the CLI wires in the host-tool implementations from `crate::artifact` and
//! `crate::system::setup`, tests wire in recording doubles.

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use crate::system::kernel::KernelLookup;

/// Materialises the root filesystem image.
pub trait FileSystemBuilder {
    /// Build the image and return the path of the file written.
    fn create(&self) -> Result<PathBuf>;
}

/// Stages and packs the initial RAM disk.
pub trait BootImage {
    /// Whether this appliance needs a boot image at all.
    fn required(&self) -> bool;

    /// Populate [`BootImage::boot_root_directory`].
    fn prepare(&self) -> Result<()>;

    /// Pack the boot root into [`BootImage::initrd_filename`].
    fn create_initrd(&self) -> Result<PathBuf>;

    fn boot_root_directory(&self) -> &Path;

    fn initrd_filename(&self) -> PathBuf;
}

/// Exports system metadata out of the root tree.
pub trait SystemSetup {
    /// Copy modprobe configuration into the boot root.
    fn export_modprobe_setup(&self, target_root_dir: &Path) -> Result<()>;

    /// Write the installed package list into `target_dir`.
    fn export_package_list(&self, target_dir: &Path) -> Result<PathBuf>;

    /// Write the package verification report into `target_dir`.
    fn export_package_verification(&self, target_dir: &Path) -> Result<PathBuf>;
}

/// Compresses a single file in place.
pub trait Compressor {
    /// xz-compress `source`, returning the compressed file name.
    ///
    /// `block_size` of `None` keeps xz defaults.
    fn xz(&self, source: &Path, block_size: Option<&str>) -> Result<PathBuf>;
}

/// Bundles a whole directory into a tarball.
///
/// Every entry of `source_dir` goes in, except `archive` itself when it lives
/// there.
pub trait Archiver {
    /// Plain tar of `source_dir`.
    fn create(&self, archive: &Path, source_dir: &Path) -> Result<PathBuf>;

    /// xz-compressed tar of `source_dir`, passing `xz_options` to xz.
    fn create_xz_compressed(
        &self,
        archive: &Path,
        source_dir: &Path,
        xz_options: &[String],
    ) -> Result<PathBuf>;
}

/// Checksums an artifact.
pub trait ChecksumGenerator {
    /// Write the md5 of `source` to `output`, returning the hex digest.
    fn md5(&self, source: &Path, output: &Path) -> Result<String>;
}
