//! Initrd staging and packing for the PXE client.
//!
//! The boot root is assembled from a prepared initrd source tree (the network
//! boot logic: fetch image, mount, switch_root). It lives in a work directory
//! outside the bundle; only the packed initrd lands in the target directory.
//!
//! Signing keys are imported into `etc/pki/rpm-gpg/` of the boot root so the
//! client can verify what it downloads. Nothing here reads or checks the keys.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::builder::services::BootImage;
use crate::common::{copy_tree, prepare_work_dir};
use crate::process::{shell, shell_quote};

/// Where imported signing keys land inside the boot root.
pub const SIGNING_KEY_DIR: &str = "etc/pki/rpm-gpg";

/// [`BootImage`] producing a gzip-compressed newc cpio initrd.
#[derive(Debug, Clone)]
pub struct CpioBootImage {
    initrd_source: Option<PathBuf>,
    boot_root: PathBuf,
    initrd_filename: PathBuf,
    signing_keys: Vec<PathBuf>,
    gzip_level: u32,
}

impl CpioBootImage {
    /// `initrd_source` of `None` means the appliance boots without a boot image.
    pub fn new(
        initrd_source: Option<PathBuf>,
        work_dir: &Path,
        target_dir: &Path,
        image_base: &str,
        signing_keys: Vec<PathBuf>,
    ) -> Self {
        Self {
            initrd_source,
            boot_root: work_dir.join("initrd-root"),
            initrd_filename: target_dir.join(format!("{}.initrd", image_base)),
            signing_keys,
            gzip_level: 9,
        }
    }

    pub fn with_gzip_level(mut self, level: u32) -> Self {
        self.gzip_level = level;
        self
    }

    fn import_signing_keys(&self) -> Result<()> {
        if self.signing_keys.is_empty() {
            return Ok(());
        }

        let key_dir = self.boot_root.join(SIGNING_KEY_DIR);
        fs::create_dir_all(&key_dir)?;

        for key in &self.signing_keys {
            if !key.is_file() {
                bail!("Signing key not found: {}", key.display());
            }
            let name = key
                .file_name()
                .with_context(|| format!("Signing key has no file name: {}", key.display()))?;
            fs::copy(key, key_dir.join(name))
                .with_context(|| format!("Failed to import signing key {}", key.display()))?;
        }
        info!(count = self.signing_keys.len(), "imported signing keys into boot root");
        Ok(())
    }
}

impl BootImage for CpioBootImage {
    fn required(&self) -> bool {
        self.initrd_source.is_some()
    }

    fn prepare(&self) -> Result<()> {
        let Some(source) = &self.initrd_source else {
            bail!("No initrd source tree configured");
        };
        if !source.is_dir() {
            bail!("Initrd source tree does not exist: {}", source.display());
        }

        prepare_work_dir(&self.boot_root)?;
        let copied = copy_tree(source, &self.boot_root)?;
        info!(
            source = %source.display(),
            boot_root = %self.boot_root.display(),
            files = copied,
            "staged boot root"
        );

        self.import_signing_keys()
    }

    fn create_initrd(&self) -> Result<PathBuf> {
        if !self.boot_root.is_dir() {
            bail!(
                "Boot root {} is missing, prepare() must run first",
                self.boot_root.display()
            );
        }
        if let Some(parent) = self.initrd_filename.parent() {
            fs::create_dir_all(parent)?;
        }

        // - find -print0 | sort -z: stable member order between runs
        // - cpio -H newc: the only format the kernel unpacks
        // - gzip -n: no name/timestamp in the header
        let script = format!(
            "cd {} && find . -print0 | sort -z | cpio --null -o -H newc --quiet | gzip -n -{} > {}",
            shell_quote(&self.boot_root.to_string_lossy()),
            self.gzip_level,
            shell_quote(&self.initrd_filename.to_string_lossy())
        );
        shell(&script).context("Failed to pack initrd. Install cpio and gzip.")?;

        info!(initrd = %self.initrd_filename.display(), "created initrd");
        Ok(self.initrd_filename.clone())
    }

    fn boot_root_directory(&self) -> &Path {
        &self.boot_root
    }

    fn initrd_filename(&self) -> PathBuf {
        self.initrd_filename.clone()
    }
}
