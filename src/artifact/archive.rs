//! Tarball bundling of the PXE artifacts.
//!
//! The whole target directory is archived with paths relative to it, so the
//! tarball unpacks flat on the PXE server:
//!
//! ```text
//! some-image.x86_64-1.2.3.tar
//! ├── ./some-image.x86_64-1.2.3-6.4.0.kernel
//! ├── ./some-image.x86_64-1.2.3-xen.gz
//! ├── ./some-image.x86_64-1.2.3.initrd
//! └── ./some-image.x86_64-1.2.3.xz        # root filesystem image
//! ```

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::builder::services::Archiver;
use crate::process::Cmd;

/// [`Archiver`] that runs GNU tar.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarArchiver;

impl TarArchiver {
    fn tar(archive: &Path, source_dir: &Path) -> Result<Cmd> {
        if !source_dir.is_dir() {
            bail!("Cannot archive {}: not a directory", source_dir.display());
        }
        let mut cmd = Cmd::new("tar")
            .arg("-C")
            .arg_path(source_dir)
            .arg("--format=gnu");
        // The archive may be written into the directory it bundles
        if let Some(name) = archive.file_name() {
            cmd = cmd.arg(format!("--exclude=./{}", name.to_string_lossy()));
        }
        Ok(cmd)
    }
}

impl Archiver for TarArchiver {
    fn create(&self, archive: &Path, source_dir: &Path) -> Result<PathBuf> {
        Self::tar(archive, source_dir)?
            .arg("-cf")
            .arg_path(archive)
            .arg(".")
            .error_msg(format!("tar failed to create {}", archive.display()))
            .run()?;

        info!(archive = %archive.display(), "created tarball");
        Ok(archive.to_path_buf())
    }

    fn create_xz_compressed(
        &self,
        archive: &Path,
        source_dir: &Path,
        xz_options: &[String],
    ) -> Result<PathBuf> {
        // tar -J hands XZ_OPT through to the xz it spawns
        Self::tar(archive, source_dir)?
            .env("XZ_OPT", xz_options.join(" "))
            .arg("-cJf")
            .arg_path(archive)
            .arg(".")
            .error_msg(format!("tar failed to create {}", archive.display()))
            .run()?;

        info!(archive = %archive.display(), xz_options = ?xz_options, "created xz tarball");
        Ok(archive.to_path_buf())
    }
}
