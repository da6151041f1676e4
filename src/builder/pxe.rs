//! PXE bundle assembly.
//!
//! Turns a prepared root tree into a network-bootable bundle:
//!
//! ```text
//! <target_dir>/
//! ├── <name>.<arch>-<version>              # root filesystem image (.xz when compressed)
//! ├── <name>.<arch>-<version>-<kver>.kernel
//! ├── <name>.<arch>-<version>-xen.gz
//! ├── <name>.<arch>-<version>.initrd       # only when a boot image is required
//! ├── <name>.<arch>-<version>.tar[.xz]     # the whole directory as it was at this point
//! ├── <name>.<arch>-<version>.packages
//! ├── <name>.<arch>-<version>.verified
//! └── <name>.<arch>-<version>.md5
//! ```
//!
//! The target directory belongs to the caller: the bundle picks up anything
//! already in it, so point each build at a fresh directory.
//!
//! Kernel and hypervisor are resolved before anything touches the disk. After
//! that every step runs in order and the first failure stops the build; there
//! is no rollback.

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use super::services::{
    Archiver, BootImage, ChecksumGenerator, Compressor, FileSystemBuilder, KernelLookup,
    SystemSetup,
};
use crate::error::BuildError;
use crate::result::BuildResult;

/// xz options for the compressed bundle: use every core.
pub const DEFAULT_XZ_OPTIONS: &[&str] = &["--threads=0"];

/// Inputs of one PXE build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PxeConfig {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub target_dir: PathBuf,
    pub root_dir: PathBuf,
    /// xz the image on its own and bundle it in a plain tar, instead of
    /// bundling the raw image in a tar.xz.
    pub compressed: bool,
    /// Final path of the filesystem image, without extension.
    pub image_name: PathBuf,
    /// Handed to the boot image, never read here.
    pub signing_keys: Vec<PathBuf>,
    pub xz_options: Vec<String>,
    /// `None` keeps xz defaults for the standalone image compression.
    pub xz_block_size: Option<String>,
}

impl PxeConfig {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        arch: impl Into<String>,
        root_dir: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
    ) -> Self {
        let name = name.into();
        let version = version.into();
        let arch = arch.into();
        let target_dir = target_dir.into();
        let image_name = target_dir.join(image_base(&name, &arch, &version));

        Self {
            name,
            version,
            arch,
            target_dir,
            root_dir: root_dir.into(),
            compressed: false,
            image_name,
            signing_keys: Vec::new(),
            xz_options: DEFAULT_XZ_OPTIONS.iter().map(|o| o.to_string()).collect(),
            xz_block_size: None,
        }
    }

    /// `<name>.<arch>-<version>`, the stem every output file shares.
    pub fn image_base(&self) -> String {
        image_base(&self.name, &self.arch, &self.version)
    }

    pub fn checksum_filename(&self) -> PathBuf {
        self.target_dir.join(format!("{}.md5", self.image_base()))
    }

    pub fn archive_filename(&self) -> PathBuf {
        let extension = if self.compressed { "tar" } else { "tar.xz" };
        PathBuf::from(format!("{}.{}", self.image_name.display(), extension))
    }

    fn image_file_name(&self) -> String {
        self.image_name
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.image_base())
    }
}

pub fn image_base(name: &str, arch: &str, version: &str) -> String {
    format!("{}.{}-{}", name, arch, version)
}

/// Where a [`PxeBuilder`] is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PxeState {
    Start,
    KernelResolved,
    HypervisorResolved,
    FsBuilt,
    Renamed,
    BootPrepared,
    InitrdBuilt,
    Archived,
    MetadataExported,
    Checksummed,
    Done,
    Aborted,
}

impl fmt::Display for PxeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PxeState::Start => "start",
            PxeState::KernelResolved => "kernel-resolved",
            PxeState::HypervisorResolved => "hypervisor-resolved",
            PxeState::FsBuilt => "fs-built",
            PxeState::Renamed => "renamed",
            PxeState::BootPrepared => "boot-prepared",
            PxeState::InitrdBuilt => "initrd-built",
            PxeState::Archived => "archived",
            PxeState::MetadataExported => "metadata-exported",
            PxeState::Checksummed => "checksummed",
            PxeState::Done => "done",
            PxeState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// The collaborators a build drives.
#[derive(Clone, Copy)]
pub struct PxeServices<'a> {
    pub kernel: &'a dyn KernelLookup,
    pub filesystem: &'a dyn FileSystemBuilder,
    pub boot_image: &'a dyn BootImage,
    pub setup: &'a dyn SystemSetup,
    pub compressor: &'a dyn Compressor,
    pub archiver: &'a dyn Archiver,
    pub checksum: &'a dyn ChecksumGenerator,
}

pub struct PxeBuilder<'a> {
    config: PxeConfig,
    services: PxeServices<'a>,
    state: PxeState,
}

impl<'a> PxeBuilder<'a> {
    pub fn new(config: PxeConfig, services: PxeServices<'a>) -> Self {
        Self {
            config,
            services,
            state: PxeState::Start,
        }
    }

    pub fn config(&self) -> &PxeConfig {
        &self.config
    }

    pub fn state(&self) -> PxeState {
        self.state
    }

    fn transition(&mut self, state: PxeState) {
        debug!(from = %self.state, to = %state, "pxe state");
        self.state = state;
    }

    fn abort(&mut self, message: String) -> anyhow::Error {
        self.transition(PxeState::Aborted);
        BuildError::PxeBootImage(message).into()
    }

    /// Run the whole build. May be called again; every step overwrites its
    /// previous output.
    pub fn create(&mut self) -> Result<BuildResult> {
        let services = self.services;
        self.state = PxeState::Start;
        info!(
            image = %self.config.image_base(),
            root = %self.config.root_dir.display(),
            "creating PXE root filesystem image"
        );

        let Some(kernel) = services.kernel.get_kernel(false)? else {
            return Err(self.abort(format!(
                "No kernel found in {}/boot",
                self.config.root_dir.display()
            )));
        };
        self.transition(PxeState::KernelResolved);

        let Some(hypervisor) = services.kernel.get_xen_hypervisor() else {
            return Err(self.abort(format!(
                "No hypervisor found in {}/boot",
                self.config.root_dir.display()
            )));
        };
        self.transition(PxeState::HypervisorResolved);

        fs::create_dir_all(&self.config.target_dir).with_context(|| {
            format!("Failed to create {}", self.config.target_dir.display())
        })?;

        let filesystem_image = services.filesystem.create()?;
        self.transition(PxeState::FsBuilt);

        if filesystem_image != self.config.image_name {
            fs::rename(&filesystem_image, &self.config.image_name).with_context(|| {
                format!(
                    "Failed to rename {} to {}",
                    filesystem_image.display(),
                    self.config.image_name.display()
                )
            })?;
        }
        self.transition(PxeState::Renamed);

        let mut initrd = None;
        if services.boot_image.required() {
            info!("creating PXE boot image");
            services.boot_image.prepare()?;
            services
                .setup
                .export_modprobe_setup(services.boot_image.boot_root_directory())?;
            self.transition(PxeState::BootPrepared);

            initrd = Some(services.boot_image.create_initrd()?);
            self.transition(PxeState::InitrdBuilt);
        } else {
            debug!("no boot image required");
        }

        let image_file_name = self.config.image_file_name();
        let kernel_file = services.kernel.copy_resolved_kernel(
            &kernel,
            &self.config.target_dir,
            Some(format!("{}-{}.kernel", image_file_name, kernel.version).as_str()),
        )?;
        let hypervisor_file = services.kernel.copy_xen_hypervisor(
            &self.config.target_dir,
            Some(format!("{}-{}", image_file_name, hypervisor.name).as_str()),
        )?;

        let image = if self.config.compressed {
            info!("xz compressing root filesystem image");
            services
                .compressor
                .xz(&self.config.image_name, self.config.xz_block_size.as_deref())?
        } else {
            self.config.image_name.clone()
        };

        let archive_name = self.config.archive_filename();
        info!(archive = %archive_name.display(), "creating PXE archive");
        let archive = if self.config.compressed {
            services
                .archiver
                .create(&archive_name, &self.config.target_dir)?
        } else {
            services.archiver.create_xz_compressed(
                &archive_name,
                &self.config.target_dir,
                &self.config.xz_options,
            )?
        };
        self.transition(PxeState::Archived);

        info!("exporting package metadata");
        let packages = services.setup.export_package_list(&self.config.target_dir)?;
        let verified = services
            .setup
            .export_package_verification(&self.config.target_dir)?;
        self.transition(PxeState::MetadataExported);

        let checksum_file = self.config.checksum_filename();
        let md5 = services.checksum.md5(&image, &checksum_file)?;
        info!(%md5, file = %checksum_file.display(), "image checksum");
        self.transition(PxeState::Checksummed);

        let mut result = BuildResult::new(&self.config.name, &self.config.version, &self.config.arch);
        result.add("pxe_archive", archive, true, false, true);
        result.add("kernel", kernel_file, false, false, false);
        result.add("hypervisor", hypervisor_file, false, false, false);
        if let Some(initrd) = initrd {
            result.add("initrd", initrd, false, false, false);
        }
        result.add("image_packages", packages, true, false, false);
        result.add("image_verified", verified, true, false, false);
        result.add("image_checksum", checksum_file, true, false, false);

        self.transition(PxeState::Done);
        info!(image = %image.display(), "PXE bundle complete");
        Ok(result)
    }
}
