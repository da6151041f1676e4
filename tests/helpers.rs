//! Shared test utilities for pxe-builder tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use pxe_builder::builder::services::{
    Archiver, BootImage, ChecksumGenerator, Compressor, FileSystemBuilder, SystemSetup,
};
use pxe_builder::builder::PxeConfig;
use pxe_builder::process::{CommandResult, CommandRunner};
use pxe_builder::system::{HypervisorInfo, KernelInfo, KernelLookup};

/// Test environment with temporary root, target and work directories.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    pub root: PathBuf,
    pub target: PathBuf,
    pub work: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let root = base.join("root_dir");
        let target = base.join("target_dir");
        let work = base.join("work");
        fs::create_dir_all(root.join("boot")).expect("Failed to create root dir");
        fs::create_dir_all(&target).expect("Failed to create target dir");

        Self {
            _temp_dir: temp_dir,
            root,
            target,
            work,
        }
    }

    pub fn base(&self) -> &Path {
        self._temp_dir.path()
    }

    /// The configuration of the pipeline tests: `some-image`, version
    /// `1.2.3`, image renamed to `myimage`.
    pub fn pxe_config(&self, compressed: bool) -> PxeConfig {
        let mut config = PxeConfig::new("some-image", "1.2.3", "x86_64", &self.root, &self.target);
        config.image_name = self.target.join("myimage");
        config.compressed = compressed;
        config.signing_keys = vec![PathBuf::from("key_file_a"), PathBuf::from("key_file_b")];
        config
    }
}

/// Create a file, including parent directories.
pub fn touch(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(path, content).expect("Failed to write file");
}

/// Populate a root tree with a kernel, module tree and hypervisor.
pub fn create_mock_root(root: &Path, kernel_version: &str) {
    fs::create_dir_all(root.join("lib/modules").join(kernel_version))
        .expect("Failed to create module tree");
    touch(&root.join("boot").join(format!("vmlinuz-{}", kernel_version)), "kernel");
    touch(&root.join("boot/xen.gz"), "xen");
}

/// Command runner answering every command with canned stdout, recording calls.
pub struct StubRunner {
    pub stdout: String,
    pub calls: RefCell<Vec<Vec<String>>>,
}

impl StubRunner {
    pub fn new(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for &StubRunner {
    fn run(&self, command: &[String], _raise_on_error: bool) -> Result<CommandResult> {
        self.calls.borrow_mut().push(command.to_vec());
        Ok(CommandResult::new(0, self.stdout.clone(), ""))
    }
}

/// One double for every pipeline service.
///
/// Every call is appended to the journal. Calls that produce files write
/// small placeholders so renames and archive member names work for real.
pub struct FakeServices {
    pub target: PathBuf,
    pub kernel: Option<KernelInfo>,
    pub hypervisor: Option<HypervisorInfo>,
    pub boot_required: bool,
    pub boot_root: PathBuf,
    pub initrd: PathBuf,
    pub fs_output: PathBuf,
    pub fail_on: Option<&'static str>,
    journal: RefCell<Vec<String>>,
}

impl FakeServices {
    pub fn new(env: &TestEnv) -> Self {
        Self {
            target: env.target.clone(),
            kernel: Some(KernelInfo {
                filename: PathBuf::from("some-kernel"),
                source: PathBuf::from("some-kernel"),
                version: "42".to_string(),
                name: "vmlinuz-42".to_string(),
            }),
            hypervisor: Some(HypervisorInfo {
                filename: PathBuf::from("hypervisor"),
                name: "xen.gz".to_string(),
            }),
            boot_required: true,
            boot_root: env.work.join("initrd_dir"),
            initrd: env.target.join("initrd_file_name"),
            fs_output: env.target.join("myimage.fs"),
            fail_on: None,
            journal: RefCell::new(Vec::new()),
        }
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.borrow().clone()
    }

    pub fn clear(&self) {
        self.journal.borrow_mut().clear();
    }

    /// Journal entries whose first word is `call`.
    pub fn calls_to(&self, call: &str) -> Vec<String> {
        self.journal
            .borrow()
            .iter()
            .filter(|entry| entry.split_whitespace().next() == Some(call))
            .cloned()
            .collect()
    }

    fn record(&self, entry: String) -> Result<()> {
        let call = entry.split_whitespace().next().unwrap_or_default().to_string();
        self.journal.borrow_mut().push(entry);
        if self.fail_on == Some(call.as_str()) {
            bail!("{} failed", call);
        }
        Ok(())
    }

    fn name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl KernelLookup for FakeServices {
    fn get_kernel(&self, raise_on_not_found: bool) -> Result<Option<KernelInfo>> {
        self.record(format!("get_kernel {}", raise_on_not_found))?;
        Ok(self.kernel.clone())
    }

    fn get_xen_hypervisor(&self) -> Option<HypervisorInfo> {
        self.journal.borrow_mut().push("get_xen_hypervisor".to_string());
        self.hypervisor.clone()
    }

    fn copy_resolved_kernel(
        &self,
        kernel: &KernelInfo,
        target_dir: &Path,
        file_name: Option<&str>,
    ) -> Result<PathBuf> {
        let file_name = file_name.unwrap_or("kernel");
        self.record(format!("copy_kernel {} {}", Self::name(&kernel.source), file_name))?;
        let destination = target_dir.join(file_name);
        fs::write(&destination, "kernel")?;
        Ok(destination)
    }

    fn copy_xen_hypervisor(&self, target_dir: &Path, file_name: Option<&str>) -> Result<PathBuf> {
        let file_name = file_name.unwrap_or("hypervisor");
        self.record(format!("copy_xen_hypervisor {}", file_name))?;
        let destination = target_dir.join(file_name);
        fs::write(&destination, "xen")?;
        Ok(destination)
    }
}

impl FileSystemBuilder for FakeServices {
    fn create(&self) -> Result<PathBuf> {
        self.record("filesystem.create".to_string())?;
        fs::write(&self.fs_output, "filesystem")?;
        Ok(self.fs_output.clone())
    }
}

impl BootImage for FakeServices {
    fn required(&self) -> bool {
        self.boot_required
    }

    fn prepare(&self) -> Result<()> {
        self.record("boot.prepare".to_string())?;
        fs::create_dir_all(&self.boot_root)?;
        Ok(())
    }

    fn create_initrd(&self) -> Result<PathBuf> {
        self.record("boot.create_initrd".to_string())?;
        fs::write(&self.initrd, "initrd")?;
        Ok(self.initrd.clone())
    }

    fn boot_root_directory(&self) -> &Path {
        &self.boot_root
    }

    fn initrd_filename(&self) -> PathBuf {
        self.initrd.clone()
    }
}

impl SystemSetup for FakeServices {
    fn export_modprobe_setup(&self, target_root_dir: &Path) -> Result<()> {
        self.record(format!("export_modprobe_setup {}", Self::name(target_root_dir)))
    }

    fn export_package_list(&self, target_dir: &Path) -> Result<PathBuf> {
        self.record(format!("export_package_list {}", Self::name(target_dir)))?;
        let file = target_dir.join("some-image.x86_64-1.2.3.packages");
        fs::write(&file, "bash|(none)|5.2|1|x86_64|None|GPL-3.0\n")?;
        Ok(file)
    }

    fn export_package_verification(&self, target_dir: &Path) -> Result<PathBuf> {
        self.record(format!("export_package_verification {}", Self::name(target_dir)))?;
        let file = target_dir.join("some-image.x86_64-1.2.3.verified");
        fs::write(&file, "")?;
        Ok(file)
    }
}

impl Compressor for FakeServices {
    fn xz(&self, source: &Path, block_size: Option<&str>) -> Result<PathBuf> {
        self.record(format!("xz {} {:?}", Self::name(source), block_size))?;
        let compressed = PathBuf::from(format!("{}.xz", source.display()));
        fs::rename(source, &compressed)?;
        Ok(compressed)
    }
}

impl Archiver for FakeServices {
    fn create(&self, archive: &Path, source_dir: &Path) -> Result<PathBuf> {
        self.record(format!(
            "tar {} {}",
            Self::name(archive),
            Self::name(source_dir)
        ))?;
        fs::write(archive, "tar")?;
        Ok(archive.to_path_buf())
    }

    fn create_xz_compressed(
        &self,
        archive: &Path,
        source_dir: &Path,
        xz_options: &[String],
    ) -> Result<PathBuf> {
        self.record(format!(
            "tar.xz {} {} {}",
            Self::name(archive),
            Self::name(source_dir),
            xz_options.join(" ")
        ))?;
        fs::write(archive, "tar.xz")?;
        Ok(archive.to_path_buf())
    }
}

impl ChecksumGenerator for FakeServices {
    fn md5(&self, source: &Path, output: &Path) -> Result<String> {
        self.record(format!("md5 {} {}", Self::name(source), output.display()))?;
        let digest = "0123456789abcdef0123456789abcdef".to_string();
        fs::write(output, format!("{} 1 512\n", digest))?;
        Ok(digest)
    }
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.is_file(), "Expected file at {}", path.display());
}

/// Assert that nothing exists at `path`.
pub fn assert_not_exists(path: &Path) {
    assert!(
        path.symlink_metadata().is_err(),
        "Expected nothing at {}",
        path.display()
    );
}
