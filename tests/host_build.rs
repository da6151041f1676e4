//! End-to-end build with the host tool implementations.
//!
//! Package queries go through a stub runner; everything else runs for real.
//! Skipped when the tools are not installed.

mod helpers;

use helpers::{assert_file_exists, create_mock_root, touch, StubRunner, TestEnv};
use pxe_builder::artifact::{
    CpioBootImage, FileSystemType, Md5Checksum, RootFilesystem, TarArchiver, XzCompressor,
};
use pxe_builder::builder::{PxeBuilder, PxeConfig, PxeServices};
use pxe_builder::process::{self, Cmd, CommandResult, CommandRunner};
use pxe_builder::system::{Kernel, RootSetup};
use std::fs;

const TOOLS: &[&str] = &["mksquashfs", "xz", "tar", "md5sum", "cpio", "gzip"];

fn tools_missing() -> bool {
    match TOOLS.iter().find(|tool| !process::exists(tool)) {
        Some(tool) => {
            eprintln!("[SKIP] {} not installed", tool);
            true
        }
        None => false,
    }
}

/// Runs `cp` for real, answers everything else like a package manager would.
struct PackageStub(StubRunner);

impl CommandRunner for &PackageStub {
    fn run(&self, command: &[String], raise_on_error: bool) -> anyhow::Result<CommandResult> {
        if command[0] == "cp" {
            return Cmd::new("cp").args(&command[1..]).run();
        }
        (&self.0).run(command, raise_on_error)
    }
}

#[test]
fn test_build_bundle_with_host_tools() {
    if tools_missing() {
        return;
    }

    let env = TestEnv::new();
    create_mock_root(&env.root, "6.4.0-default");
    fs::create_dir_all(env.root.join("var/lib/rpm")).unwrap();
    touch(&env.root.join("etc/modprobe.d/10-unsupported.conf"), "allow_unsupported_modules 1\n");
    let initrd_source = env.base().join("initrd-src");
    touch(&initrd_source.join("init"), "#!/bin/sh\n");
    let key = env.base().join("signing.asc");
    touch(&key, "key");

    let mut config = PxeConfig::new("some-image", "1.2.3", "x86_64", &env.root, &env.target);
    config.signing_keys = vec![key];
    let image_base = config.image_base();

    let runner = PackageStub(StubRunner::new("6.4.0-default\n"));
    let kernel = Kernel::with_runner(&env.root, &runner).unwrap();
    let filesystem =
        RootFilesystem::new(&env.root, &env.target, &image_base, FileSystemType::Squashfs);
    let boot_image = CpioBootImage::new(
        Some(initrd_source),
        &env.work,
        &env.target,
        &image_base,
        config.signing_keys.clone(),
    );
    let package_runner = StubRunner::new("bash|(none)|5.2|1|x86_64|None|GPL-3.0\n");
    let setup = RootSetup::with_runner(&env.root, image_base.as_str(), &package_runner);

    let services = PxeServices {
        kernel: &kernel,
        filesystem: &filesystem,
        boot_image: &boot_image,
        setup: &setup,
        compressor: &XzCompressor,
        archiver: &TarArchiver,
        checksum: &Md5Checksum,
    };
    let result = PxeBuilder::new(config, services).create().unwrap();

    let archive = env.target.join("some-image.x86_64-1.2.3.tar.xz");
    assert_eq!(result.get("pxe_archive").unwrap().filename, archive);
    assert_file_exists(&archive);
    assert_file_exists(&env.target.join("some-image.x86_64-1.2.3"));
    assert_file_exists(&env.target.join("some-image.x86_64-1.2.3.initrd"));
    assert_file_exists(&env.target.join("some-image.x86_64-1.2.3.md5"));
    assert_eq!(
        fs::read_to_string(env.target.join("some-image.x86_64-1.2.3.packages")).unwrap(),
        "bash|(none)|5.2|1|x86_64|None|GPL-3.0\n"
    );
    assert!(env
        .work
        .join("initrd-root/etc/modprobe.d/10-unsupported.conf")
        .is_file());

    let listing = process::run("tar", ["-tJf", archive.to_str().unwrap()]).unwrap();
    let mut members: Vec<&str> = listing
        .stdout
        .lines()
        .filter(|line| !line.ends_with('/'))
        .collect();
    members.sort();
    assert_eq!(
        members,
        vec![
            "./some-image.x86_64-1.2.3",
            "./some-image.x86_64-1.2.3-6.4.0-default.kernel",
            "./some-image.x86_64-1.2.3-xen.gz",
            "./some-image.x86_64-1.2.3.initrd",
        ]
    );
}
