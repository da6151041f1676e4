//! Build command - assembles the PXE bundle with the host tools.

use anyhow::Result;

use crate::artifact::{CpioBootImage, Md5Checksum, RootFilesystem, TarArchiver, XzCompressor};
use crate::builder::{PxeBuilder, PxeServices};
use crate::config::Config;
use crate::result::BuildResult;
use crate::system::{Kernel, RootSetup};
use crate::timing::Timer;

/// Execute the build command.
///
/// Writes the bundle, the result JSON and `.sha256` files into the target
/// directory.
pub fn cmd_build(config: &Config) -> Result<BuildResult> {
    let pxe_config = config.to_pxe_config()?;
    let image_base = pxe_config.image_base();
    let target_dir = pxe_config.target_dir.clone();
    let root_dir = pxe_config.root_dir.clone();

    println!("=== PXE Build: {} ===\n", image_base);
    let build_timer = Timer::start("PXE build");

    let kernel = Kernel::new(&root_dir)?;
    let filesystem = RootFilesystem::new(&root_dir, &target_dir, &image_base, config.filesystem);
    let boot_image = CpioBootImage::new(
        config.initrd_source.clone(),
        &config.work_dir,
        &target_dir,
        &image_base,
        pxe_config.signing_keys.clone(),
    );
    let setup = RootSetup::new(&root_dir, image_base.as_str());

    let services = PxeServices {
        kernel: &kernel,
        filesystem: &filesystem,
        boot_image: &boot_image,
        setup: &setup,
        compressor: &XzCompressor,
        archiver: &TarArchiver,
        checksum: &Md5Checksum,
    };

    let result = PxeBuilder::new(pxe_config, services).create()?;

    let result_file = result.default_path(&target_dir);
    result.dump(&result_file)?;
    result.write_shasums()?;
    build_timer.finish();

    println!();
    result.print();
    println!("\nResult: {}", result_file.display());
    Ok(result)
}
