//! Show command - displays information.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::system::{Kernel, KernelLookup};

/// Show target for the show command.
pub enum ShowTarget<'a> {
    /// Show configuration
    Config,
    /// Show the kernel and hypervisor a build would pick up
    Kernel { root: Option<&'a Path> },
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget<'_>, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Kernel { root } => {
            let root = root.unwrap_or(&config.root_dir);
            let kernel = Kernel::new(root)?;
            print!("{}", describe_kernel(&kernel)?);
        }
    }
    Ok(())
}

/// Human-readable kernel and hypervisor resolution. Fails when no kernel exists.
pub fn describe_kernel(kernel: &dyn KernelLookup) -> Result<String> {
    let mut out = String::new();

    if let Some(info) = kernel.get_kernel(true)? {
        out.push_str(&format!("Kernel:     {}\n", info.source.display()));
        out.push_str(&format!("  version:  {}\n", info.version));
        out.push_str(&format!("  name:     {}\n", info.name));
    }

    match kernel.get_xen_hypervisor() {
        Some(xen) => out.push_str(&format!("Hypervisor: {}\n", xen.filename.display())),
        None => out.push_str("Hypervisor: NOT FOUND (PXE build requires boot/xen.gz)\n"),
    }

    Ok(out)
}
