//! Domain errors raised by the kernel resolver and the PXE pipeline.
//!
//! Everything else (tool failures, I/O) travels as a plain `anyhow::Error`.
//! These two are typed so callers can tell them apart with
//! `err.downcast_ref::<BuildError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    /// No candidate kernel file exists under the boot directory.
    #[error("No kernel found in {}, searched for {}", boot_dir.display(), candidates.join(", "))]
    KernelLookup {
        boot_dir: PathBuf,
        candidates: Vec<String>,
    },

    /// Kernel or hypervisor could not be resolved when the PXE build started.
    #[error("{0}")]
    PxeBootImage(String),
}

impl BuildError {
    pub fn is_kernel_lookup(&self) -> bool {
        matches!(self, BuildError::KernelLookup { .. })
    }

    pub fn is_pxe_boot_image(&self) -> bool {
        matches!(self, BuildError::PxeBootImage(_))
    }
}
