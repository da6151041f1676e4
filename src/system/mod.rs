//! Inspection of and exports from the prepared root tree.

pub mod kernel;
pub mod setup;

pub use kernel::{HypervisorInfo, Kernel, KernelInfo, KernelLookup, NO_VERSION_FOUND};
pub use setup::{PackageDb, RootSetup};
