//! PXE bundle assembly and the capabilities it consumes.

pub mod pxe;
pub mod services;

pub use pxe::{PxeBuilder, PxeConfig, PxeServices, PxeState};
