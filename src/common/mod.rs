//! Shared utilities across pxe-builder modules.

pub mod files;
pub mod temp;

pub use files::{copy_tree, write_file_with_dirs};
pub use temp::prepare_work_dir;
