//! Host-tool implementations of the PXE pipeline's artifact services.
//!
//! - `filesystem` - root filesystem image (squashfs, EROFS, ext4)
//! - `boot_image` - initrd staging and cpio packing
//! - `compress` - standalone xz compression
//! - `archive` - tar / tar.xz bundles
//! - `checksum` - md5 and sha256 files

pub mod archive;
pub mod boot_image;
pub mod checksum;
pub mod compress;
pub mod filesystem;

pub use archive::TarArchiver;
pub use boot_image::CpioBootImage;
pub use checksum::Md5Checksum;
pub use compress::XzCompressor;
pub use filesystem::{FileSystemType, RootFilesystem};
