//! Checksum files for built artifacts.
//!
//! The `.md5` file uses the layout PXE deployment tooling expects:
//!
//! ```text
//! <md5-hex> <blocks> <blocksize>
//! ```
//!
//! so the receiving side can verify the image and size its target partition
//! from one line.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::builder::services::ChecksumGenerator;
use crate::process::Cmd;

/// Block sizes tried when describing an image, largest first.
const BLOCK_SIZES: &[u64] = &[4096, 2048, 1024, 512];

/// A file size expressed as `blocks * blocksize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockList {
    pub blocks: u64,
    pub blocksize: u64,
}

impl BlockList {
    /// Use the largest block size that divides `size`, else single bytes.
    pub fn for_size(size: u64) -> Self {
        let blocksize = BLOCK_SIZES
            .iter()
            .copied()
            .find(|bs| size % bs == 0)
            .unwrap_or(1);
        Self {
            blocks: size / blocksize,
            blocksize,
        }
    }
}

/// [`ChecksumGenerator`] backed by coreutils `md5sum`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Md5Checksum;

impl ChecksumGenerator for Md5Checksum {
    fn md5(&self, source: &Path, output: &Path) -> Result<String> {
        let result = Cmd::new("md5sum")
            .arg_path(source)
            .error_msg("md5sum failed. Install coreutils.")
            .run()?;

        let hash = result
            .stdout
            .split_whitespace()
            .next()
            .context("Could not parse md5sum output - no hash found")?
            .to_string();

        let size = fs::metadata(source)
            .with_context(|| format!("Failed to stat {}", source.display()))?
            .len();
        let blocks = BlockList::for_size(size);

        fs::write(
            output,
            format!("{} {} {}\n", hash, blocks.blocks, blocks.blocksize),
        )
        .with_context(|| format!("Failed to write {}", output.display()))?;

        info!(file = %output.display(), md5 = %hash, "wrote checksum");
        Ok(hash)
    }
}

/// SHA256 of a file, hex encoded.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Write `<path>.sha256` in `sha256sum -c` format.
///
/// Only the file name is recorded so the check works from inside the output
/// directory.
pub fn write_sha256_file(path: &Path) -> Result<PathBuf> {
    let hash = sha256_file(path)?;
    let filename = path
        .file_name()
        .context("Could not get artifact filename")?
        .to_string_lossy();

    let mut checksum_path = path.as_os_str().to_owned();
    checksum_path.push(".sha256");
    let checksum_path = PathBuf::from(checksum_path);

    fs::write(&checksum_path, format!("{}  {}\n", hash, filename))
        .with_context(|| format!("Failed to write {}", checksum_path.display()))?;
    Ok(checksum_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_block_list() {
        assert_eq!(BlockList::for_size(8192), BlockList { blocks: 2, blocksize: 4096 });
        assert_eq!(BlockList::for_size(3072), BlockList { blocks: 3, blocksize: 1024 });
        assert_eq!(BlockList::for_size(1536), BlockList { blocks: 3, blocksize: 512 });
        assert_eq!(BlockList::for_size(7), BlockList { blocks: 7, blocksize: 1 });
    }

    #[test]
    fn test_md5_file_format() {
        let temp = TempDir::new().unwrap();
        let image = temp.path().join("image");
        let output = temp.path().join("image.md5");
        fs::write(&image, vec![0u8; 4096]).unwrap();

        let hash = Md5Checksum.md5(&image, &output).unwrap();

        // md5 of 4096 zero bytes
        assert_eq!(hash, "620f0b67a91f7f74151bc5be745b7110");
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "620f0b67a91f7f74151bc5be745b7110 1 4096\n"
        );
    }

    #[test]
    fn test_md5_is_stable() {
        let temp = TempDir::new().unwrap();
        let image = temp.path().join("image");
        fs::write(&image, b"some image content").unwrap();

        let first = Md5Checksum.md5(&image, &temp.path().join("a.md5")).unwrap();
        let second = Md5Checksum.md5(&image, &temp.path().join("b.md5")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_md5_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let result = Md5Checksum.md5(&temp.path().join("missing"), &temp.path().join("x.md5"));
        assert!(result.is_err());
    }

    #[test]
    fn test_write_sha256_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("bundle.tar");
        fs::write(&file, b"abc").unwrap();

        let written = write_sha256_file(&file).unwrap();
        assert_eq!(written, temp.path().join("bundle.tar.sha256"));
        assert_eq!(
            fs::read_to_string(&written).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad  bundle.tar\n"
        );
    }
}
