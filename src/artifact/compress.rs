//! Standalone xz compression of the root filesystem image.

use anyhow::{bail, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::builder::services::Compressor;
use crate::process::Cmd;

/// [`Compressor`] that runs the host `xz`.
///
/// The source file is replaced by `<source>.xz`, matching what `xz` does
/// without `--keep`. `-f` makes a rerun overwrite a stale `.xz`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XzCompressor;

impl Compressor for XzCompressor {
    fn xz(&self, source: &Path, block_size: Option<&str>) -> Result<PathBuf> {
        if !source.is_file() {
            bail!("Cannot compress {}: not a file", source.display());
        }

        let mut cmd = Cmd::new("xz").arg("-f");
        if let Some(block_size) = block_size {
            cmd = cmd.arg(format!("--block-size={}", block_size));
        }
        cmd.arg_path(source)
            .error_msg(format!("xz failed to compress {}", source.display()))
            .run_interactive()?;

        let compressed = xz_filename(source);
        info!(file = %compressed.display(), "xz compressed image");
        Ok(compressed)
    }
}

/// `<source>.xz`
pub fn xz_filename(source: &Path) -> PathBuf {
    let mut name = OsString::from(source.as_os_str());
    name.push(".xz");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_xz_filename_appends_suffix() {
        assert_eq!(
            xz_filename(Path::new("target/some-image.x86_64-1.2.3")),
            PathBuf::from("target/some-image.x86_64-1.2.3.xz")
        );
    }

    #[test]
    fn test_xz_missing_source() {
        let temp = TempDir::new().unwrap();
        let err = XzCompressor
            .xz(&temp.path().join("missing"), None)
            .unwrap_err();
        assert!(err.to_string().contains("not a file"));
    }

    #[test]
    fn test_xz_replaces_source() {
        if !process::exists("xz") {
            eprintln!("[SKIP] xz not installed");
            return;
        }
        let temp = TempDir::new().unwrap();
        let image = temp.path().join("image");
        fs::write(&image, vec![b'a'; 64 * 1024]).unwrap();

        let compressed = XzCompressor.xz(&image, None).unwrap();

        assert_eq!(compressed, temp.path().join("image.xz"));
        assert!(compressed.exists());
        assert!(!image.exists());
    }
}
