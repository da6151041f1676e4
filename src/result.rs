//! Record of the artifacts a build produced.
//!
//! Written next to the artifacts as JSON so downstream tooling (PXE server
//! sync, release scripts) can pick up the bundle without guessing file names.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::checksum::write_sha256_file;
use crate::common::write_file_with_dirs;

/// One produced file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFile {
    pub filename: PathBuf,
    /// Part of the deliverable bundle, as opposed to build metadata.
    pub use_for_bundle: bool,
    /// Downstream may compress it further.
    pub compress: bool,
    /// A `.sha256` file should accompany it.
    pub shasum: bool,
}

/// All files produced by one build, keyed by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub files: BTreeMap<String, ResultFile>,
}

impl BuildResult {
    pub fn new(name: &str, version: &str, arch: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            arch: arch.to_string(),
            files: BTreeMap::new(),
        }
    }

    /// Register a file. A later call with the same key replaces the entry.
    pub fn add(
        &mut self,
        key: &str,
        filename: impl Into<PathBuf>,
        use_for_bundle: bool,
        compress: bool,
        shasum: bool,
    ) {
        self.files.insert(
            key.to_string(),
            ResultFile {
                filename: filename.into(),
                use_for_bundle,
                compress,
                shasum,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&ResultFile> {
        self.files.get(key)
    }

    /// Default location of the result file inside `target_dir`.
    pub fn default_path(&self, target_dir: &Path) -> PathBuf {
        target_dir.join(format!(
            "{}.{}-{}.result.json",
            self.name, self.arch, self.version
        ))
    }

    /// Serialize to pretty JSON at `path`.
    pub fn dump(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_file_with_dirs(path, json + "\n")
            .with_context(|| format!("Failed to write build result {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read build result {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid build result {}", path.display()))
    }

    /// Write `<file>.sha256` for every entry flagged `shasum`.
    pub fn write_shasums(&self) -> Result<Vec<PathBuf>> {
        self.files
            .values()
            .filter(|file| file.shasum)
            .map(|file| write_sha256_file(&file.filename))
            .collect()
    }

    pub fn print(&self) {
        println!("Build result for {}.{}-{}:", self.name, self.arch, self.version);
        for (key, file) in &self.files {
            println!("  {:<16} {}", key, file.filename.display());
        }
    }
}
