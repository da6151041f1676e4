//! Configuration management for pxe-builder.
//!
//! Reads configuration from .env file and environment variables.
//! Environment variables take precedence over .env file, command line flags
//! take precedence over both.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::artifact::FileSystemType;
use crate::builder::PxeConfig;

pub const DEFAULT_IMAGE_VERSION: &str = "1.0.0";

/// pxe-builder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Appliance name (PXE_IMAGE_NAME). Required to build.
    pub image_name: Option<String>,
    pub image_version: String,
    pub arch: String,
    pub root_dir: PathBuf,
    pub target_dir: PathBuf,
    /// Scratch space for the boot root (PXE_WORK_DIR).
    pub work_dir: PathBuf,
    pub compressed: bool,
    pub filesystem: FileSystemType,
    /// Initrd source tree. Unset means no boot image.
    pub initrd_source: Option<PathBuf>,
    pub signing_keys: Vec<PathBuf>,
    pub xz_block_size: Option<String>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub name: Option<String>,
    pub version: Option<String>,
    pub arch: Option<String>,
    pub root_dir: Option<PathBuf>,
    pub target_dir: Option<PathBuf>,
    /// Only ever switches compression on.
    pub compressed: bool,
    pub filesystem: Option<FileSystemType>,
    pub initrd_source: Option<PathBuf>,
    /// Added to the configured keys.
    pub signing_keys: Vec<PathBuf>,
}

impl Config {
    /// Load configuration from `<base_dir>/.env` and the environment.
    pub fn load(base_dir: &Path) -> Result<Self> {
        let mut env_vars = HashMap::new();

        let env_path = base_dir.join(".env");
        if env_path.exists() {
            for item in dotenvy::from_path_iter(&env_path)
                .with_context(|| format!("Failed to read {}", env_path.display()))?
            {
                let (key, value) =
                    item.with_context(|| format!("Invalid line in {}", env_path.display()))?;
                env_vars.insert(key, value);
            }
        }

        // Environment variables override .env file
        for (key, value) in std::env::vars() {
            env_vars.insert(key, value);
        }

        Self::from_vars(base_dir, &env_vars)
    }

    /// Build configuration from an explicit variable map.
    pub fn from_vars(base_dir: &Path, vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let path = |key: &str, default: &str| {
            get(key)
                .map(|v| resolve_path(base_dir, v))
                .unwrap_or_else(|| base_dir.join(default))
        };

        let compressed = match get("PXE_COMPRESSED") {
            Some(value) => parse_bool(value).context("PXE_COMPRESSED")?,
            None => false,
        };

        let filesystem = match get("PXE_FILESYSTEM") {
            Some(value) => value.parse::<FileSystemType>().context("PXE_FILESYSTEM")?,
            None => FileSystemType::default(),
        };

        let signing_keys = get("PXE_SIGNING_KEYS")
            .map(|keys| {
                keys.split(':')
                    .filter(|k| !k.is_empty())
                    .map(|k| resolve_path(base_dir, k))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            image_name: get("PXE_IMAGE_NAME").map(str::to_string),
            image_version: get("PXE_IMAGE_VERSION")
                .unwrap_or(DEFAULT_IMAGE_VERSION)
                .to_string(),
            arch: get("PXE_ARCH")
                .unwrap_or(std::env::consts::ARCH)
                .to_string(),
            root_dir: path("PXE_ROOT_DIR", "root"),
            target_dir: path("PXE_TARGET_DIR", "output"),
            work_dir: path("PXE_WORK_DIR", "work"),
            compressed,
            filesystem,
            initrd_source: get("PXE_INITRD_SOURCE").map(|v| resolve_path(base_dir, v)),
            signing_keys,
            xz_block_size: get("PXE_XZ_BLOCK_SIZE").map(str::to_string),
        })
    }

    /// Apply command line flags on top of the loaded values.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(name) = overrides.name {
            self.image_name = Some(name);
        }
        if let Some(version) = overrides.version {
            self.image_version = version;
        }
        if let Some(arch) = overrides.arch {
            self.arch = arch;
        }
        if let Some(root_dir) = overrides.root_dir {
            self.root_dir = root_dir;
        }
        if let Some(target_dir) = overrides.target_dir {
            self.target_dir = target_dir;
        }
        if overrides.compressed {
            self.compressed = true;
        }
        if let Some(filesystem) = overrides.filesystem {
            self.filesystem = filesystem;
        }
        if let Some(initrd_source) = overrides.initrd_source {
            self.initrd_source = Some(initrd_source);
        }
        self.signing_keys.extend(overrides.signing_keys);
    }

    /// The pipeline configuration. Fails without an image name.
    pub fn to_pxe_config(&self) -> Result<PxeConfig> {
        let Some(name) = &self.image_name else {
            bail!("No image name configured. Set PXE_IMAGE_NAME or pass --name.");
        };

        let mut config = PxeConfig::new(
            name.as_str(),
            self.image_version.as_str(),
            self.arch.as_str(),
            &self.root_dir,
            &self.target_dir,
        );
        config.compressed = self.compressed;
        config.signing_keys = self.signing_keys.clone();
        config.xz_block_size = self.xz_block_size.clone();
        Ok(config)
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!(
            "  PXE_IMAGE_NAME:    {}",
            self.image_name.as_deref().unwrap_or("(not set)")
        );
        println!("  PXE_IMAGE_VERSION: {}", self.image_version);
        println!("  PXE_ARCH:          {}", self.arch);
        println!("  PXE_ROOT_DIR:      {}", self.root_dir.display());
        println!("  PXE_TARGET_DIR:    {}", self.target_dir.display());
        println!("  PXE_WORK_DIR:      {}", self.work_dir.display());
        println!("  PXE_COMPRESSED:    {}", self.compressed);
        println!("  PXE_FILESYSTEM:    {}", self.filesystem);
        match &self.initrd_source {
            Some(source) => println!("  PXE_INITRD_SOURCE: {}", source.display()),
            None => println!("  PXE_INITRD_SOURCE: (not set, no boot image)"),
        }
        for key in &self.signing_keys {
            println!("  signing key:       {}", key.display());
        }
        if let Some(block_size) = &self.xz_block_size {
            println!("  PXE_XZ_BLOCK_SIZE: {}", block_size);
        }
        if self.root_dir.join("boot").is_dir() {
            println!("  Root tree: FOUND");
        } else {
            println!("  Root tree: NOT FOUND (no boot/ in PXE_ROOT_DIR)");
        }
    }
}

fn resolve_path(base_dir: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("Invalid boolean '{}', expected true or false", other),
    }
}
