//! pxe-builder - PXE network boot bundle builder.
//!
//! Turns a prepared root tree into a network-bootable bundle:
//! - root filesystem image (squashfs, EROFS or ext4)
//! - kernel and Xen hypervisor copies
//! - optional initrd with imported signing keys
//! - tar / tar.xz bundle, package metadata and checksum

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pxe_builder::artifact::FileSystemType;
use pxe_builder::commands;
use pxe_builder::config::{Config, Overrides};

#[derive(Parser)]
#[command(name = "pxe-builder")]
#[command(about = "PXE network boot bundle builder")]
#[command(
    after_help = "QUICK START:\n  pxe-builder preflight            Check host tools and inputs\n  pxe-builder build --name myimage Build the bundle\n  pxe-builder show kernel          Show the kernel a build would use"
)]
struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the PXE bundle from the root tree
    Build {
        /// Root tree to build from (default: PXE_ROOT_DIR)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Output directory (default: PXE_TARGET_DIR)
        #[arg(long)]
        target: Option<PathBuf>,
        /// Appliance name (default: PXE_IMAGE_NAME)
        #[arg(long)]
        name: Option<String>,
        /// Appliance version (default: PXE_IMAGE_VERSION)
        #[arg(long)]
        version: Option<String>,
        /// Target architecture (default: PXE_ARCH or host)
        #[arg(long)]
        arch: Option<String>,
        /// xz the image separately and bundle it in a plain tar
        #[arg(long)]
        compressed: bool,
        /// Root filesystem format: squashfs, erofs or ext4
        #[arg(long)]
        filesystem: Option<FileSystemType>,
        /// Initrd source tree; enables the boot image
        #[arg(long)]
        initrd_source: Option<PathBuf>,
        /// Signing key to import into the boot image (repeatable)
        #[arg(long = "signing-key")]
        signing_keys: Vec<PathBuf>,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },

    /// Run preflight checks (verify host tools and inputs before build)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// Show the kernel and hypervisor found in the root tree
    Kernel {
        /// Root tree to inspect (default: PXE_ROOT_DIR)
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("pxe_builder=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pxe_builder=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let base_dir = std::env::current_dir()?;
    let mut config = Config::load(&base_dir)?;

    match cli.command {
        Commands::Build {
            root,
            target,
            name,
            version,
            arch,
            compressed,
            filesystem,
            initrd_source,
            signing_keys,
        } => {
            config.apply(Overrides {
                name,
                version,
                arch,
                root_dir: root,
                target_dir: target,
                compressed,
                filesystem,
                initrd_source,
                signing_keys,
            });
            commands::cmd_build(&config)?;
        }

        Commands::Show { what } => {
            let show_target = match &what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Kernel { root } => commands::show::ShowTarget::Kernel {
                    root: root.as_deref(),
                },
            };
            commands::cmd_show(show_target, &config)?;
        }

        Commands::Preflight { strict } => {
            commands::cmd_preflight(&config, strict)?;
        }
    }

    Ok(())
}
