//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use flex_extensions::{CONFIG_FILENAME, ManagerConfig};

use crate::error::{CliError, Result};

/// flex - Install, inspect and load IME extension packages
#[derive(Parser, Debug)]
#[command(name = "flex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Data root holding `extensions/` and `cache/`
    #[arg(long, global = true, env = "FLEX_ROOT")]
    pub root: Option<PathBuf>,

    /// Configuration file (overrides --root)
    #[arg(long, global = true, env = "FLEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show the manifest of a package archive without installing it
    Inspect {
        /// Path to a package archive
        archive: PathBuf,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List installed extensions
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Import a package archive into the extensions directory and install it
    Install {
        /// Path to a package archive
        archive: PathBuf,
    },

    /// Uninstall an extension and delete its archive
    Uninstall {
        /// Extension id
        id: String,
    },

    /// Load an extension with its dependencies, report what opened, then unload
    ///
    /// Useful for checking that a package's resources are usable.
    Load {
        /// Extension id
        id: String,
    },

    /// Remove orphaned working directories from the cache
    Sweep,
}

impl Cli {
    /// Resolve the manager configuration.
    ///
    /// `--config` wins; otherwise `<root>/flex.toml` is used when present,
    /// falling back to the standard layout under the root. Without a root
    /// the per-user data directory is used.
    pub fn manager_config(&self) -> Result<ManagerConfig> {
        if let Some(path) = &self.config {
            return Ok(ManagerConfig::load(path)?);
        }

        let root = match &self.root {
            Some(root) => root.clone(),
            None => ManagerConfig::default_root().ok_or_else(|| {
                CliError::user("cannot determine a data directory; pass --root")
            })?,
        };

        let config_file = root.join(CONFIG_FILENAME);
        if config_file.is_file() {
            tracing::debug!("Using configuration {:?}", config_file);
            Ok(ManagerConfig::load(&config_file)?)
        } else {
            Ok(ManagerConfig::with_root(&root))
        }
    }
}
