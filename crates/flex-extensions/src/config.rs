//! Manager configuration from `flex.toml`.
//!
//! ```toml
//! extensions_dir = "extensions"
//! cache_dir = "cache"
//! archive_extension = "flex"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Canonical configuration filename inside a data root.
pub const CONFIG_FILENAME: &str = "flex.toml";

fn default_extensions_dir() -> PathBuf {
    PathBuf::from("extensions")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_archive_extension() -> String {
    "flex".to_string()
}

/// Where archives live and where working directories are extracted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ManagerConfig {
    /// Directory scanned for package archives (the source of truth).
    #[serde(default = "default_extensions_dir")]
    pub extensions_dir: PathBuf,
    /// Cache root holding working directories (derived state).
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// File extension of package archives, without the dot.
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            extensions_dir: default_extensions_dir(),
            cache_dir: default_cache_dir(),
            archive_extension: default_archive_extension(),
        }
    }
}

impl ManagerConfig {
    /// Standard layout under a data root: `<root>/extensions` and
    /// `<root>/cache`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            extensions_dir: root.join(default_extensions_dir()),
            cache_dir: root.join(default_cache_dir()),
            archive_extension: default_archive_extension(),
        }
    }

    /// The per-user data root, e.g. `~/.local/share/flex` on Linux.
    pub fn default_root() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("flex"))
    }

    /// Parse a configuration from TOML. Paths are kept as written.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.archive_extension.is_empty() || config.archive_extension.starts_with('.') {
            return Err(Error::Config(format!(
                "archive_extension must be a bare extension such as \"flex\", got {:?}",
                config.archive_extension
            )));
        }
        Ok(config)
    }

    /// Read a configuration file, resolving relative paths against its
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut config = Self::from_toml(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        if config.extensions_dir.is_relative() {
            config.extensions_dir = base.join(&config.extensions_dir);
        }
        if config.cache_dir.is_relative() {
            config.cache_dir = base.join(&config.cache_dir);
        }
        Ok(config)
    }

    /// Whether `path` names a package archive by its file extension.
    pub fn is_archive(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(self.archive_extension.as_str()))
    }
}
