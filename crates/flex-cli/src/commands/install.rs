//! `flex install` and `flex uninstall`: manage archives in the extensions
//! directory.

use std::fs;
use std::path::Path;

use colored::Colorize;
use flex_extensions::ManagerConfig;

use super::open_manager;
use crate::error::{CliError, Result};

/// Handle `flex install <archive>`
///
/// Copies the archive into the extensions directory and installs it from
/// there, so the next startup discovers it again. The copy is removed if
/// the install fails.
pub fn run_install(config: ManagerConfig, archive: &Path) -> Result<()> {
    if !archive.is_file() {
        return Err(CliError::user(format!(
            "Archive '{}' does not exist",
            archive.display()
        )));
    }
    if !config.is_archive(archive) {
        return Err(CliError::user(format!(
            "'{}' is not a .{} archive",
            archive.display(),
            config.archive_extension
        )));
    }
    let file_name = archive
        .file_name()
        .ok_or_else(|| CliError::user(format!("'{}' has no file name", archive.display())))?;
    let dest = config.extensions_dir.join(file_name);

    let (manager, _) = open_manager(config)?;
    if dest.exists() {
        return Err(CliError::user(format!(
            "'{}' is already in the extensions directory",
            file_name.to_string_lossy()
        )));
    }

    flex_fs::io::copy_atomic(archive, &dest)?;
    let id = match manager.install(&dest) {
        Ok(id) => id,
        Err(e) => {
            if let Err(remove_err) = fs::remove_file(&dest) {
                tracing::warn!("Failed to remove imported archive {:?}: {}", dest, remove_err);
            }
            return Err(e.into());
        }
    };

    let version = manager
        .query(&id)
        .map(|entry| entry.extension.meta.version.to_string())
        .unwrap_or_default();
    println!(
        "{} Installed '{}' v{}",
        "=>".blue().bold(),
        id.cyan(),
        version
    );
    println!("   {} {}", "Archive:".dimmed(), dest.display());
    Ok(())
}

/// Handle `flex uninstall <id>`
///
/// Refuses while other installed extensions depend on `id`. On success the
/// working directory and the archive are both gone.
pub fn run_uninstall(config: ManagerConfig, id: &str) -> Result<()> {
    let (manager, _) = open_manager(config)?;
    let entry = manager
        .query(id)
        .ok_or_else(|| flex_extensions::Error::UnknownExtension(id.to_string()))?;

    manager.uninstall(id)?;

    if let Some(archive) = &entry.extension.archive_path {
        match fs::remove_file(archive) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(flex_fs::Error::io(archive, e).into()),
        }
    }

    println!("{} Uninstalled '{}'", "=>".blue().bold(), id.cyan());
    Ok(())
}
