//! `flex inspect`: read a package manifest without installing anything.

use std::path::Path;

use colored::Colorize;
use flex_extensions::{Extension, ExtensionComponent, MANIFEST_FILENAME, manifest};

use crate::error::{CliError, Result};

/// Handle `flex inspect <archive> [--json]`
///
/// Only the manifest entry is read, so this works without a data root and
/// alongside a running manager. `--json` prints the normalized manifest.
pub fn run_inspect(archive: &Path, json: bool) -> Result<()> {
    if !archive.is_file() {
        return Err(CliError::user(format!(
            "Archive '{}' does not exist",
            archive.display()
        )));
    }

    let bytes = flex_fs::read_entry(archive, MANIFEST_FILENAME)?.ok_or_else(|| {
        CliError::user(format!(
            "No {} found in '{}'",
            MANIFEST_FILENAME,
            archive.display()
        ))
    })?;
    let extension = manifest::parse(&bytes)?;

    if json {
        let normalized = manifest::serialize(&extension)?;
        println!("{}", String::from_utf8_lossy(&normalized));
    } else {
        print_extension(&extension);
    }
    Ok(())
}

fn print_extension(extension: &Extension) {
    let meta = &extension.meta;
    println!(
        "{} {} v{} ({})",
        "=>".blue().bold(),
        meta.id.cyan(),
        meta.version,
        extension.serial_type().to_string().dimmed()
    );
    println!("   {} {}", "Label:".dimmed(), meta.label);
    if !meta.authors.is_empty() {
        println!("   {} {}", "Authors:".dimmed(), meta.authors.join(", "));
    }
    if let Some(license) = &meta.license {
        println!("   {} {}", "License:".dimmed(), license);
    }
    if !meta.dependencies.is_empty() {
        println!(
            "   {} {}",
            "Depends on:".dimmed(),
            meta.dependencies.join(", ").yellow()
        );
    }

    let components = extension.components();
    println!("   {} {}", "Components:".dimmed(), components.len());
    for component in components {
        println!("     {:<24} {}", component.id().green(), component.label());
    }
}
