//! `flex list`: show what the extensions directory installs to.

use colored::Colorize;
use flex_extensions::{ExtensionComponent, ExtensionState, ManagerConfig, RegistryEntry};

use super::open_manager;
use crate::error::Result;

/// Handle `flex list [--json]`
pub fn run_list(config: ManagerConfig, json: bool) -> Result<()> {
    let (manager, _) = open_manager(config)?;
    let entries = manager.query_all(|_| true);

    if json {
        let rows: Vec<serde_json::Value> = entries.iter().map(entry_json).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{} No extensions installed.", "=>".blue().bold());
        return Ok(());
    }

    println!("{} {} extensions installed:", "=>".blue().bold(), entries.len());
    for entry in &entries {
        let meta = &entry.extension.meta;
        println!(
            "   {:<32} {:<10} {:<28} {}",
            meta.id.cyan(),
            meta.version.to_string(),
            entry.extension.serial_type().to_string().dimmed(),
            state_label(&entry.state)
        );
        if !entry.dependencies.is_empty() {
            let deps: Vec<&str> = entry.dependencies.iter().map(String::as_str).collect();
            println!("     {} {}", "depends on".dimmed(), deps.join(", "));
        }
    }
    Ok(())
}

fn state_label(state: &ExtensionState) -> colored::ColoredString {
    match state {
        ExtensionState::Loaded => state.to_string().green(),
        ExtensionState::Failed { .. } => state.to_string().red(),
        _ => state.to_string().normal(),
    }
}

fn entry_json(entry: &RegistryEntry) -> serde_json::Value {
    let extension = &entry.extension;
    serde_json::json!({
        "id": extension.id(),
        "label": extension.meta.label,
        "version": extension.meta.version.to_string(),
        "serialType": extension.serial_type().as_str(),
        "state": entry.state.to_string(),
        "dependencies": entry.dependencies,
        "dependents": entry.dependents,
        "components": extension
            .components()
            .iter()
            .map(|c| c.id().to_string())
            .collect::<Vec<_>>(),
        "archive": extension.archive_path,
        "checksum": entry.checksum,
    })
}
