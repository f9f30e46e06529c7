//! `flex load`: a dry run of the load path for one extension.

use colored::Colorize;
use flex_extensions::{LoadedResources, ManagerConfig};

use super::open_manager;
use crate::error::Result;

/// Handle `flex load <id>`
///
/// Loads `id` and its dependencies, prints what each after-load hook
/// opened, then shuts the manager down again. A hook failure leaves nothing
/// open and is reported as the command's error.
pub fn run_load(config: ManagerConfig, id: &str) -> Result<()> {
    let (manager, _) = open_manager(config)?;
    let order = manager.load(id)?;

    println!(
        "{} Loaded {} extension(s): {}",
        "=>".blue().bold(),
        order.len(),
        order.join(" -> ").cyan()
    );
    for loaded in &order {
        let summary = manager.with_resources(loaded, describe)??;
        println!("   {:<32} {}", loaded.green(), summary);
    }

    let unloaded = manager.shutdown();
    println!(
        "{} Unloaded {}",
        "=>".blue().bold(),
        unloaded.join(", ").dimmed()
    );
    Ok(())
}

fn describe(resources: &LoadedResources) -> flex_extensions::Result<String> {
    Ok(match resources {
        LoadedResources::LanguagePack(store) => {
            let mut tables = Vec::new();
            for (component, table) in store.tables() {
                let rows = store.entry_count(component)?.unwrap_or_default();
                tables.push(format!("{table} ({rows} entries)"));
            }
            format!("database {}: {}", store.path().display(), tables.join(", "))
        }
        LoadedResources::Theme(sheets) => format!("{} stylesheet(s)", sheets.len()),
        LoadedResources::Layout(arrangements) => {
            format!("{} arrangement(s)", arrangements.len())
        }
    })
}
