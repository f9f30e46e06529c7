//! `flex sweep`: clean up after a crash.

use colored::Colorize;
use flex_extensions::ManagerConfig;

use super::open_manager;
use crate::error::Result;

/// Handle `flex sweep`
///
/// Sweeping needs the registry, so this runs a full discovery and reports
/// both what was removed and what got (re)installed.
pub fn run_sweep(config: ManagerConfig) -> Result<()> {
    let (_, report) = open_manager(config)?;

    if report.swept.is_empty() {
        println!("{} Cache is clean.", "=>".blue().bold());
    } else {
        println!(
            "{} Removed {} orphaned working directories:",
            "=>".blue().bold(),
            report.swept.len()
        );
        for path in &report.swept {
            println!("   {}", path.display().to_string().dimmed());
        }
    }
    if !report.installed.is_empty() {
        println!(
            "{} Installed {}",
            "=>".blue().bold(),
            report.installed.join(", ").cyan()
        );
    }
    Ok(())
}
