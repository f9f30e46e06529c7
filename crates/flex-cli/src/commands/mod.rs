//! Command implementations for flex-cli

pub mod inspect;
pub mod install;
pub mod list;
pub mod load;
pub mod sweep;

pub use inspect::run_inspect;
pub use install::{run_install, run_uninstall};
pub use list::run_list;
pub use load::run_load;
pub use sweep::run_sweep;

use colored::Colorize;
use flex_extensions::{DiscoveryReport, ExtensionManager, ManagerConfig};

use crate::error::Result;

/// Open the cache root and rebuild the registry from the extensions
/// directory. Archives that fail to install are reported on stderr.
pub(crate) fn open_manager(config: ManagerConfig) -> Result<(ExtensionManager, DiscoveryReport)> {
    let manager = ExtensionManager::new(config)?;
    let report = manager.discover_and_sweep()?;
    for failure in &report.failed {
        eprintln!(
            "{} skipped {}: {}",
            "warning:".yellow().bold(),
            failure.path.display(),
            failure.error
        );
    }
    Ok((manager, report))
}
