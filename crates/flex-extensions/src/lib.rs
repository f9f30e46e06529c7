//! Extension package lifecycle manager.
//!
//! Extensions are zip archives carrying an `extension.json` manifest plus
//! auxiliary files (a SQLite database, stylesheets, key arrangements). This
//! crate parses manifests, keeps a registry of installed extensions, orders
//! them by their declared dependencies, and drives each kind's load and
//! unload hooks through an [`ExtensionManager`].
//!
//! ```no_run
//! use flex_extensions::{ExtensionManager, ManagerConfig};
//!
//! let manager = ExtensionManager::new(ManagerConfig::with_root("/tmp/flex"))?;
//! let report = manager.discover_and_sweep()?;
//! for id in &report.installed {
//!     manager.load(id)?;
//! }
//! manager.shutdown();
//! # Ok::<(), flex_extensions::Error>(())
//! ```

pub mod config;
pub mod dependency;
pub mod error;
pub mod extension;
pub mod kinds;
pub mod lifecycle;
pub mod locale;
mod lock;
pub mod manager;
pub mod manifest;
pub mod registry;

pub use config::{CONFIG_FILENAME, ManagerConfig};
pub use dependency::{
    DependencyGraph, loaded_dependents_closure, resolve_load_order, resolve_unload_order,
};
pub use error::{Error, Result};
pub use extension::{
    ComponentName, Extension, ExtensionComponent, ExtensionKind, ExtensionMeta, SerialType,
};
pub use kinds::{
    LanguagePackComponent, LanguagePackExtension, LanguagePackStore, LayoutArrangements,
    LayoutComponent, LayoutDirection, LayoutExtension, LayoutType, ThemeComponent,
    ThemeExtension, ThemeStylesheets,
};
pub use lifecycle::{BuiltinHooks, ExtensionLifecycle, LifecycleHooks, LoadedResources};
pub use locale::LocaleTag;
pub use manager::{DiscoveryFailure, DiscoveryReport, ExtensionManager};
pub use manifest::MANIFEST_FILENAME;
pub use registry::{ExtensionRegistry, ExtensionState, RegistryEntry};
