//! Load/unload hooks.
//!
//! Each extension kind implements [`ExtensionLifecycle`] with its own
//! resource type (an open database, parsed stylesheets, parsed
//! arrangements). The manager does not call kinds directly: it goes through
//! a [`LifecycleHooks`] object, [`BuiltinHooks`] by default, so hosts and
//! tests can observe or wrap every open and close.

use std::path::Path;

use crate::error::{Error, Result};
use crate::extension::{Extension, ExtensionKind};
use crate::kinds::{LanguagePackStore, LayoutArrangements, ThemeStylesheets};

/// Per-kind capability: open resources after load, close them before unload.
pub trait ExtensionLifecycle {
    type Resources: Into<LoadedResources>;

    /// Open whatever the kind needs from its working directory.
    fn after_load(&self, working_dir: &Path) -> Result<Self::Resources>;

    /// Release resources opened by [`after_load`](Self::after_load).
    /// Closing is best-effort and never fails the unload.
    fn before_unload(&self, resources: Self::Resources);
}

/// Resources held by a loaded extension.
#[derive(Debug)]
pub enum LoadedResources {
    LanguagePack(LanguagePackStore),
    Theme(ThemeStylesheets),
    Layout(LayoutArrangements),
}

impl From<LanguagePackStore> for LoadedResources {
    fn from(store: LanguagePackStore) -> Self {
        Self::LanguagePack(store)
    }
}

impl From<ThemeStylesheets> for LoadedResources {
    fn from(stylesheets: ThemeStylesheets) -> Self {
        Self::Theme(stylesheets)
    }
}

impl From<LayoutArrangements> for LoadedResources {
    fn from(arrangements: LayoutArrangements) -> Self {
        Self::Layout(arrangements)
    }
}

impl LoadedResources {
    pub fn as_language_pack(&self) -> Option<&LanguagePackStore> {
        match self {
            Self::LanguagePack(store) => Some(store),
            _ => None,
        }
    }

    pub fn as_theme(&self) -> Option<&ThemeStylesheets> {
        match self {
            Self::Theme(stylesheets) => Some(stylesheets),
            _ => None,
        }
    }

    pub fn as_layout(&self) -> Option<&LayoutArrangements> {
        match self {
            Self::Layout(arrangements) => Some(arrangements),
            _ => None,
        }
    }
}

impl ExtensionKind {
    pub fn after_load(&self, working_dir: &Path) -> Result<LoadedResources> {
        match self {
            Self::LanguagePack(ext) => ext.after_load(working_dir).map(Into::into),
            Self::Theme(ext) => ext.after_load(working_dir).map(Into::into),
            Self::Layout(ext) => ext.after_load(working_dir).map(Into::into),
        }
    }

    pub fn before_unload(&self, resources: LoadedResources) {
        match (self, resources) {
            (Self::LanguagePack(ext), LoadedResources::LanguagePack(store)) => {
                ext.before_unload(store)
            }
            (Self::Theme(ext), LoadedResources::Theme(stylesheets)) => {
                ext.before_unload(stylesheets)
            }
            (Self::Layout(ext), LoadedResources::Layout(arrangements)) => {
                ext.before_unload(arrangements)
            }
            (kind, other) => {
                tracing::warn!(
                    "Resources {:?} do not belong to a {} extension; dropping them",
                    other,
                    kind.serial_type()
                );
            }
        }
    }
}

/// The hook seam the manager calls through.
pub trait LifecycleHooks: Send + Sync {
    fn after_load(&self, extension: &Extension) -> Result<LoadedResources>;
    fn before_unload(&self, extension: &Extension, resources: LoadedResources);
}

/// Dispatches to the kind's own [`ExtensionLifecycle`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinHooks;

impl LifecycleHooks for BuiltinHooks {
    fn after_load(&self, extension: &Extension) -> Result<LoadedResources> {
        let working_dir = extension
            .working_dir
            .as_deref()
            .ok_or_else(|| Error::Resource {
                path: extension
                    .archive_path
                    .clone()
                    .unwrap_or_default(),
                reason: format!("extension '{}' has no working directory", extension.id()),
            })?;
        tracing::debug!("Running after-load hook for {}", extension.id());
        extension.kind.after_load(working_dir)
    }

    fn before_unload(&self, extension: &Extension, resources: LoadedResources) {
        tracing::debug!("Running before-unload hook for {}", extension.id());
        extension.kind.before_unload(resources);
    }
}
