//! In-memory registry of installed extensions.
//!
//! Entries keep registration order, which the dependency resolver uses to
//! break ties between independent siblings. Dependency edges are recorded in
//! both directions so uninstall can refuse while dependents remain.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::extension::{ComponentName, Extension, ExtensionComponent, ExtensionKind};
use crate::locale::LocaleTag;

/// Published lifecycle state of a registered extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionState {
    /// Manifest read, working directory not claimed.
    Discovered,
    /// Working directory claimed, no resources open.
    Installed,
    /// After-load hook ran; resources are open.
    Loaded,
    /// The last transition attempt failed.
    Failed { reason: String },
}

impl ExtensionState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}

impl std::fmt::Display for ExtensionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovered => write!(f, "discovered"),
            Self::Installed => write!(f, "installed"),
            Self::Loaded => write!(f, "loaded"),
            Self::Failed { reason } => write!(f, "failed ({reason})"),
        }
    }
}

/// A registered extension with its state and dependency edges.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub extension: Arc<Extension>,
    pub state: ExtensionState,
    /// Registered extensions that declare a dependency on this one.
    pub dependents: BTreeSet<String>,
    /// Ids this extension declares as dependencies (registered or not).
    pub dependencies: BTreeSet<String>,
    /// `sha256:<hex>` of the archive this entry was installed from.
    pub checksum: Option<String>,
    /// Whether a caller asked for this extension, as opposed to it being
    /// pulled in as a dependency.
    pub(crate) explicitly_loaded: bool,
}

impl RegistryEntry {
    pub fn id(&self) -> &str {
        self.extension.id()
    }

    pub fn is_explicitly_loaded(&self) -> bool {
        self.explicitly_loaded
    }
}

/// Registry of installed extensions, keyed by id in registration order.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    entries: IndexMap<String, RegistryEntry>,
}

impl ExtensionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension in [`ExtensionState::Discovered`].
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateId`] if the id is already registered.
    pub fn register(&mut self, extension: Extension) -> Result<&mut RegistryEntry> {
        let id = extension.id().to_string();
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateId { id });
        }

        let dependencies: BTreeSet<String> = extension.meta.dependencies.iter().cloned().collect();
        let dependents: BTreeSet<String> = self
            .entries
            .values()
            .filter(|entry| entry.dependencies.contains(&id))
            .map(|entry| entry.id().to_string())
            .collect();
        for dependency in &dependencies {
            if let Some(entry) = self.entries.get_mut(dependency) {
                entry.dependents.insert(id.clone());
            }
        }

        tracing::debug!("Registered extension {}", id);
        let entry = self.entries.entry(id).or_insert(RegistryEntry {
            extension: Arc::new(extension),
            state: ExtensionState::Discovered,
            dependents,
            dependencies,
            checksum: None,
            explicitly_loaded: false,
        });
        Ok(entry)
    }

    /// Remove an extension and its edges.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownExtension`] if the id is not registered
    /// - [`Error::HasDependents`] if registered extensions depend on it
    pub fn unregister(&mut self, id: &str) -> Result<Arc<Extension>> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| Error::UnknownExtension(id.to_string()))?;
        if !entry.dependents.is_empty() {
            return Err(Error::HasDependents {
                id: id.to_string(),
                dependents: entry.dependents.iter().cloned().collect(),
            });
        }

        let entry = match self.entries.shift_remove(id) {
            Some(entry) => entry,
            None => return Err(Error::UnknownExtension(id.to_string())),
        };
        for dependency in &entry.dependencies {
            if let Some(dep) = self.entries.get_mut(dependency) {
                dep.dependents.remove(id);
            }
        }
        tracing::debug!("Unregistered extension {}", id);
        Ok(entry.extension)
    }

    /// Look up an extension by id.
    pub fn get(&self, id: &str) -> Option<&Extension> {
        self.entries.get(id).map(|entry| entry.extension.as_ref())
    }

    pub fn entry(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    pub(crate) fn entry_mut(&mut self, id: &str) -> Option<&mut RegistryEntry> {
        self.entries.get_mut(id)
    }

    /// All extensions in registration order.
    pub fn all(&self) -> Vec<&Extension> {
        self.entries.values().map(|entry| entry.extension.as_ref()).collect()
    }

    /// All entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Registration index of an id, used for deterministic ordering.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.get_index_of(id)
    }

    /// Check if an extension is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self, id: &str) -> Option<&ExtensionState> {
        self.entries.get(id).map(|entry| &entry.state)
    }

    pub fn set_state(&mut self, id: &str, state: ExtensionState) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::UnknownExtension(id.to_string()))?;
        tracing::trace!("{}: {} -> {}", id, entry.state, state);
        entry.state = state;
        Ok(())
    }

    /// Resolve a component across all registered extensions.
    pub fn component(&self, name: &ComponentName) -> Option<&dyn ExtensionComponent> {
        self.get(&name.extension_id)?.component(&name.component_id)
    }

    /// Language pack components whose locale satisfies `query`, in
    /// registration order.
    pub fn language_packs_for_locale(&self, query: &LocaleTag) -> Vec<ComponentName> {
        self.entries
            .values()
            .filter_map(|entry| match &entry.extension.kind {
                ExtensionKind::LanguagePack(pack) => Some(pack),
                _ => None,
            })
            .flat_map(|pack| pack.components())
            .filter(|component| {
                component
                    .locale_tag()
                    .is_ok_and(|locale| locale.matches(query))
            })
            .map(|component| component.name())
            .collect()
    }
}
