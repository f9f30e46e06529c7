//! The extension manager: install, load, unload and uninstall.
//!
//! Per extension id the published states move
//! `Installed -> Loaded -> Installed -> (gone)`, with `Failed` reachable
//! from a failed load. Intermediate states are never visible to readers:
//! each transition is published in one registry write section after its
//! filesystem or hook side effects completed.
//!
//! Locking, outermost first:
//!
//! 1. `store_gate`: shared by install/uninstall, exclusive for sweep, so a
//!    sweep never removes a tree that is being staged.
//! 2. Per-id locks: every mutating call holds all ids it may touch.
//! 3. `registry`: short read/write sections, never held across I/O.
//! 4. `resources`: the open resources of loaded extensions.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use flex_fs::ArchiveStore;
use flex_fs::checksum::compute_file_checksum;

use crate::config::ManagerConfig;
use crate::dependency::{loaded_dependents_closure, resolve_load_order, resolve_unload_order};
use crate::error::{Error, Result};
use crate::extension::{ComponentName, Extension};
use crate::lifecycle::{BuiltinHooks, LifecycleHooks, LoadedResources};
use crate::locale::LocaleTag;
use crate::lock::{IdLockGuard, IdLocks};
use crate::manifest;
use crate::registry::{ExtensionRegistry, ExtensionState, RegistryEntry};

/// Outcome of [`ExtensionManager::discover_and_sweep`].
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Ids installed by this call, in archive file-name order.
    pub installed: Vec<String>,
    /// Archives that could not be installed.
    pub failed: Vec<DiscoveryFailure>,
    /// Orphaned cache directories that were removed.
    pub swept: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct DiscoveryFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Owns the registry, the cache root and the open resources of loaded
/// extensions.
///
/// All operations take `&self`; share the manager between threads with an
/// `Arc`. Dropping the manager closes resources without running
/// before-unload hooks; call [`shutdown`](Self::shutdown) first for an
/// orderly teardown.
pub struct ExtensionManager {
    config: ManagerConfig,
    store: ArchiveStore,
    registry: RwLock<ExtensionRegistry>,
    resources: Mutex<HashMap<String, LoadedResources>>,
    hooks: Arc<dyn LifecycleHooks>,
    locks: IdLocks,
    store_gate: RwLock<()>,
}

impl std::fmt::Debug for ExtensionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionManager")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl ExtensionManager {
    /// Open a manager with the built-in hooks.
    ///
    /// # Errors
    ///
    /// [`Error::LockFailed`] if another manager already owns the cache root.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        Self::with_hooks(config, Arc::new(BuiltinHooks))
    }

    /// Open a manager that calls `hooks` on every load and unload.
    pub fn with_hooks(config: ManagerConfig, hooks: Arc<dyn LifecycleHooks>) -> Result<Self> {
        let store = ArchiveStore::open(&config.cache_dir)?;
        tracing::debug!(
            "Extension manager ready (extensions: {:?}, cache: {:?})",
            config.extensions_dir,
            store.root()
        );
        Ok(Self {
            config,
            store,
            registry: RwLock::new(ExtensionRegistry::new()),
            resources: Mutex::new(HashMap::new()),
            hooks,
            locks: IdLocks::new(),
            store_gate: RwLock::new(()),
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Canonical cache root.
    pub fn cache_root(&self) -> &Path {
        self.store.root()
    }

    /// Install an archive: checksum, stage, parse, claim, register.
    ///
    /// Returns the extension id. On any failure nothing is registered and no
    /// working directory is left behind for this archive.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`], [`Error::CorruptArchive`], [`Error::UnsafeArchiveEntry`]
    ///   while staging
    /// - [`Error::ManifestNotFound`], [`Error::MalformedManifest`],
    ///   [`Error::UnsupportedExtensionType`] while parsing
    /// - [`Error::DuplicateId`] if the id is already installed
    /// - [`Error::WorkingDirOccupied`] if an unswept directory holds the id
    pub fn install(&self, archive_path: &Path) -> Result<String> {
        let _gate = self.gate_read();

        let checksum = compute_file_checksum(archive_path)?;
        let staged = self.store.stage(archive_path)?;
        let mut extension = manifest::read_manifest(staged.path())?;
        let id = extension.id().to_string();

        let _ids = self.locks.acquire([id.as_str()]);
        if self.read_registry().contains(&id) {
            return Err(Error::DuplicateId { id });
        }

        let working_dir = self.store.claim(staged, &id)?;
        extension.archive_path = Some(archive_path.to_path_buf());
        extension.working_dir = Some(working_dir.clone());

        let registered = {
            let mut registry = self.write_registry();
            registry.register(extension).map(|entry| {
                entry.state = ExtensionState::Installed;
                entry.checksum = Some(checksum);
            })
        };
        if let Err(e) = registered {
            self.unstage_best_effort(&working_dir);
            return Err(e);
        }

        tracing::info!("Installed {} from {:?}", id, archive_path);
        Ok(id)
    }

    /// Load an extension and every dependency that is not loaded yet.
    ///
    /// Returns the ids loaded by this call, dependencies first. Loading an
    /// extension that is already loaded returns an empty list.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownExtension`], [`Error::MissingDependency`] or
    ///   [`Error::CyclicDependency`] before any hook runs
    /// - [`Error::LoadFailed`] if an after-load hook fails; hooks opened by
    ///   this call are closed again in reverse order and the failing id is
    ///   marked [`ExtensionState::Failed`]
    pub fn load(&self, id: &str) -> Result<Vec<String>> {
        let (_ids, order) = self.lock_plan(|registry| {
            let order = resolve_load_order(id, registry)?;
            Ok((order.iter().cloned().collect(), order))
        })?;

        let pending: Vec<Arc<Extension>> = {
            let registry = self.read_registry();
            order
                .iter()
                .filter_map(|dep| registry.entry(dep))
                .filter(|entry| !entry.state.is_loaded())
                .map(|entry| Arc::clone(&entry.extension))
                .collect()
        };

        let mut opened: Vec<(Arc<Extension>, LoadedResources)> = Vec::with_capacity(pending.len());
        for extension in &pending {
            match self.hooks.after_load(extension) {
                Ok(resources) => opened.push((Arc::clone(extension), resources)),
                Err(cause) => {
                    for (done, resources) in opened.into_iter().rev() {
                        self.hooks.before_unload(&done, resources);
                    }
                    let failed_id = extension.id().to_string();
                    tracing::warn!("Failed to load {}: {}", failed_id, cause);
                    if let Err(e) = self.write_registry().set_state(
                        &failed_id,
                        ExtensionState::Failed {
                            reason: cause.to_string(),
                        },
                    ) {
                        tracing::warn!("Cannot record failure of {}: {}", failed_id, e);
                    }
                    return Err(Error::LoadFailed {
                        id: failed_id,
                        cause: Box::new(cause),
                    });
                }
            }
        }

        let loaded: Vec<String> = opened.iter().map(|(ext, _)| ext.id().to_string()).collect();
        {
            let mut registry = self.write_registry();
            let mut resources = self.lock_resources();
            for (extension, opened_resources) in opened {
                let loaded_id = extension.id();
                resources.insert(loaded_id.to_string(), opened_resources);
                if let Some(entry) = registry.entry_mut(loaded_id) {
                    entry.state = ExtensionState::Loaded;
                }
            }
            if let Some(entry) = registry.entry_mut(id) {
                entry.explicitly_loaded = true;
            }
        }

        if !loaded.is_empty() {
            tracing::info!("Loaded {}", loaded.join(", "));
        }
        Ok(loaded)
    }

    /// Unload an extension.
    ///
    /// Loaded transitive dependents go first, then `id`, then the
    /// dependencies of `id` that were only loaded to satisfy it and that no
    /// remaining loaded extension needs. Unloading an extension that is not
    /// loaded is a no-op. Returns the ids unloaded, in order.
    pub fn unload(&self, id: &str) -> Result<Vec<String>> {
        let (_ids, plan) = self.lock_plan(|registry| {
            let plan = unload_plan(id, registry)?;
            Ok((plan.iter().cloned().collect(), plan))
        })?;

        for unload_id in &plan {
            let extension = match self.read_registry().entry(unload_id) {
                Some(entry) => Arc::clone(&entry.extension),
                None => continue,
            };
            let resources = self.lock_resources().remove(unload_id);
            if let Some(resources) = resources {
                self.hooks.before_unload(&extension, resources);
            }

            let mut registry = self.write_registry();
            if let Some(entry) = registry.entry_mut(unload_id) {
                entry.state = ExtensionState::Installed;
                entry.explicitly_loaded = false;
            }
        }

        if !plan.is_empty() {
            tracing::info!("Unloaded {}", plan.join(", "));
        }
        Ok(plan)
    }

    /// Remove an installed extension and its working directory.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownExtension`] if the id is not registered
    /// - [`Error::StillLoaded`] if it is loaded
    /// - [`Error::HasDependents`] if registered extensions depend on it
    pub fn uninstall(&self, id: &str) -> Result<()> {
        let _gate = self.gate_read();
        let _ids = self.locks.acquire([id]);

        let extension = {
            let mut registry = self.write_registry();
            let entry = registry
                .entry(id)
                .ok_or_else(|| Error::UnknownExtension(id.to_string()))?;
            if entry.state.is_loaded() {
                return Err(Error::StillLoaded { id: id.to_string() });
            }
            registry.unregister(id)?
        };

        if let Some(working_dir) = &extension.working_dir {
            self.unstage_best_effort(working_dir);
        }
        tracing::info!("Uninstalled {}", id);
        Ok(())
    }

    /// Snapshot of one registry entry.
    pub fn query(&self, id: &str) -> Option<RegistryEntry> {
        self.read_registry().entry(id).cloned()
    }

    /// Snapshots of every entry matching `predicate`, in registration order.
    pub fn query_all(&self, predicate: impl Fn(&RegistryEntry) -> bool) -> Vec<RegistryEntry> {
        self.read_registry()
            .entries()
            .filter(|entry| predicate(entry))
            .cloned()
            .collect()
    }

    pub fn state(&self, id: &str) -> Option<ExtensionState> {
        self.read_registry().state(id).cloned()
    }

    /// Language pack components available for a locale.
    pub fn language_packs_for_locale(&self, query: &LocaleTag) -> Vec<ComponentName> {
        self.read_registry().language_packs_for_locale(query)
    }

    /// Run `f` against the open resources of a loaded extension.
    ///
    /// The resources stay locked for the duration of `f`; keep it short.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownExtension`] if the id is not registered
    /// - [`Error::NotLoaded`] if it has no open resources
    pub fn with_resources<R>(&self, id: &str, f: impl FnOnce(&LoadedResources) -> R) -> Result<R> {
        {
            let resources = self.lock_resources();
            if let Some(loaded) = resources.get(id) {
                return Ok(f(loaded));
            }
        }
        if self.read_registry().contains(id) {
            Err(Error::NotLoaded { id: id.to_string() })
        } else {
            Err(Error::UnknownExtension(id.to_string()))
        }
    }

    /// Remove every cache directory that no registered extension claims.
    pub fn sweep(&self) -> Vec<PathBuf> {
        let _gate = self.gate_write();
        let claimed: Vec<PathBuf> = self
            .read_registry()
            .entries()
            .filter_map(|entry| entry.extension.working_dir.clone())
            .collect();
        let swept = self.store.sweep(&claimed);
        if !swept.is_empty() {
            tracing::info!("Swept {} orphaned working directories", swept.len());
        }
        swept
    }

    /// Startup scan: sweep the cache root, then install every archive in the
    /// extensions directory that is not installed yet, in file-name order.
    ///
    /// Per-archive failures are logged and reported, never fatal. A missing
    /// extensions directory counts as empty.
    pub fn discover_and_sweep(&self) -> Result<DiscoveryReport> {
        let mut report = DiscoveryReport {
            swept: self.sweep(),
            ..DiscoveryReport::default()
        };

        for path in self.archives()? {
            let known = self
                .read_registry()
                .entries()
                .any(|entry| entry.extension.archive_path.as_deref() == Some(path.as_path()));
            if known {
                tracing::debug!("Skipping already installed archive {:?}", path);
                continue;
            }

            match self.install(&path) {
                Ok(id) => report.installed.push(id),
                Err(error) => {
                    tracing::warn!("Skipping archive {:?}: {}", path, error);
                    report.failed.push(DiscoveryFailure { path, error });
                }
            }
        }
        Ok(report)
    }

    /// Unload everything, dependents before their dependencies.
    ///
    /// Returns the ids unloaded, in order.
    pub fn shutdown(&self) -> Vec<String> {
        let loaded: Vec<String> = self
            .read_registry()
            .entries()
            .filter(|entry| entry.state.is_loaded())
            .map(|entry| entry.id().to_string())
            .collect();

        let mut unloaded = Vec::new();
        for id in loaded {
            match self.unload(&id) {
                Ok(ids) => unloaded.extend(ids),
                Err(e) => tracing::warn!("Failed to unload {} during shutdown: {}", id, e),
            }
        }
        unloaded
    }

    /// Archive files in the extensions directory, sorted by file name.
    fn archives(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.config.extensions_dir;
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Extensions directory {:?} does not exist", dir);
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::io(dir, e)),
        };

        let mut archives = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(dir, e))?;
            let path = entry.path();
            if path.is_file() && self.config.is_archive(&path) {
                archives.push(path);
            }
        }
        archives.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(archives)
    }

    /// Acquire the id locks a plan needs, recomputing the plan once the
    /// locks are held. If the plan grew in the meantime, release and retry
    /// with the larger set.
    fn lock_plan<T>(
        &self,
        plan: impl Fn(&ExtensionRegistry) -> Result<(BTreeSet<String>, T)>,
    ) -> Result<(IdLockGuard<'_>, T)> {
        let (mut ids, _) = plan(&*self.read_registry())?;
        loop {
            let guard = self.locks.acquire(ids.iter().cloned());
            let (current, value) = plan(&*self.read_registry())?;
            if guard.covers(&current) {
                return Ok((guard, value));
            }
            tracing::debug!("Lock set changed to {:?}; retrying", current);
            drop(guard);
            ids.extend(current);
        }
    }

    fn unstage_best_effort(&self, working_dir: &Path) {
        if let Err(e) = self.store.unstage(working_dir) {
            tracing::warn!("Failed to remove working directory {:?}: {}", working_dir, e);
        }
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, ExtensionRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, ExtensionRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_resources(&self) -> MutexGuard<'_, HashMap<String, LoadedResources>> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gate_read(&self) -> RwLockReadGuard<'_, ()> {
        self.store_gate.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn gate_write(&self) -> RwLockWriteGuard<'_, ()> {
        self.store_gate.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ids to unload for `id`, in order: loaded dependents, `id`, then
/// dependencies nobody else needs any more.
fn unload_plan(id: &str, registry: &ExtensionRegistry) -> Result<Vec<String>> {
    let entry = registry
        .entry(id)
        .ok_or_else(|| Error::UnknownExtension(id.to_string()))?;
    if !entry.state.is_loaded() {
        return Ok(Vec::new());
    }

    let mut plan = loaded_dependents_closure(id, registry);
    plan.push(id.to_string());

    for dependency in resolve_unload_order(id, registry)?.into_iter().skip(1) {
        let Some(dep) = registry.entry(&dependency) else {
            continue;
        };
        if !dep.state.is_loaded() || dep.explicitly_loaded || plan.contains(&dependency) {
            continue;
        }
        let still_needed = dep.dependents.iter().any(|dependent| {
            !plan.contains(dependent)
                && registry
                    .state(dependent)
                    .is_some_and(ExtensionState::is_loaded)
        });
        if !still_needed {
            plan.push(dependency);
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flex_test_utils::{TestWorkspace, manifest as fixtures};
    use pretty_assertions::assert_eq;

    fn manager(ws: &TestWorkspace) -> ExtensionManager {
        ExtensionManager::new(ManagerConfig::with_root(ws.root())).unwrap()
    }

    #[test]
    fn test_unload_plan_keeps_shared_dependency() {
        let ws = TestWorkspace::new();
        let manager = manager(&ws);
        for (file, id, deps) in [
            ("1.flex", "base", &[][..]),
            ("2.flex", "left", &["base"][..]),
            ("3.flex", "right", &["base"][..]),
        ] {
            let archive = ws.add_archive(file, &fixtures::theme_archive(id, deps));
            manager.install(&archive).unwrap();
        }
        manager.load("left").unwrap();
        manager.load("right").unwrap();

        let registry = manager.read_registry();
        assert_eq!(unload_plan("left", &registry).unwrap(), vec!["left"]);
        assert_eq!(unload_plan("base", &registry).unwrap(), vec!["left", "right", "base"]);
    }

    #[test]
    fn test_unload_plan_for_unloaded_is_empty() {
        let ws = TestWorkspace::new();
        let manager = manager(&ws);
        let archive = ws.add_archive("a.flex", &fixtures::theme_archive("a", &[]));
        manager.install(&archive).unwrap();

        assert!(unload_plan("a", &manager.read_registry()).unwrap().is_empty());
        assert!(matches!(
            unload_plan("ghost", &manager.read_registry()),
            Err(Error::UnknownExtension(_))
        ));
    }
}
