//! Hook dispatch, rollback on hook failure, and resource accounting.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use flex_extensions::{
    BuiltinHooks, Error, Extension, ExtensionManager, ExtensionState, LifecycleHooks,
    LoadedResources, ManagerConfig,
};
use flex_test_utils::{TestWorkspace, manifest};
use pretty_assertions::assert_eq;

/// Wraps the built-in hooks, records every open and close, and fails the
/// after-load hook of selected ids.
#[derive(Default)]
struct RecordingHooks {
    fail_on: Mutex<HashSet<String>>,
    opened: Mutex<Vec<String>>,
    closed: Mutex<Vec<String>>,
}

impl RecordingHooks {
    fn fail(&self, id: &str) {
        self.fail_on.lock().unwrap().insert(id.to_string());
    }

    fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    fn closed(&self) -> Vec<String> {
        self.closed.lock().unwrap().clone()
    }

    /// Ids whose resources are currently open.
    fn open_now(&self) -> Vec<String> {
        let mut open = self.opened();
        for id in self.closed() {
            let pos = open.iter().position(|o| *o == id).unwrap();
            open.remove(pos);
        }
        open
    }
}

impl LifecycleHooks for RecordingHooks {
    fn after_load(&self, extension: &Extension) -> flex_extensions::Result<LoadedResources> {
        if self.fail_on.lock().unwrap().contains(extension.id()) {
            return Err(Error::Resource {
                path: PathBuf::from(extension.id()),
                reason: "injected failure".to_string(),
            });
        }
        let resources = BuiltinHooks.after_load(extension)?;
        self.opened.lock().unwrap().push(extension.id().to_string());
        Ok(resources)
    }

    fn before_unload(&self, extension: &Extension, resources: LoadedResources) {
        self.closed.lock().unwrap().push(extension.id().to_string());
        BuiltinHooks.before_unload(extension, resources);
    }
}

fn setup() -> (TestWorkspace, Arc<RecordingHooks>, ExtensionManager) {
    let ws = TestWorkspace::new();
    let hooks = Arc::new(RecordingHooks::default());
    let manager =
        ExtensionManager::with_hooks(ManagerConfig::with_root(ws.root()), hooks.clone()).unwrap();
    (ws, hooks, manager)
}

fn install(ws: &TestWorkspace, manager: &ExtensionManager, id: &str, deps: &[&str]) {
    let archive = ws.add_archive(&format!("{id}.flex"), &manifest::theme_archive(id, deps));
    manager.install(&archive).unwrap();
}

#[test]
fn failed_hook_rolls_back_the_call_only() {
    let (ws, hooks, manager) = setup();
    install(&ws, &manager, "c", &[]);
    install(&ws, &manager, "d", &[]);
    install(&ws, &manager, "b", &["c"]);
    install(&ws, &manager, "a", &["d", "b"]);

    manager.load("c").unwrap();
    hooks.fail("b");

    let err = manager.load("a").unwrap_err();
    match &err {
        Error::LoadFailed { id, cause } => {
            assert_eq!(id, "b");
            assert!(matches!(**cause, Error::Resource { .. }), "got: {cause:?}");
        }
        other => panic!("expected LoadFailed, got {other:?}"),
    }

    assert_eq!(manager.state("a"), Some(ExtensionState::Installed));
    assert!(matches!(manager.state("b"), Some(ExtensionState::Failed { .. })));
    assert_eq!(manager.state("c"), Some(ExtensionState::Loaded));
    assert_eq!(manager.state("d"), Some(ExtensionState::Installed));

    // d was opened by the failed call and closed again; c stays open.
    assert_eq!(hooks.opened(), vec!["c", "d"]);
    assert_eq!(hooks.closed(), vec!["d"]);
    assert_eq!(hooks.open_now(), vec!["c"]);
}

#[test]
fn rollback_closes_in_reverse_order() {
    let (ws, hooks, manager) = setup();
    install(&ws, &manager, "x", &[]);
    install(&ws, &manager, "y", &["x"]);
    install(&ws, &manager, "z", &["y"]);
    hooks.fail("z");

    manager.load("z").unwrap_err();
    assert_eq!(hooks.opened(), vec!["x", "y"]);
    assert_eq!(hooks.closed(), vec!["y", "x"]);
    assert!(hooks.open_now().is_empty());
}

#[test]
fn failed_extension_can_be_loaded_again() {
    let (ws, hooks, manager) = setup();
    install(&ws, &manager, "a", &[]);
    hooks.fail("a");
    manager.load("a").unwrap_err();

    hooks.fail_on.lock().unwrap().clear();
    assert_eq!(manager.load("a").unwrap(), vec!["a"]);
    assert_eq!(manager.state("a"), Some(ExtensionState::Loaded));
}

#[test]
fn every_open_is_matched_by_a_close() {
    let (ws, hooks, manager) = setup();
    install(&ws, &manager, "base", &[]);
    install(&ws, &manager, "left", &["base"]);
    install(&ws, &manager, "right", &["base"]);

    manager.load("left").unwrap();
    manager.load("right").unwrap();
    manager.unload("base").unwrap();
    manager.load("right").unwrap();
    manager.shutdown();

    assert!(hooks.open_now().is_empty());
    assert_eq!(hooks.opened().len(), hooks.closed().len());
}

#[test]
fn missing_stylesheet_fails_the_builtin_hook() {
    let ws = TestWorkspace::new();
    let manager = ExtensionManager::new(ManagerConfig::with_root(ws.root())).unwrap();
    let archive = ws.add_archive("broken.flex", &manifest::broken_theme_archive("broken", &[]));
    manager.install(&archive).unwrap();

    let err = manager.load("broken").unwrap_err();
    assert!(matches!(err, Error::LoadFailed { ref id, .. } if id == "broken"), "got: {err:?}");
    assert!(matches!(manager.state("broken"), Some(ExtensionState::Failed { .. })));
}

#[test]
fn missing_database_fails_the_language_pack_hook() {
    let ws = TestWorkspace::new();
    let manager = ExtensionManager::new(ManagerConfig::with_root(ws.root())).unwrap();
    let archive = ws.add_archive(
        "han.flex",
        &manifest::broken_language_pack_archive("org.example.han", &[]),
    );
    manager.install(&archive).unwrap();

    let err = manager.load("org.example.han").unwrap_err();
    match err {
        Error::LoadFailed { cause, .. } => {
            assert!(matches!(*cause, Error::Resource { .. }), "got: {cause:?}")
        }
        other => panic!("expected LoadFailed, got {other:?}"),
    }
}
