//! Staging, claiming, unstaging and sweeping against real zip files.

use flex_fs::{ArchiveStore, Error, STAGING_PREFIX, read_entry};
use flex_test_utils::{ArchiveBuilder, TestWorkspace, manifest};
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn stage_extracts_full_tree() {
    let ws = TestWorkspace::new();
    let store = ArchiveStore::open(ws.cache_dir()).unwrap();
    let archive = ws.add_archive("dark.flex", &manifest::theme_archive("org.example.dark", &[]));

    let staged = store.stage(&archive).unwrap();

    assert!(staged.path().join("extension.json").is_file());
    assert!(staged.path().join("stylesheets").join("night.json").is_file());
    let name = staged.path().file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with(STAGING_PREFIX), "got: {name}");
}

#[test]
fn stage_twice_uses_distinct_directories() {
    let ws = TestWorkspace::new();
    let store = ArchiveStore::open(ws.cache_dir()).unwrap();
    let archive = ws.add_archive("dark.flex", &manifest::theme_archive("org.example.dark", &[]));

    let first = store.stage(&archive).unwrap();
    let second = store.stage(&archive).unwrap();
    assert_ne!(first.path(), second.path());
}

#[test]
fn dropped_staging_leaves_nothing_behind() {
    let ws = TestWorkspace::new();
    let store = ArchiveStore::open(ws.cache_dir()).unwrap();
    let archive = ws.add_archive("dark.flex", &manifest::theme_archive("org.example.dark", &[]));

    drop(store.stage(&archive).unwrap());
    ws.assert_cache_contains_only(&[]);
}

#[test]
fn claim_moves_tree_under_id() {
    let ws = TestWorkspace::new();
    let store = ArchiveStore::open(ws.cache_dir()).unwrap();
    let archive = ws.add_archive("dark.flex", &manifest::theme_archive("org.example.dark", &[]));

    let staged = store.stage(&archive).unwrap();
    let working_dir = store.claim(staged, "org.example.dark").unwrap();

    assert_eq!(working_dir, store.working_dir_for("org.example.dark"));
    assert!(working_dir.join("extension.json").is_file());
    ws.assert_cache_contains_only(&["org.example.dark"]);
}

#[test]
fn claim_refuses_non_empty_target() {
    let ws = TestWorkspace::new();
    let store = ArchiveStore::open(ws.cache_dir()).unwrap();
    let archive = ws.add_archive("dark.flex", &manifest::theme_archive("org.example.dark", &[]));

    let first = store.stage(&archive).unwrap();
    store.claim(first, "org.example.dark").unwrap();

    let second = store.stage(&archive).unwrap();
    let err = store.claim(second, "org.example.dark").unwrap_err();
    assert!(matches!(err, Error::WorkingDirOccupied { .. }), "got: {err:?}");

    // The rejected staging tree is gone once the error has been handled
    ws.assert_cache_contains_only(&["org.example.dark"]);
}

#[test]
fn claim_replaces_empty_leftover_directory() {
    let ws = TestWorkspace::new();
    let store = ArchiveStore::open(ws.cache_dir()).unwrap();
    fs::create_dir(ws.cache_dir().join("org.example.dark")).unwrap();
    let archive = ws.add_archive("dark.flex", &manifest::theme_archive("org.example.dark", &[]));

    let staged = store.stage(&archive).unwrap();
    let working_dir = store.claim(staged, "org.example.dark").unwrap();
    assert!(working_dir.join("extension.json").is_file());
}

#[test]
fn unstage_is_idempotent() {
    let ws = TestWorkspace::new();
    let store = ArchiveStore::open(ws.cache_dir()).unwrap();
    let archive = ws.add_archive("dark.flex", &manifest::theme_archive("org.example.dark", &[]));
    let staged = store.stage(&archive).unwrap();
    let working_dir = store.claim(staged, "org.example.dark").unwrap();

    store.unstage(&working_dir).unwrap();
    assert!(!working_dir.exists());
    store.unstage(&working_dir).unwrap();
}

#[test]
fn corrupt_archive_is_reported() {
    let ws = TestWorkspace::new();
    let store = ArchiveStore::open(ws.cache_dir()).unwrap();
    let path = ws.extensions_dir().join("garbage.flex");
    fs::write(&path, b"this is not a zip container").unwrap();

    let err = store.stage(&path).unwrap_err();
    assert!(matches!(err, Error::CorruptArchive { .. }), "got: {err:?}");
    ws.assert_cache_contains_only(&[]);
}

#[test]
fn missing_archive_is_io_error() {
    let ws = TestWorkspace::new();
    let store = ArchiveStore::open(ws.cache_dir()).unwrap();

    let err = store.stage(&ws.extensions_dir().join("missing.flex")).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "got: {err:?}");
}

#[test]
fn sweep_removes_unclaimed_entries() {
    let ws = TestWorkspace::new();
    let store = ArchiveStore::open(ws.cache_dir()).unwrap();
    let archive = ws.add_archive("dark.flex", &manifest::theme_archive("org.example.dark", &[]));
    let staged = store.stage(&archive).unwrap();
    let kept = store.claim(staged, "org.example.dark").unwrap();
    let orphan = ws.plant_orphan("org.example.crashed");
    ws.plant_orphan(".staging-deadbeef");

    let removed = store.sweep(&[kept.clone()]);

    assert_eq!(removed.len(), 2);
    assert!(!orphan.exists());
    assert!(kept.exists());
    ws.assert_cache_contains_only(&["org.example.dark"]);
    // The lock file is not a directory and survives
    assert!(ws.cache_dir().join(flex_fs::LOCK_FILENAME).exists());
}

#[test]
fn sweep_with_nothing_claimed_empties_cache() {
    let ws = TestWorkspace::new();
    let store = ArchiveStore::open(ws.cache_dir()).unwrap();
    ws.plant_orphan("a");
    ws.plant_orphan("b");

    let removed = store.sweep::<&std::path::Path>(&[]);
    assert_eq!(removed.len(), 2);
    ws.assert_cache_contains_only(&[]);
}

#[test]
fn second_store_on_same_root_is_refused() {
    let ws = TestWorkspace::new();
    let _store = ArchiveStore::open(ws.cache_dir()).unwrap();

    let err = ArchiveStore::open(ws.cache_dir()).unwrap_err();
    assert!(matches!(err, Error::LockFailed { .. }), "got: {err:?}");
}

#[test]
fn store_can_be_reopened_after_drop() {
    let ws = TestWorkspace::new();
    drop(ArchiveStore::open(ws.cache_dir()).unwrap());
    ArchiveStore::open(ws.cache_dir()).unwrap();
}

#[test]
fn explicit_directory_entries_are_created() {
    let ws = TestWorkspace::new();
    let store = ArchiveStore::open(ws.cache_dir()).unwrap();
    let archive = ws.add_archive(
        "dirs.flex",
        &ArchiveBuilder::new()
            .manifest(&manifest::theme("org.example.dirs", &[]))
            .dir("empty/")
            .dir("./"),
    );

    let staged = store.stage(&archive).unwrap();
    assert!(staged.path().join("empty").is_dir());
}

#[test]
fn read_entry_peeks_without_a_store() {
    let ws = TestWorkspace::new();
    let archive = ws.add_archive("dark.flex", &manifest::theme_archive("org.example.dark", &[]));

    let manifest = read_entry(&archive, "extension.json").unwrap().unwrap();
    let document: serde_json::Value = serde_json::from_slice(&manifest).unwrap();
    assert_eq!(document["meta"]["id"], "org.example.dark");

    assert_eq!(read_entry(&archive, "missing.json").unwrap(), None);
    assert!(!ws.cache_dir().exists());
}

#[test]
fn read_entry_on_garbage_is_corrupt() {
    let ws = TestWorkspace::new();
    let path = ws.extensions_dir().join("garbage.flex");
    fs::write(&path, b"not a zip file at all").unwrap();

    let err = read_entry(&path, "extension.json").unwrap_err();
    assert!(matches!(err, Error::CorruptArchive { .. }), "got: {err:?}");
}

/// Rewrite the uncompressed size of every central directory record.
fn forge_declared_size(mut bytes: Vec<u8>, size: u32) -> Vec<u8> {
    const CENTRAL_HEADER: &[u8] = b"PK\x01\x02";
    let offsets: Vec<usize> = bytes
        .windows(4)
        .enumerate()
        .filter(|(_, w)| *w == CENTRAL_HEADER)
        .map(|(i, _)| i)
        .collect();
    assert!(!offsets.is_empty());
    for offset in offsets {
        bytes[offset + 24..offset + 28].copy_from_slice(&size.to_le_bytes());
    }
    bytes
}

#[test]
fn read_entry_ignores_declared_size() {
    let ws = TestWorkspace::new();
    let original = manifest::theme_archive("org.example.dark", &[]).to_bytes();
    let path = ws.extensions_dir().join("huge.flex");
    fs::write(&path, forge_declared_size(original, 0x7fff_fff0)).unwrap();

    // Must neither abort on allocation nor trust the size; a size mismatch
    // may still be reported as corruption.
    match read_entry(&path, "extension.json") {
        Ok(Some(content)) => {
            let document: serde_json::Value = serde_json::from_slice(&content).unwrap();
            assert_eq!(document["meta"]["id"], "org.example.dark");
        }
        Ok(None) => panic!("manifest entry should be found"),
        Err(err) => assert!(matches!(err, Error::CorruptArchive { .. }), "got: {err:?}"),
    }
}
