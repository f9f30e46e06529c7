//! Archive store: immutable package archives in, private working trees out.
//!
//! A package archive is a zip container. Staging extracts it into a fresh
//! `.staging-<uuid>` directory under the cache root; claiming renames that
//! tree to `<cache root>/<id>` once the manifest has been read. Anything in
//! the cache root that no registered extension claims is removed by
//! [`ArchiveStore::sweep`].
//!
//! ```text
//! <cache root>/
//!   .lock                     advisory lock, held for the store's lifetime
//!   .staging-3f2a.../         archive being installed
//!   org.example.han/          claimed working directory
//! ```

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Component, Path, PathBuf};

use fs2::FileExt;
use uuid::Uuid;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::io::remove_dir_idempotent;
use crate::{Error, LOCK_FILENAME, Result, STAGING_PREFIX};

/// Exclusive owner of a cache root directory.
///
/// Only one `ArchiveStore` (in any process) can hold a given cache root;
/// the advisory lock is released when the store is dropped.
#[derive(Debug)]
pub struct ArchiveStore {
    root: PathBuf,
    _lock: File,
}

/// A freshly extracted archive that has not been claimed by an id yet.
///
/// Dropping an unclaimed `StagedDir` removes its directory tree, so every
/// early return in an install pipeline rolls the extraction back.
#[derive(Debug)]
pub struct StagedDir {
    path: PathBuf,
    armed: bool,
}

impl StagedDir {
    fn create(path: PathBuf) -> Result<Self> {
        // create_dir (not create_dir_all): never reuse an existing directory
        fs::create_dir(&path).map_err(|e| Error::io(&path, e))?;
        Ok(Self { path, armed: true })
    }

    /// Path of the staged tree.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the staged tree now instead of on drop.
    pub fn discard(mut self) {
        self.cleanup();
    }

    fn disarm(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }

    fn cleanup(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Err(e) = remove_dir_idempotent(&self.path) {
            tracing::warn!("Failed to remove staging directory {:?}: {}", self.path, e);
        }
    }
}

impl Drop for StagedDir {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl ArchiveStore {
    /// Open (and create if needed) a cache root, taking its exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockFailed`] if another store already owns the root.
    pub fn open(cache_root: impl Into<PathBuf>) -> Result<Self> {
        let requested = cache_root.into();
        fs::create_dir_all(&requested).map_err(|e| Error::io(&requested, e))?;
        let root = dunce::canonicalize(&requested).map_err(|e| Error::io(&requested, e))?;

        let lock_path = root.join(LOCK_FILENAME);
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| Error::io(&lock_path, e))?;
        lock.try_lock_exclusive()
            .map_err(|_| Error::LockFailed { path: root.clone() })?;

        tracing::debug!("Opened archive store at {:?}", root);
        Ok(Self { root, _lock: lock })
    }

    /// The (canonical) cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The working directory an extension id is claimed under.
    pub fn working_dir_for(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Extract `archive_path` into a fresh, uniquely named staging directory.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the archive cannot be read or a file cannot be written
    /// - [`Error::CorruptArchive`] if the zip container or an entry is invalid
    /// - [`Error::UnsafeArchiveEntry`] if an entry would land outside the
    ///   staging directory, or is a symlink
    ///
    /// On error the staging directory is removed again.
    pub fn stage(&self, archive_path: &Path) -> Result<StagedDir> {
        let file = File::open(archive_path).map_err(|e| Error::io(archive_path, e))?;
        let mut archive =
            ZipArchive::new(file).map_err(|e| zip_error(archive_path, e))?;

        let staged = StagedDir::create(
            self.root
                .join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4().simple())),
        )?;
        let dest_root = staged.path().to_path_buf();

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| zip_error(archive_path, e))?;
            let name = entry.name().to_string();

            let relative = safe_entry_path(&name)?;
            if entry.is_symlink() {
                return Err(Error::UnsafeArchiveEntry { entry: name });
            }
            if relative.as_os_str().is_empty() {
                continue;
            }

            let out_path = dest_root.join(&relative);
            if entry.is_dir() {
                fs::create_dir_all(&out_path).map_err(|e| Error::io(&out_path, e))?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
                let resolved = dunce::canonicalize(parent).map_err(|e| Error::io(parent, e))?;
                if !resolved.starts_with(&dest_root) {
                    return Err(Error::UnsafeArchiveEntry { entry: name });
                }
            }

            let mut out = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&out_path)
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::AlreadyExists => Error::CorruptArchive {
                        path: archive_path.to_path_buf(),
                        reason: format!("duplicate entry '{}'", name),
                    },
                    _ => Error::io(&out_path, e),
                })?;
            std::io::copy(&mut entry, &mut out).map_err(|e| match e.kind() {
                std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof => {
                    Error::CorruptArchive {
                        path: archive_path.to_path_buf(),
                        reason: format!("entry '{}': {}", name, e),
                    }
                }
                _ => Error::io(&out_path, e),
            })?;
        }

        tracing::debug!(
            "Staged {:?} into {:?} ({} entries)",
            archive_path,
            dest_root,
            archive.len()
        );
        Ok(staged)
    }

    /// Move a staged tree to `<cache root>/<id>`.
    ///
    /// An empty leftover directory at the target is replaced; a non-empty one
    /// fails with [`Error::WorkingDirOccupied`] and leaves both trees intact
    /// for the caller (the staged tree is removed when dropped).
    pub fn claim(&self, staged: StagedDir, id: &str) -> Result<PathBuf> {
        validate_dir_name(id)?;
        let target = self.working_dir_for(id);

        if target.exists() {
            let is_empty = fs::read_dir(&target)
                .map_err(|e| Error::io(&target, e))?
                .next()
                .is_none();
            if !is_empty {
                return Err(Error::WorkingDirOccupied { path: target });
            }
            fs::remove_dir(&target).map_err(|e| Error::io(&target, e))?;
        }

        fs::rename(staged.path(), &target).map_err(|e| Error::io(&target, e))?;
        staged.disarm();

        tracing::debug!("Claimed working directory {:?}", target);
        Ok(target)
    }

    /// Recursively delete a working directory. Missing directories are fine.
    pub fn unstage(&self, working_dir: &Path) -> Result<()> {
        remove_dir_idempotent(working_dir)?;
        tracing::debug!("Unstaged {:?}", working_dir);
        Ok(())
    }

    /// Subdirectories currently present in the cache root.
    pub fn entries(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| Error::io(&self.root, e))? {
            let entry = entry.map_err(|e| Error::io(&self.root, e))?;
            let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
            if file_type.is_dir() || file_type.is_symlink() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Delete every cache entry that is not in `claimed`.
    ///
    /// Best-effort: failures are logged and the directory is left for the
    /// next sweep. Returns the entries that were removed.
    pub fn sweep<P: AsRef<Path>>(&self, claimed: &[P]) -> Vec<PathBuf> {
        let keep: HashSet<OsString> = claimed
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| p.parent() == Some(self.root.as_path()))
            .filter_map(|p| p.file_name().map(|n| n.to_os_string()))
            .collect();

        let entries = match self.entries() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot list cache root for sweep: {}", e);
                return Vec::new();
            }
        };

        let mut removed = Vec::new();
        for path in entries {
            let claimed = path
                .file_name()
                .is_some_and(|name| keep.contains(name));
            if claimed {
                continue;
            }

            let result = if path.is_symlink() {
                fs::remove_file(&path).map_err(|e| Error::io(&path, e))
            } else {
                remove_dir_idempotent(&path)
            };
            match result {
                Ok(()) => {
                    tracing::info!("Swept orphaned cache entry {:?}", path);
                    removed.push(path);
                }
                Err(e) => tracing::warn!("Failed to sweep {:?}: {}", path, e),
            }
        }
        removed
    }
}

/// Upper bound on the buffer reserved up front by [`read_entry`].
const MAX_PREALLOCATION: u64 = 1024 * 1024;

/// Read a single file entry from an archive without extracting anything.
///
/// Returns `Ok(None)` if the archive has no entry with that name. Used to
/// peek at a manifest without owning a cache root.
pub fn read_entry(archive_path: &Path, name: &str) -> Result<Option<Vec<u8>>> {
    let file = File::open(archive_path).map_err(|e| Error::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| zip_error(archive_path, e))?;
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(zip_error(archive_path, e)),
    };

    // The declared size comes from the archive and is not trusted.
    let mut content = Vec::with_capacity(entry.size().min(MAX_PREALLOCATION) as usize);
    std::io::copy(&mut entry, &mut content).map_err(|e| Error::CorruptArchive {
        path: archive_path.to_path_buf(),
        reason: format!("entry '{}': {}", name, e),
    })?;
    Ok(Some(content))
}

/// Turn a zip entry name into a relative path confined to the destination.
///
/// Rejects absolute paths, drive prefixes and any `..` component rather than
/// trying to resolve them.
fn safe_entry_path(name: &str) -> Result<PathBuf> {
    if name.contains('\0') {
        return Err(Error::UnsafeArchiveEntry {
            entry: name.to_string(),
        });
    }

    let normalized = name.replace('\\', "/");
    let mut out = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::UnsafeArchiveEntry {
                    entry: name.to_string(),
                });
            }
        }
    }
    Ok(out)
}

fn validate_dir_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidDirName {
            name: name.to_string(),
        })
    }
}

fn zip_error(path: &Path, err: ZipError) -> Error {
    match err {
        ZipError::Io(e) => Error::io(path, e),
        other => Error::CorruptArchive {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_entry_path_accepts_nested() {
        let path = safe_entry_path("stylesheets/night.json").unwrap();
        assert_eq!(path, PathBuf::from("stylesheets").join("night.json"));
    }

    #[test]
    fn test_safe_entry_path_strips_current_dir() {
        assert_eq!(safe_entry_path("./a/./b").unwrap(), PathBuf::from("a").join("b"));
        assert!(safe_entry_path("./").unwrap().as_os_str().is_empty());
    }

    #[test]
    fn test_safe_entry_path_rejects_traversal() {
        for name in ["../evil", "a/../../evil", "/etc/passwd", "..\\evil", "a\0b"] {
            let err = safe_entry_path(name).unwrap_err();
            assert!(
                matches!(err, Error::UnsafeArchiveEntry { .. }),
                "expected UnsafeArchiveEntry for {name:?}, got: {err:?}"
            );
        }
    }

    #[test]
    fn test_inner_parent_dir_is_rejected_even_if_contained() {
        // a/../b stays inside the root but is still refused
        assert!(safe_entry_path("a/../b").is_err());
    }

    #[test]
    fn test_validate_dir_name() {
        assert!(validate_dir_name("org.example.han").is_ok());
        assert!(validate_dir_name("").is_err());
        assert!(validate_dir_name(".staging-x").is_err());
        assert!(validate_dir_name("a/b").is_err());
    }

    #[test]
    fn test_staged_dir_removed_on_drop() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("staged");
        {
            let staged = StagedDir::create(path.clone()).unwrap();
            fs::write(staged.path().join("file"), "x").unwrap();
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_staged_dir_refuses_existing_directory() {
        let temp = tempfile::tempdir().unwrap();
        assert!(StagedDir::create(temp.path().to_path_buf()).is_err());
    }
}
