//! [`TestWorkspace`]: a temporary host layout for manager tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::ArchiveBuilder;

/// A temporary directory with `extensions/` (archives) and `cache/`
/// (working directories) subdirectories.
///
/// # Example
///
/// ```rust,no_run
/// use flex_test_utils::{TestWorkspace, manifest};
///
/// let ws = TestWorkspace::new();
/// let archive = ws.add_archive("dark.flex", &manifest::theme_archive("org.example.dark", &[]));
/// assert!(archive.exists());
/// ```
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    /// Create the temporary layout.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("extensions")).unwrap();
        Self { temp_dir }
    }

    /// Root of the temporary layout.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory scanned for archives at startup.
    pub fn extensions_dir(&self) -> PathBuf {
        self.root().join("extensions")
    }

    /// Cache root holding working directories.
    pub fn cache_dir(&self) -> PathBuf {
        self.root().join("cache")
    }

    /// Write an archive into the extensions directory.
    pub fn add_archive(&self, file_name: &str, archive: &ArchiveBuilder) -> PathBuf {
        let path = self.extensions_dir().join(file_name);
        archive.write_to(&path);
        path
    }

    /// Write an archive outside the extensions directory (an "import").
    pub fn write_incoming(&self, file_name: &str, archive: &ArchiveBuilder) -> PathBuf {
        let path = self.root().join("incoming").join(file_name);
        archive.write_to(&path);
        path
    }

    /// Simulate a crash leftover: a populated directory in the cache root.
    pub fn plant_orphan(&self, name: &str) -> PathBuf {
        let dir = self.cache_dir().join(name);
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested").join("leftover.txt"), "stale").unwrap();
        dir
    }

    /// Names of the directories currently in the cache root, sorted.
    pub fn cache_entries(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.cache_dir()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Assert that the cache root holds exactly these directories.
    pub fn assert_cache_contains_only(&self, expected: &[&str]) {
        let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(
            self.cache_entries(),
            expected,
            "unexpected cache root contents under {}",
            self.cache_dir().display()
        );
    }
}
