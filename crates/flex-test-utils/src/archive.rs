//! [`ArchiveBuilder`] for package archives.

use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Fixed path of the manifest inside a package archive.
pub const MANIFEST_ENTRY: &str = "extension.json";

#[derive(Debug, Clone)]
enum Entry {
    File { name: String, content: Vec<u8> },
    Dir { name: String },
    Symlink { name: String, target: String },
}

/// Builds a zip container entry by entry.
///
/// Entry names are written verbatim, which is what makes it possible to
/// produce hostile archives (`../escape.txt`, symlinks) for security tests.
///
/// # Example
///
/// ```rust,no_run
/// use flex_test_utils::{ArchiveBuilder, manifest};
///
/// let bytes = ArchiveBuilder::new()
///     .manifest(&manifest::theme("org.example.dark", &[]))
///     .file("stylesheets/dark.json", "{}")
///     .to_bytes();
/// assert!(!bytes.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    entries: Vec<Entry>,
}

impl ArchiveBuilder {
    /// Create an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `extension.json` with the given document.
    pub fn manifest(self, document: &serde_json::Value) -> Self {
        let content = serde_json::to_vec_pretty(document).unwrap();
        self.file(MANIFEST_ENTRY, content)
    }

    /// Add a regular file.
    pub fn file(mut self, name: &str, content: impl AsRef<[u8]>) -> Self {
        self.entries.push(Entry::File {
            name: name.to_string(),
            content: content.as_ref().to_vec(),
        });
        self
    }

    /// Add an explicit directory entry.
    pub fn dir(mut self, name: &str) -> Self {
        self.entries.push(Entry::Dir {
            name: name.to_string(),
        });
        self
    }

    /// Add a symlink entry pointing at `target`.
    pub fn symlink(mut self, name: &str, target: &str) -> Self {
        self.entries.push(Entry::Symlink {
            name: name.to_string(),
            target: target.to_string(),
        });
        self
    }

    /// Serialize the archive to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in &self.entries {
            match entry {
                Entry::File { name, content } => {
                    zip.start_file(name.as_str(), options).unwrap();
                    zip.write_all(content).unwrap();
                }
                Entry::Dir { name } => {
                    zip.add_directory(name.as_str(), options).unwrap();
                }
                Entry::Symlink { name, target } => {
                    zip.add_symlink(name.as_str(), target.as_str(), options)
                        .unwrap();
                }
            }
        }

        zip.finish().unwrap().into_inner()
    }

    /// Write the archive to `path`, creating parent directories.
    pub fn write_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, self.to_bytes()).unwrap();
    }
}
