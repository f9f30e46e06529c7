use std::path::PathBuf;

/// Errors that can occur in the extension system.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required manifest field is missing or has the wrong shape.
    #[error("malformed manifest: field '{field}': {reason}")]
    MalformedManifest { field: String, reason: String },

    /// The manifest's serial type does not name a known extension kind.
    #[error("unsupported extension type '{tag}'")]
    UnsupportedExtensionType { tag: String },

    /// Extension manifest file not found in a staged tree.
    #[error("extension manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    /// An archive entry would be extracted outside its working directory.
    #[error("unsafe archive entry '{entry}'")]
    UnsafeArchiveEntry { entry: String },

    /// The archive container or one of its entries cannot be decoded.
    #[error("corrupt archive {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    /// I/O error reading or writing extension files.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A working directory for this id is already present on disk.
    #[error("working directory {path} is already occupied")]
    WorkingDirOccupied { path: PathBuf },

    /// Another process owns the cache root.
    #[error("cache root {path} is locked by another process")]
    LockFailed { path: PathBuf },

    /// An extension with this id is already registered.
    #[error("extension '{id}' is already installed")]
    DuplicateId { id: String },

    /// Extension not found in the registry.
    #[error("unknown extension: {0}")]
    UnknownExtension(String),

    /// A declared dependency is not registered.
    #[error("extension '{required_by}' depends on '{id}', which is not installed")]
    MissingDependency { id: String, required_by: String },

    /// The dependency graph contains a cycle; `cycle` starts and ends with
    /// the same id.
    #[error("dependency cycle: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// Other registered extensions still depend on this one.
    #[error("extension '{id}' is required by: {}", dependents.join(", "))]
    HasDependents { id: String, dependents: Vec<String> },

    /// The extension is registered but has no open resources.
    #[error("extension '{id}' is not loaded")]
    NotLoaded { id: String },

    /// The extension must be unloaded first.
    #[error("extension '{id}' is still loaded")]
    StillLoaded { id: String },

    /// An after-load hook failed; every hook opened by the same call has
    /// been closed again.
    #[error("failed to load extension '{id}': {cause}")]
    LoadFailed {
        id: String,
        #[source]
        cause: Box<Error>,
    },

    /// A file a component refers to is missing or unreadable as expected.
    #[error("invalid resource {path}: {reason}")]
    Resource { path: PathBuf, reason: String },

    /// The embedded database of a language pack could not be used.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The manager configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Failed to parse the manager configuration.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Failed to serialize a manifest.
    #[error("failed to serialize extension manifest: {0}")]
    ManifestSerialize(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(field: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedManifest {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<flex_fs::Error> for Error {
    fn from(err: flex_fs::Error) -> Self {
        match err {
            flex_fs::Error::Io { path, source } => Self::Io { path, source },
            flex_fs::Error::CorruptArchive { path, reason } => {
                Self::CorruptArchive { path, reason }
            }
            flex_fs::Error::UnsafeArchiveEntry { entry } => Self::UnsafeArchiveEntry { entry },
            flex_fs::Error::WorkingDirOccupied { path } => Self::WorkingDirOccupied { path },
            flex_fs::Error::LockFailed { path } => Self::LockFailed { path },
            flex_fs::Error::InvalidDirName { name } => Self::malformed("meta.id", format!(
                "'{name}' cannot be used as a directory name"
            )),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
