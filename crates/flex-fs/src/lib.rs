//! Filesystem layer for the extension manager.
//!
//! Owns the cache root: staging package archives into private working
//! directories, claiming them under their extension id, removing them again,
//! and sweeping leftovers after a crash.

pub mod archive;
pub mod checksum;
pub mod error;
pub mod io;

pub use archive::{ArchiveStore, StagedDir, read_entry};
pub use error::{Error, Result};

/// Prefix of directories that hold an archive which has not been claimed yet.
pub const STAGING_PREFIX: &str = ".staging-";

/// Name of the advisory lock file kept inside the cache root.
pub const LOCK_FILENAME: &str = ".lock";
