//! Shared test utilities for the flex workspace.
//!
//! This crate provides package fixtures so crate test suites do not each
//! hand-roll zip files. It is a dev-dependency only and never published.
//!
//! # Modules
//!
//! - [`archive`]: [`ArchiveBuilder`] for `.flex` zip containers
//! - [`manifest`]: sample `extension.json` documents per extension kind
//! - [`workspace`]: [`TestWorkspace`] with extensions and cache directories

pub mod archive;
pub mod manifest;
pub mod workspace;

pub use archive::ArchiveBuilder;
pub use workspace::TestWorkspace;
