//! Foundation types for Kart.
//!
//! This crate provides the identifiers and small structural types shared by
//! every other Kart crate: the object store's content address, dataset
//! paths and marker directories, schema column identity, and the
//! repository-structure version that gates dataset codec selection.
//!
//! # Key Types
//!
//! - [`ObjectId`] — Content-addressed identifier reused from the object store
//! - [`DatasetPath`] / [`DatasetKind`] — Dataset location and marker directory
//! - [`ColumnId`] — Stable schema column identity (survives renames)
//! - [`RepoStructureVersion`] — The `.kart.repostructure.version` gate

pub mod column;
pub mod dataset_path;
pub mod error;
pub mod object;
pub mod version;

pub use column::ColumnId;
pub use dataset_path::{DatasetKind, DatasetPath};
pub use error::TypeError;
pub use object::ObjectId;
pub use version::RepoStructureVersion;
