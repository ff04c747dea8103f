//! LFS subsystem for Kart (§4.3).
//!
//! Tiles are represented in a commit tree by a small pointer blob (see
//! `kart_dataset::TilePointer`); the actual (large) content lives outside
//! the object store, content-addressed under `.kart/lfs/objects/<p1>/<p2>/<hex>`.
//! This crate owns that cache: writing new objects into it, resolving a
//! cached path without fetching, fetching-and-verifying a missing object,
//! and enumerating every tile pointer reachable from a commit range.

pub mod cache;
pub mod error;
pub mod fetch;
pub mod ls_files;

pub use cache::LfsCache;
pub use error::{LfsError, LfsResult};
pub use fetch::{fetch_with_retry, LfsFetcher};
pub use ls_files::{ls_files, LfsFileRecord, TreeRange};
