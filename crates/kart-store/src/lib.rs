//! Object store adapter for Kart.
//!
//! Kart repositories are git repositories: every blob, tree and commit this
//! crate deals with is read and written through `git2`, so the object
//! database underneath a Kart repo is byte-for-byte a git object database.
//! Higher-level crates (`kart-dataset`, `kart-diff`, `kart-merge`) are
//! written against the [`ObjectStore`] trait and the plain [`Tree`] /
//! [`CommitInfo`] types here, not against `git2` directly.
//!
//! # Key Types
//!
//! - [`GitObjectStore`] — the only implementation, backed by a real git odb
//! - [`Tree`] / [`TreeEntry`] / [`EntryMode`] — directory listings
//! - [`CommitInfo`] — parsed commit metadata
//! - [`TreeEditor`] — buffered nested-path tree edits (§4.1 commit path)
//! - [`RepoLock`] — advisory lock around resets, checkouts and merges

pub mod error;
pub mod object;
pub mod repo;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use kart_types::ObjectId;
pub use object::{CommitInfo, EntryMode, Tree, TreeEntry};
pub use repo::{GitObjectStore, RepoLock, TreeEditor};
pub use traits::ObjectStore;
