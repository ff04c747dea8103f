use kart_types::ObjectId;

use crate::error::StoreResult;
use crate::object::{CommitInfo, Tree, TreeEntry};

/// The object-database operations every Kart component builds on.
///
/// `kart-store` has exactly one implementation ([`crate::repo::GitObjectStore`])
/// but the trait stays the seam between "how Kart thinks about objects" and
/// "how the on-disk database actually stores them" — dataset, diff and merge
/// code is written against this trait, not against `git2` directly.
///
/// All implementations must satisfy:
/// - Objects are immutable once written; content-addressing guarantees this.
/// - Concurrent reads are always safe.
/// - The store never interprets blob contents — it is a pure key-value store.
pub trait ObjectStore: Send + Sync {
    /// Read a blob's raw bytes. `Ok(None)` if it doesn't exist.
    fn read_blob(&self, id: &ObjectId) -> StoreResult<Option<Vec<u8>>>;

    /// Write a blob, returning its content-addressed id. Idempotent.
    fn write_blob(&self, data: &[u8]) -> StoreResult<ObjectId>;

    /// Read and parse a tree object. `Ok(None)` if it doesn't exist.
    fn read_tree(&self, id: &ObjectId) -> StoreResult<Option<Tree>>;

    /// Write a tree from an already-sorted entry list.
    fn write_tree(&self, entries: &[TreeEntry]) -> StoreResult<ObjectId>;

    /// Read and parse a commit object. `Ok(None)` if it doesn't exist.
    fn read_commit(&self, id: &ObjectId) -> StoreResult<Option<CommitInfo>>;

    /// Write a commit object, returning its id.
    fn write_commit(&self, info: &CommitInfo) -> StoreResult<ObjectId>;

    /// Check whether any object exists under this id.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;
}
