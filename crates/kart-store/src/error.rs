use kart_types::ObjectId;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The object exists but isn't the kind the caller asked for (e.g. a
    /// blob id passed to `read_tree`).
    #[error("object {id} is not a {expected}")]
    WrongKind { id: ObjectId, expected: &'static str },

    /// The object's bytes couldn't be parsed as the kind they claim to be.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// A compare-and-swap ref update lost the race: `expected` no longer
    /// matches what's on disk.
    #[error("ref {name} changed concurrently: expected {expected}, found {actual}")]
    RefConflict {
        name: String,
        expected: String,
        actual: String,
    },

    /// The repository's advisory lock (used around working-copy resets and
    /// merges) is already held by another process.
    #[error("repository is locked: {0}")]
    Locked(String),

    /// Attempted to write a null object ID.
    #[error("cannot store object with null ID")]
    NullObjectId,

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error surfaced by the underlying object database.
    #[error("git object database error: {0}")]
    Git(#[from] git2::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
