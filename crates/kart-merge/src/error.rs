use kart_dataset::DatasetError;
use kart_store::StoreError;

/// Errors from the merge engine.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// `ours` and `theirs` share no history at all.
    #[error("commits share no common ancestor")]
    Unrelated,

    /// `--ff-only` was requested but the merge isn't a fast-forward.
    #[error("not a fast-forward merge")]
    NotFastForward,

    /// A merge is already in progress (`MERGE_HEAD` exists) and the caller
    /// tried to start a new one without resolving or aborting it first.
    #[error("a merge is already in progress")]
    MergeInProgress,

    /// The caller asked to resolve, abort, or finalise a merge but no
    /// `MERGE_HEAD` sentinel is present.
    #[error("no merge is in progress")]
    NoMergeInProgress,

    /// Finalisation was attempted while conflicts still lack a resolution.
    #[error("{0} conflict(s) remain unresolved")]
    UnresolvedConflicts(usize),

    /// `resolve` was called with a key that isn't in the conflict set.
    #[error("no conflict with key {0:?}")]
    UnknownConflictKey(String),

    /// The persisted merge index file is missing or malformed.
    #[error("merge index is corrupt: {0}")]
    CorruptIndex(String),

    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    #[error("dataset codec error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialise merge state: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;
