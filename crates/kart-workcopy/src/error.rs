use kart_types::DatasetPath;

/// Errors from the working-copy reconciler (§4.5, §7).
#[derive(Debug, thiserror::Error)]
pub enum WorkcopyError {
    /// `reset` without `force` would overwrite rows the user has edited
    /// since the last reset.
    #[error("working copy has uncommitted changes in {dataset}; use force to discard them")]
    DirtyWorkingCopy { dataset: DatasetPath },

    /// A schema migration would drop information a column already holds
    /// (e.g. integer -> boolean) and `force` wasn't given.
    #[error("refusing to narrow column {column} in {dataset} from {from:?} to {to:?} without force")]
    NarrowingRefused {
        dataset: DatasetPath,
        column: String,
        from: kart_dataset::DataType,
        to: kart_dataset::DataType,
    },

    /// Another reset/commit is already in progress on this working copy.
    #[error("working copy is locked by another operation")]
    Locked,

    /// `assert_db_tree_match` found rows that don't round-trip back to the
    /// tree they were materialised from.
    #[error("working copy doesn't match its tree at: {0:?}")]
    TreeMismatch(Vec<String>),

    /// A dataset referenced by the working copy's own state doesn't exist
    /// in the tree being reconciled against.
    #[error("unknown dataset {0}")]
    UnknownDataset(DatasetPath),

    /// The working copy's own `kart_state` bookkeeping doesn't parse --
    /// this should never happen outside of manual tampering.
    #[error("working copy state is corrupt: {0}")]
    CorruptState(String),

    #[error(transparent)]
    Sql(#[from] rusqlite::Error),

    #[error(transparent)]
    Store(#[from] kart_store::StoreError),

    #[error(transparent)]
    Dataset(#[from] kart_dataset::DatasetError),

    #[error(transparent)]
    Diff(#[from] kart_diff::DiffError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

pub type WorkcopyResult<T> = Result<T, WorkcopyError>;
