use thiserror::Error;

/// Errors from the repository facade (§3.1, §7). Lower-layer crates each
/// carry their own error type; this is the place those get folded into the
/// handful of kinds a CLI front end actually needs to distinguish, per the
/// exit-code table in §6.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("not a Kart repository: {0}")]
    NotARepository(String),

    #[error("a repository already exists at {0}")]
    AlreadyExists(String),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("reference not found: {0}")]
    RefNotFound(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("repository has no commits yet")]
    NoCommit,

    #[error("nothing to commit")]
    NoChanges,

    #[error("repository structure version {0} is unsupported; run the upgrade tool first")]
    UnsupportedVersion(u32),

    #[error("a merge is already in progress")]
    MergeInProgress,

    #[error("no merge is in progress")]
    NoMergeInProgress,

    #[error("merge produced {0} conflict(s)")]
    MergeConflicts(usize),

    #[error(transparent)]
    Store(#[from] kart_store::StoreError),

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Dataset(#[from] kart_dataset::DatasetError),

    #[error(transparent)]
    Diff(#[from] kart_diff::DiffError),

    #[error(transparent)]
    Workcopy(#[from] kart_workcopy::WorkcopyError),

    #[error(transparent)]
    Merge(#[from] kart_merge::MergeError),

    #[error(transparent)]
    Lfs(#[from] kart_lfs::LfsError),

    #[error(transparent)]
    Annotations(#[from] kart_annotations::AnnotationsError),

    #[error(transparent)]
    Type(#[from] kart_types::TypeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;
