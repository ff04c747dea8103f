use kart_crypto::Sha256Oid;

/// Errors from the LFS subsystem (§4.3, §7 `IntegrityError`/`Transport`).
#[derive(Debug, thiserror::Error)]
pub enum LfsError {
    /// A fetched or cached object's hash didn't match its recorded oid.
    #[error("LFS object {oid} failed integrity check: expected {oid}, downloaded content hashes differently")]
    IntegrityError { oid: Sha256Oid },

    /// An object is referenced but not present locally and no URL/remote was
    /// available to fetch it from.
    #[error("LFS object {0} is not cached locally and no source was given")]
    NotFound(Sha256Oid),

    /// A remote fetch failed after exhausting the retry budget.
    #[error("failed to fetch LFS object {oid} from {url}: {reason}")]
    Transport { oid: Sha256Oid, url: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Dataset(#[from] kart_dataset::DatasetError),

    #[error(transparent)]
    Store(#[from] kart_store::StoreError),

    #[error(transparent)]
    Diff(#[from] kart_diff::DiffError),
}

pub type LfsResult<T> = Result<T, LfsError>;
