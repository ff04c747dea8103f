/// Errors from dataset codec operations.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// A record doesn't fit its dataset's schema: a required column is
    /// missing, or a value's type disagrees with the column's declared type.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A blob under `feature/`, `tile/` or `meta/` didn't decode to the
    /// shape its location implies.
    #[error("corrupt {part} at {path}: {reason}")]
    CorruptBlob {
        part: &'static str,
        path: String,
        reason: String,
    },

    /// A path couldn't be split into dataset path + marker + part.
    #[error("not a recognised dataset blob path: {0}")]
    UnrecognisedPath(String),

    /// An LFS pointer blob was malformed.
    #[error("malformed LFS pointer: {0}")]
    MalformedPointer(String),

    #[error(transparent)]
    Type(#[from] kart_types::TypeError),

    #[error(transparent)]
    Hasher(#[from] kart_crypto::HasherError),
}

pub type DatasetResult<T> = Result<T, DatasetError>;
