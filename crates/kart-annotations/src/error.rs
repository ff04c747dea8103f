/// Errors from the annotations cache. The cache is advisory (§3.7): a
/// missing entry is never an error, only a cue to recompute -- these
/// variants only cover genuine failures to read/write the backing database.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationsError {
    #[error("annotations cache at {path}: {source}")]
    Sqlite {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type AnnotationsResult<T> = Result<T, AnnotationsError>;
