use kart_types::ObjectId;

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// An object referenced during diff was not found in the store.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error(transparent)]
    Store(#[from] kart_store::StoreError),

    #[error(transparent)]
    Dataset(#[from] kart_dataset::DatasetError),

    #[error(transparent)]
    Type(#[from] kart_types::TypeError),
}

pub type DiffResult<T> = Result<T, DiffError>;
