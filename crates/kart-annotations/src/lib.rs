//! Advisory annotations cache for Kart (§3.7).
//!
//! A small embedded database inside the repository's private directory,
//! storing derived data that is expensive to recompute (exact diff counts
//! between two trees being the only consumer in the core). Entries are
//! upserted by `(kind, object-id)`; a missing entry is normal and simply
//! means the caller recomputes, never an error.

pub mod error;
pub mod store;

pub use error::{AnnotationsError, AnnotationsResult};
pub use store::{symmetric_pair_key, AnnotationKind, AnnotationsStore};
