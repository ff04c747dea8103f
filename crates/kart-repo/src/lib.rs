//! Repository facade for Kart.
//!
//! [`Repository`] ties together the object store (`kart-store`), the dataset
//! codec (`kart-dataset`), the diff engine (`kart-diff`), the working copy
//! (`kart-workcopy`), the merge engine (`kart-merge`), the LFS cache
//! (`kart-lfs`) and the annotations cache (`kart-annotations`) into the
//! single API a CLI front end (or any other embedder) drives a repository
//! through. No caller outside this crate should need to import those crates
//! directly.

pub mod commit;
pub mod config;
pub mod error;
pub mod repository;

pub use commit::{CommitProposal, CommitResult, Signature};
pub use config::{RepoConfig, WorkingCopyConfig, WorkingCopyKind};
pub use error::{RepoError, RepoResult};
pub use repository::{FsckReport, Repository, Status};

// Re-exported so callers can build filters/ranges/resolutions without an
// explicit dependency on the lower crates.
pub use kart_diff::KeyFilter;
pub use kart_lfs::TreeRange;
pub use kart_merge::{ConflictCategory, FastForwardMode, MergeOutcome, Resolve};
pub use kart_store::ObjectId;
