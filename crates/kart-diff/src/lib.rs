//! Diff engine for Kart (§4.4).
//!
//! Produces a *repo diff* -- a mapping from dataset path to per-part deltas
//! -- either between two commit trees or between a tree and a working copy.
//! The engine is layered: [`raw`] walks trees blob-by-blob with no dataset
//! awareness, [`delta`] groups those raw changes by dataset/part/key, and
//! [`tile_coalesce`] merges a tile's data blob with its PAM sidecar into one
//! logical change.

pub mod delta;
pub mod error;
pub mod key;
pub mod raw;
pub mod tile_coalesce;

pub use delta::{DatasetDiff, Delta, DeltaKind, RepoDiff, diff_trees};
pub use error::{DiffError, DiffResult};
pub use key::{KeyFilter, KeySet, PartFilter};
pub use raw::{RawChange, diff_tree_to_tree};
pub use tile_coalesce::{CoalescedTileDelta, coalesce_tile_deltas, is_pure_pam_stats_change};
