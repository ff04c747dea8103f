//! Dataset codec for Kart.
//!
//! A dataset is a subtree recognised by its `.<kind>-dataset.<vN>` marker
//! directory (see `kart_types::DatasetKind`). This crate turns that subtree's
//! blobs into structured values and back: meta-items, table features, and
//! tile pointers, plus the path encoding that places each blob in the tree.
//!
//! # Key Types
//!
//! - [`Schema`] / [`ColumnSchema`] — column identity and ordering
//! - [`Feature`] / [`Value`] — a decoded record
//! - [`MetaItems`] — named meta blobs and their tile-dataset merge policy
//! - [`TilePointer`] — the LFS pointer blob a tile is represented by in-tree

pub mod error;
pub mod feature;
pub mod meta;
pub mod path;
pub mod schema;
pub mod tile;
pub mod value;

pub use error::{DatasetError, DatasetResult};
pub use feature::{decode_feature, encode_feature, Feature};
pub use meta::{merge_meta_item, MetaItems, MetaMergeOutcome};
pub use path::{decode_1pk_from_filename, decode_path, encode_1pk_to_path, tile_path_for, DatasetPart};
pub use schema::{ColumnSchema, Schema};
pub use tile::{decode_tile_pointer, encode_tile_pointer, TilePointer};
pub use value::{DataType, Value};
