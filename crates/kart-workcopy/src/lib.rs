//! Working-copy reconciler (§4.5).
//!
//! Materialises a commit tree into a SQLite database so table datasets can
//! be browsed and edited with ordinary SQL, tracks which rows have been
//! touched since the last checkout via trigger-populated "track" tables
//! (rather than re-diffing the whole table), and turns those edits back
//! into blobs and a new tree on commit. Tile/point-cloud/raster datasets
//! get a much lighter read-mostly filename-to-oid mirror, since those are
//! edited file-at-a-time through LFS rather than row-at-a-time through SQL.

pub mod ddl;
pub mod discover;
pub mod error;
pub mod lock;
pub mod migrate;
pub mod sql;
pub mod treebuild;
pub mod workingcopy;

pub use discover::{discover_datasets, DiscoveredDataset, FoundBlob};
pub use error::{WorkcopyError, WorkcopyResult};
pub use lock::WorkcopyLock;
pub use migrate::{apply_migration_ddl, check_narrowing, is_widening, plan_migration, ColumnMigration};
pub use workingcopy::WorkingCopy;
