use std::collections::BTreeMap;

use kart_dataset::DatasetPart;
use kart_store::{ObjectId, ObjectStore};
use kart_types::DatasetPath;

use crate::error::DiffResult;
use crate::key::KeyFilter;
use crate::raw::{diff_tree_to_tree, RawChange};

/// A single changed key within one part of a dataset (a meta item name, a
/// feature's path-encoded pk, or a tile's filename). Deltas are grouped by
/// that key, so `old_key` and `new_key` are always equal when both are
/// present: a primary-key change is a delete of the old key plus an insert
/// of the new one, not a rename on one delta.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delta {
    pub old_key: Option<String>,
    pub new_key: Option<String>,
    pub old_id: Option<ObjectId>,
    pub new_id: Option<ObjectId>,
}

impl Delta {
    pub fn kind(&self) -> DeltaKind {
        match (&self.old_key, &self.new_key) {
            (None, Some(_)) => DeltaKind::Insert,
            (Some(_), None) => DeltaKind::Delete,
            (Some(_), Some(_)) => DeltaKind::Update,
            (None, None) => unreachable!("a delta always has at least one side"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaKind {
    Insert,
    Update,
    Delete,
}

/// One dataset's changes: meta-item deltas, plus either feature or tile
/// deltas depending on the dataset's kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatasetDiff {
    pub meta: Vec<Delta>,
    pub feature: Vec<Delta>,
    pub tile: Vec<Delta>,
}

impl DatasetDiff {
    pub fn is_empty(&self) -> bool {
        self.meta.is_empty() && self.feature.is_empty() && self.tile.is_empty()
    }
}

/// A full repository diff: every changed dataset, keyed by its path.
pub type RepoDiff = BTreeMap<DatasetPath, DatasetDiff>;

/// Diff two trees (tree ↔ tree, §4.4) and group the blob-level changes by
/// dataset and part. Blobs outside any recognised dataset marker directory
/// are ignored. `filter` restricts which datasets/keys are even considered.
pub fn diff_trees(
    store: &dyn ObjectStore,
    old_tree: Option<ObjectId>,
    new_tree: ObjectId,
    filter: &KeyFilter,
) -> DiffResult<RepoDiff> {
    let raw = diff_tree_to_tree(store, old_tree, new_tree)?;
    Ok(group_raw_changes(raw, filter))
}

fn group_raw_changes(raw: Vec<RawChange>, filter: &KeyFilter) -> RepoDiff {
    // First pass: bucket every raw change by (dataset_path, part_kind, key),
    // recording which side (old/new) supplied it.
    #[derive(Default)]
    struct Bucket {
        old_key: Option<String>,
        new_key: Option<String>,
        old_id: Option<ObjectId>,
        new_id: Option<ObjectId>,
    }

    let mut meta_buckets: BTreeMap<(DatasetPath, String), Bucket> = BTreeMap::new();
    let mut feature_buckets: BTreeMap<(DatasetPath, String), Bucket> = BTreeMap::new();
    let mut tile_buckets: BTreeMap<(DatasetPath, String), Bucket> = BTreeMap::new();

    for change in raw {
        let path = change.path().to_string();
        let Ok(Some((dataset_path, _kind, _version, part))) = kart_dataset::decode_path(&path) else {
            continue;
        };

        let Some(part_filter) = filter.part_filter_for(&dataset_path) else {
            continue;
        };

        match part {
            DatasetPart::Meta { item_name } => {
                if !part_filter.meta.contains(&item_name) {
                    continue;
                }
                let bucket = meta_buckets.entry((dataset_path, item_name)).or_default();
                apply_change(bucket_fields(bucket), &change);
            }
            DatasetPart::Feature { filename } => {
                if !part_filter.feature.contains(&filename) {
                    continue;
                }
                let bucket = feature_buckets.entry((dataset_path, filename)).or_default();
                apply_change(bucket_fields(bucket), &change);
            }
            DatasetPart::Tile { filename } => {
                if !part_filter.feature.contains(&filename) {
                    continue;
                }
                let bucket = tile_buckets.entry((dataset_path, filename)).or_default();
                apply_change(bucket_fields(bucket), &change);
            }
        }
    }

    fn bucket_fields(b: &mut Bucket) -> &mut Bucket {
        b
    }

    fn apply_change(bucket: &mut Bucket, change: &RawChange) {
        match change {
            RawChange::Added { path, new_id, .. } => {
                bucket.new_key = Some(path.rsplit('/').next().unwrap().to_string());
                bucket.new_id = Some(*new_id);
            }
            RawChange::Deleted { path, old_id, .. } => {
                bucket.old_key = Some(path.rsplit('/').next().unwrap().to_string());
                bucket.old_id = Some(*old_id);
            }
            RawChange::Modified {
                path,
                old_id,
                new_id,
                ..
            } => {
                let key = path.rsplit('/').next().unwrap().to_string();
                bucket.old_key = Some(key.clone());
                bucket.new_key = Some(key);
                bucket.old_id = Some(*old_id);
                bucket.new_id = Some(*new_id);
            }
        }
    }

    let mut out = RepoDiff::new();

    for ((dataset_path, _key), b) in meta_buckets {
        out.entry(dataset_path).or_default().meta.push(Delta {
            old_key: b.old_key,
            new_key: b.new_key,
            old_id: b.old_id,
            new_id: b.new_id,
        });
    }
    for ((dataset_path, _key), b) in feature_buckets {
        out.entry(dataset_path).or_default().feature.push(Delta {
            old_key: b.old_key,
            new_key: b.new_key,
            old_id: b.old_id,
            new_id: b.new_id,
        });
    }
    for ((dataset_path, _key), b) in tile_buckets {
        out.entry(dataset_path).or_default().tile.push(Delta {
            old_key: b.old_key,
            new_key: b.new_key,
            old_id: b.old_id,
            new_id: b.new_id,
        });
    }

    out.retain(|_, diff| !diff.is_empty());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_store::{EntryMode, GitObjectStore};
    use tempfile::tempdir;

    #[test]
    fn groups_feature_change_under_its_dataset() {
        let dir = tempdir().unwrap();
        let store = GitObjectStore::init_bare(dir.path()).unwrap();

        let blob1 = store.write_blob(b"old feature").unwrap();
        let blob2 = store.write_blob(b"new feature").unwrap();

        let mut e1 = store.tree_editor(None);
        e1.insert(
            "roads/.table-dataset.v3/feature/ab/cd/pk1",
            blob1,
            EntryMode::Blob,
        );
        let root1 = e1.flush().unwrap();

        let mut e2 = store.tree_editor(Some(root1));
        e2.insert(
            "roads/.table-dataset.v3/feature/ab/cd/pk1",
            blob2,
            EntryMode::Blob,
        );
        let root2 = e2.flush().unwrap();

        let diff = diff_trees(&store, Some(root1), root2, &KeyFilter::MatchAll).unwrap();
        let dataset_path = kart_types::DatasetPath::new("roads").unwrap();
        let dataset_diff = diff.get(&dataset_path).unwrap();
        assert_eq!(dataset_diff.feature.len(), 1);
        assert_eq!(dataset_diff.feature[0].kind(), DeltaKind::Update);
    }

    #[test]
    fn ignores_blobs_outside_any_dataset_marker() {
        let dir = tempdir().unwrap();
        let store = GitObjectStore::init_bare(dir.path()).unwrap();
        let blob = store.write_blob(b"readme").unwrap();
        let mut editor = store.tree_editor(None);
        editor.insert("KART_README.txt", blob, EntryMode::Blob);
        let root = editor.flush().unwrap();

        let diff = diff_trees(&store, None, root, &KeyFilter::MatchAll).unwrap();
        assert!(diff.is_empty());
    }
}
