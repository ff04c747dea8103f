use std::collections::BTreeSet;

use kart_dataset::DatasetPart;
use kart_store::{ObjectId, ObjectStore};

use crate::error::LfsResult;

/// Which commit(s) to enumerate tile pointers over, per the `lfs+ ls-files`
/// CLI surface (§6): a single tree (e.g. `HEAD`), a `from..to` range
/// (tiles introduced or changed between two commits' trees), or every ref
/// tip (`--all`).
pub enum TreeRange {
    Single(ObjectId),
    Range(ObjectId, ObjectId),
    All(Vec<ObjectId>),
}

/// One row of `lfs+ ls-files` output: a tile pointer's oid, its recorded
/// size, and the repo-relative path of the pointer blob that names it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LfsFileRecord {
    pub oid: kart_crypto::Sha256Oid,
    pub size: u64,
    pub path: String,
}

/// Enumerate every tile pointer reachable from `range`, deduplicated by oid
/// (the same tile content can recur at many paths or many commits).
pub fn ls_files(store: &dyn ObjectStore, range: TreeRange) -> LfsResult<Vec<LfsFileRecord>> {
    let mut out = Vec::new();
    let mut seen = BTreeSet::new();

    match range {
        TreeRange::Single(tree) => walk_tree_for_tiles(store, tree, &mut out, &mut seen)?,
        TreeRange::All(trees) => {
            for tree in trees {
                walk_tree_for_tiles(store, tree, &mut out, &mut seen)?;
            }
        }
        TreeRange::Range(from, to) => {
            let changes = kart_diff::diff_tree_to_tree(store, Some(from), to)?;
            for change in changes {
                let path = change.path().to_string();
                let Ok(Some((dataset_path, _kind, _version, DatasetPart::Tile { filename }))) =
                    kart_dataset::decode_path(&path)
                else {
                    continue;
                };
                let new_id = match &change {
                    kart_diff::RawChange::Added { new_id, .. } | kart_diff::RawChange::Modified { new_id, .. } => {
                        Some(*new_id)
                    }
                    kart_diff::RawChange::Deleted { .. } => None,
                };
                let Some(new_id) = new_id else { continue };
                record_if_tile_pointer(store, new_id, &path, &dataset_path, &filename, &mut out, &mut seen)?;
            }
        }
    }

    Ok(out)
}

fn walk_tree_for_tiles(
    store: &dyn ObjectStore,
    tree: ObjectId,
    out: &mut Vec<LfsFileRecord>,
    seen: &mut BTreeSet<kart_crypto::Sha256Oid>,
) -> LfsResult<()> {
    walk_into(store, tree, "", out, seen)
}

fn walk_into(
    store: &dyn ObjectStore,
    tree_id: ObjectId,
    prefix: &str,
    out: &mut Vec<LfsFileRecord>,
    seen: &mut BTreeSet<kart_crypto::Sha256Oid>,
) -> LfsResult<()> {
    let Some(tree) = store.read_tree(&tree_id)? else {
        return Ok(());
    };
    for entry in &tree.entries {
        let full_path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}/{}", entry.name)
        };
        if entry.mode.is_tree() {
            walk_into(store, entry.id, &full_path, out, seen)?;
            continue;
        }
        let Ok(Some((dataset_path, _kind, _version, DatasetPart::Tile { filename }))) =
            kart_dataset::decode_path(&full_path)
        else {
            continue;
        };
        record_if_tile_pointer(store, entry.id, &full_path, &dataset_path, &filename, out, seen)?;
    }
    Ok(())
}

fn record_if_tile_pointer(
    store: &dyn ObjectStore,
    blob_id: ObjectId,
    path: &str,
    _dataset_path: &kart_types::DatasetPath,
    _filename: &str,
    out: &mut Vec<LfsFileRecord>,
    seen: &mut BTreeSet<kart_crypto::Sha256Oid>,
) -> LfsResult<()> {
    let Some(bytes) = store.read_blob(&blob_id)? else {
        return Ok(());
    };
    let Ok(pointer) = kart_dataset::decode_tile_pointer(&bytes) else {
        return Ok(());
    };
    if seen.insert(pointer.oid) {
        out.push(LfsFileRecord {
            oid: pointer.oid,
            size: pointer.size,
            path: path.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_dataset::{encode_tile_pointer, TilePointer};
    use kart_store::{EntryMode, GitObjectStore};
    use tempfile::tempdir;

    #[test]
    fn single_tree_lists_every_tile_pointer() {
        let dir = tempdir().unwrap();
        let store = GitObjectStore::init_bare(dir.path()).unwrap();

        let pointer = TilePointer::new(kart_crypto::Sha256Oid::of(b"content"), 42);
        let bytes = encode_tile_pointer(&pointer);
        let blob = store.write_blob(&bytes).unwrap();

        let mut editor = store.tree_editor(None);
        editor.insert("imagery/.raster-dataset.v1/tile/ab/tile_0_0.tif", blob, EntryMode::Blob);
        let root = editor.flush().unwrap();

        let records = ls_files(&store, TreeRange::Single(root)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].oid, pointer.oid);
        assert_eq!(records[0].size, 42);
    }

    #[test]
    fn non_tile_blobs_are_ignored() {
        let dir = tempdir().unwrap();
        let store = GitObjectStore::init_bare(dir.path()).unwrap();
        let blob = store.write_blob(b"not a pointer").unwrap();
        let mut editor = store.tree_editor(None);
        editor.insert("points/.table-dataset.v3/feature/ab/cd/x", blob, EntryMode::Blob);
        let root = editor.flush().unwrap();

        let records = ls_files(&store, TreeRange::Single(root)).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn duplicate_oid_across_paths_counted_once() {
        let dir = tempdir().unwrap();
        let store = GitObjectStore::init_bare(dir.path()).unwrap();
        let pointer = TilePointer::new(kart_crypto::Sha256Oid::of(b"same content"), 10);
        let bytes = encode_tile_pointer(&pointer);
        let blob = store.write_blob(&bytes).unwrap();

        let mut editor = store.tree_editor(None);
        editor.insert("a/.raster-dataset.v1/tile/00/t1.tif", blob, EntryMode::Blob);
        editor.insert("b/.raster-dataset.v1/tile/00/t2.tif", blob, EntryMode::Blob);
        let root = editor.flush().unwrap();

        let records = ls_files(&store, TreeRange::Single(root)).unwrap();
        assert_eq!(records.len(), 1);
    }
}
