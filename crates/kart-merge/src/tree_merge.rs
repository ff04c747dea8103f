use std::collections::BTreeMap;

use kart_dataset::{merge_meta_item, DatasetPart, MetaMergeOutcome};
use kart_store::{EntryMode, ObjectId, ObjectStore};
use kart_types::DatasetPath;

use crate::conflict::{classify, ConflictPart};
use crate::error::MergeResult;
use crate::index::{AncestorOursTheirs, ConflictEntry, MergeIndex};
use crate::mode::Mode;

/// Recursively flatten a tree into full slash-separated paths mapped to
/// their blob/tree entry. Used to compare the three sides of a merge
/// path-by-path without walking all three trees in lockstep.
fn flatten_tree(
    store: &dyn ObjectStore,
    tree_id: Option<ObjectId>,
    prefix: &str,
    out: &mut BTreeMap<String, (ObjectId, EntryMode)>,
) -> MergeResult<()> {
    let Some(tree_id) = tree_id else { return Ok(()) };
    let Some(tree) = store.read_tree(&tree_id)? else {
        return Ok(());
    };
    for entry in &tree.entries {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}/{}", entry.name)
        };
        if entry.mode.is_tree() {
            flatten_tree(store, Some(entry.id), &path, out)?;
        } else {
            out.insert(path, (entry.id, entry.mode));
        }
    }
    Ok(())
}

/// Sort key used to assign stable, deterministic conflict numbers: dataset
/// path, then part (meta before feature/tile), then item name within the
/// part (§4.6).
fn sort_key(path: &str) -> (String, u8, String) {
    match kart_dataset::decode_path(path) {
        Ok(Some((dataset_path, _kind, _version, part))) => match part {
            DatasetPart::Meta { item_name } => (dataset_path.as_str().to_string(), 0, item_name),
            DatasetPart::Feature { filename } => (dataset_path.as_str().to_string(), 1, filename),
            DatasetPart::Tile { filename } => (dataset_path.as_str().to_string(), 2, filename),
        },
        _ => (String::new(), 255, path.to_string()),
    }
}

fn conflict_part_for(path: &str) -> ConflictPart {
    match kart_dataset::decode_path(path) {
        Ok(Some((_, _, _, DatasetPart::Meta { .. }))) => ConflictPart::Meta,
        Ok(Some((_, _, _, DatasetPart::Feature { .. } | DatasetPart::Tile { .. }))) => ConflictPart::Feature,
        _ => ConflictPart::None,
    }
}

fn is_meta_path(path: &str) -> bool {
    matches!(conflict_part_for(path), ConflictPart::Meta)
}

fn to_entry(path: &str, slot: Option<&(ObjectId, EntryMode)>) -> Option<ConflictEntry> {
    slot.map(|(id, mode)| ConflictEntry {
        path: path.to_string(),
        id: *id,
        mode: Mode::from(*mode),
    })
}

/// Merge three trees path-by-path (§4.4 raw layer, generalised to three
/// inputs): byte-equal and unchanged-side-takes-other's-edit merges are
/// resolved automatically and land in `entries`; meta items additionally go
/// through the category-label merge policy before falling back to a
/// conflict; everything else that disagrees becomes a numbered conflict in
/// stable (dataset, part, item) order.
pub fn three_way_merge(
    store: &dyn ObjectStore,
    base_tree: Option<ObjectId>,
    ours_tree: Option<ObjectId>,
    theirs_tree: Option<ObjectId>,
) -> MergeResult<MergeIndex> {
    let mut base = BTreeMap::new();
    let mut ours = BTreeMap::new();
    let mut theirs = BTreeMap::new();
    flatten_tree(store, base_tree, "", &mut base)?;
    flatten_tree(store, ours_tree, "", &mut ours)?;
    flatten_tree(store, theirs_tree, "", &mut theirs)?;

    let mut paths: Vec<&String> = base.keys().chain(ours.keys()).chain(theirs.keys()).collect();
    paths.sort();
    paths.dedup();

    let mut index = MergeIndex::new();
    let mut pending: Vec<AncestorOursTheirs<ConflictEntry>> = Vec::new();

    for path in paths {
        let b = base.get(path);
        let o = ours.get(path);
        let t = theirs.get(path);

        if o == t {
            if let Some((id, mode)) = o {
                index.entries.insert(path.clone(), (*id, Mode::from(*mode)));
            }
            continue;
        }
        if o == b {
            if let Some((id, mode)) = t {
                index.entries.insert(path.clone(), (*id, Mode::from(*mode)));
            }
            continue;
        }
        if t == b {
            if let Some((id, mode)) = o {
                index.entries.insert(path.clone(), (*id, Mode::from(*mode)));
            }
            continue;
        }

        if is_meta_path(path) {
            let read = |slot: Option<&(ObjectId, EntryMode)>| -> MergeResult<Option<Vec<u8>>> {
                match slot {
                    Some((id, _)) => Ok(store.read_blob(id)?),
                    None => Ok(None),
                }
            };
            let ab = read(b)?;
            let ob = read(o)?;
            let tb = read(t)?;
            match merge_meta_item(ab.as_deref(), ob.as_deref(), tb.as_deref()) {
                MetaMergeOutcome::Merged(bytes) => {
                    let id = store.write_blob(&bytes)?;
                    index.entries.insert(path.clone(), (id, Mode::Blob));
                    continue;
                }
                MetaMergeOutcome::MergedMap(map) => {
                    let bytes = serde_json::to_vec(&map)?;
                    let id = store.write_blob(&bytes)?;
                    index.entries.insert(path.clone(), (id, Mode::Blob));
                    continue;
                }
                MetaMergeOutcome::ListOfConflicts(_) => {
                    // fall through to the standard conflict representation
                }
            }
        }

        pending.push(AncestorOursTheirs::new(
            to_entry(path, b),
            to_entry(path, o),
            to_entry(path, t),
        ));
    }

    pending.sort_by_key(|v| sort_key(representative_path(v)));
    for (i, variants) in pending.into_iter().enumerate() {
        index.conflicts.insert(i.to_string(), variants);
    }

    Ok(index)
}

fn representative_path(variants: &AncestorOursTheirs<ConflictEntry>) -> &str {
    variants
        .ancestor
        .as_ref()
        .or(variants.ours.as_ref())
        .or(variants.theirs.as_ref())
        .map(|e| e.path.as_str())
        .unwrap_or("")
}

/// Classify every conflict currently in `index`, in key order. Convenience
/// wrapper over [`crate::conflict::classify`] for callers (e.g. `kart
/// conflicts`) that want a human-readable category alongside each key.
pub fn classify_all(
    index: &MergeIndex,
) -> Vec<(String, crate::conflict::ConflictCategory)> {
    let mut out = Vec::with_capacity(index.conflicts.len());
    for (key, variants) in &index.conflicts {
        let path = representative_path(variants);
        out.push((key.clone(), classify(conflict_part_for(path), variants)));
    }
    out
}

/// Dataset-level summary built on top of the per-path conflicts: a dataset
/// that was freshly created (its whole marker subtree is add/add) on both
/// sides, or deleted wholesale on one side while edited on the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatasetConflictKind {
    AddAdd,
    DeleteEdit,
}

/// Roll per-path conflicts up to the dataset level: every conflicting path
/// under a dataset shares the same shape (all add/add, or a uniform
/// delete-vs-edit), which a caller can surface as one summary line instead
/// of one per feature/meta item.
pub fn summarise_dataset_conflicts(index: &MergeIndex) -> BTreeMap<DatasetPath, DatasetConflictKind> {
    let mut by_dataset: BTreeMap<DatasetPath, Vec<&AncestorOursTheirs<ConflictEntry>>> = BTreeMap::new();

    for variants in index.conflicts.values() {
        let path = representative_path(variants);
        if path.is_empty() {
            continue;
        }
        let Ok(Some((dataset_path, _, _, _))) = kart_dataset::decode_path(path) else {
            continue;
        };
        by_dataset.entry(dataset_path).or_default().push(variants);
    }

    let mut out = BTreeMap::new();
    for (dataset, conflicts) in by_dataset {
        let all_add_add = conflicts.iter().all(|v| v.ancestor.is_none());
        let any_one_sided_delete = conflicts
            .iter()
            .any(|v| v.ancestor.is_some() && (v.ours.is_none() || v.theirs.is_none()));
        if all_add_add {
            out.insert(dataset, DatasetConflictKind::AddAdd);
        } else if any_one_sided_delete {
            out.insert(dataset, DatasetConflictKind::DeleteEdit);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_store::GitObjectStore;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, GitObjectStore) {
        let dir = tempdir().unwrap();
        let store = GitObjectStore::init_bare(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn non_overlapping_edits_merge_without_conflict() {
        let (_dir, store) = store();
        let base_blob = store.write_blob(b"base").unwrap();
        let mut e = store.tree_editor(None);
        e.insert("a.txt", base_blob, EntryMode::Blob);
        e.insert("b.txt", base_blob, EntryMode::Blob);
        let base_tree = e.flush().unwrap();

        let ours_blob = store.write_blob(b"ours edit").unwrap();
        let mut e = store.tree_editor(Some(base_tree));
        e.insert("a.txt", ours_blob, EntryMode::Blob);
        let ours_tree = e.flush().unwrap();

        let theirs_blob = store.write_blob(b"theirs edit").unwrap();
        let mut e = store.tree_editor(Some(base_tree));
        e.insert("b.txt", theirs_blob, EntryMode::Blob);
        let theirs_tree = e.flush().unwrap();

        let index = three_way_merge(&store, Some(base_tree), Some(ours_tree), Some(theirs_tree)).unwrap();
        assert!(index.conflicts.is_empty());
        assert_eq!(index.entries.get("a.txt").unwrap().0, ours_blob);
        assert_eq!(index.entries.get("b.txt").unwrap().0, theirs_blob);
    }

    #[test]
    fn conflicting_edits_to_the_same_feature_produce_a_conflict() {
        let (_dir, store) = store();
        let base_blob = store.write_blob(b"base feature").unwrap();
        let mut e = store.tree_editor(None);
        e.insert(
            "roads/.table-dataset.v3/feature/ab/cd/pk1",
            base_blob,
            EntryMode::Blob,
        );
        let base_tree = e.flush().unwrap();

        let ours_blob = store.write_blob(b"ours feature").unwrap();
        let mut e = store.tree_editor(Some(base_tree));
        e.insert(
            "roads/.table-dataset.v3/feature/ab/cd/pk1",
            ours_blob,
            EntryMode::Blob,
        );
        let ours_tree = e.flush().unwrap();

        let theirs_blob = store.write_blob(b"theirs feature").unwrap();
        let mut e = store.tree_editor(Some(base_tree));
        e.insert(
            "roads/.table-dataset.v3/feature/ab/cd/pk1",
            theirs_blob,
            EntryMode::Blob,
        );
        let theirs_tree = e.flush().unwrap();

        let index = three_way_merge(&store, Some(base_tree), Some(ours_tree), Some(theirs_tree)).unwrap();
        assert_eq!(index.conflicts.len(), 1);
        let variants = index.conflicts.get("0").unwrap();
        assert_eq!(variants.ancestor.as_ref().unwrap().id, base_blob);
        assert_eq!(variants.ours.as_ref().unwrap().id, ours_blob);
        assert_eq!(variants.theirs.as_ref().unwrap().id, theirs_blob);
    }

    #[test]
    fn disagreeing_meta_items_still_conflict_after_merge_policy_fails() {
        let (_dir, store) = store();
        let base_blob = store.write_blob(b"v1").unwrap();
        let mut e = store.tree_editor(None);
        e.insert("roads/.table-dataset.v3/meta/title", base_blob, EntryMode::Blob);
        let base_tree = e.flush().unwrap();

        let ours_blob = store.write_blob(b"v2").unwrap();
        let mut e = store.tree_editor(Some(base_tree));
        e.insert("roads/.table-dataset.v3/meta/title", ours_blob, EntryMode::Blob);
        let ours_tree = e.flush().unwrap();

        let theirs_blob = store.write_blob(b"v3").unwrap();
        let mut e = store.tree_editor(Some(base_tree));
        e.insert("roads/.table-dataset.v3/meta/title", theirs_blob, EntryMode::Blob);
        let theirs_tree = e.flush().unwrap();

        let index = three_way_merge(&store, Some(base_tree), Some(ours_tree), Some(theirs_tree)).unwrap();
        assert_eq!(index.conflicts.len(), 1);
    }

    #[test]
    fn category_label_meta_maps_auto_merge_through_tree_merge() {
        let (_dir, store) = store();
        let base_blob = store.write_blob(br#"{"1":"road"}"#).unwrap();
        let mut e = store.tree_editor(None);
        e.insert(
            "roads/.table-dataset.v3/meta/category-labels.json",
            base_blob,
            EntryMode::Blob,
        );
        let base_tree = e.flush().unwrap();

        let ours_blob = store.write_blob(br#"{"1":"road","2":"river"}"#).unwrap();
        let mut e = store.tree_editor(Some(base_tree));
        e.insert(
            "roads/.table-dataset.v3/meta/category-labels.json",
            ours_blob,
            EntryMode::Blob,
        );
        let ours_tree = e.flush().unwrap();

        let theirs_blob = store.write_blob(br#"{"1":"road","3":"rail"}"#).unwrap();
        let mut e = store.tree_editor(Some(base_tree));
        e.insert(
            "roads/.table-dataset.v3/meta/category-labels.json",
            theirs_blob,
            EntryMode::Blob,
        );
        let theirs_tree = e.flush().unwrap();

        let index = three_way_merge(&store, Some(base_tree), Some(ours_tree), Some(theirs_tree)).unwrap();
        assert!(index.conflicts.is_empty());
        assert!(index
            .entries
            .contains_key("roads/.table-dataset.v3/meta/category-labels.json"));
    }

    #[test]
    fn dataset_created_fresh_on_both_sides_summarises_as_add_add() {
        let (_dir, store) = store();
        let mut e = store.tree_editor(None);
        let ours_blob = store.write_blob(b"ours schema").unwrap();
        e.insert("roads/.table-dataset.v3/meta/schema.json", ours_blob, EntryMode::Blob);
        let ours_tree = e.flush().unwrap();

        let mut e = store.tree_editor(None);
        let theirs_blob = store.write_blob(b"theirs schema").unwrap();
        e.insert(
            "roads/.table-dataset.v3/meta/schema.json",
            theirs_blob,
            EntryMode::Blob,
        );
        let theirs_tree = e.flush().unwrap();

        let index = three_way_merge(&store, None, Some(ours_tree), Some(theirs_tree)).unwrap();
        assert_eq!(index.conflicts.len(), 1);
        let summary = summarise_dataset_conflicts(&index);
        let dataset = kart_types::DatasetPath::new("roads").unwrap();
        assert_eq!(summary.get(&dataset), Some(&DatasetConflictKind::AddAdd));
    }
}
