use std::collections::BTreeMap;

use kart_store::{EntryMode, ObjectId, ObjectStore, TreeEntry};

use crate::error::{MergeError, MergeResult};
use crate::index::{MergeIndex, Resolve};

fn tree_sort_key(entry: &TreeEntry) -> String {
    if entry.mode.is_tree() {
        format!("{}/", entry.name)
    } else {
        entry.name.clone()
    }
}

/// Build a tree object from a flat path -> (id, mode) map, the same bottom-up
/// way [`kart_store::TreeEditor`] does, but written purely in terms of the
/// [`ObjectStore`] trait since a finalising merge doesn't otherwise need a
/// concrete git-backed store.
fn build_tree(
    store: &dyn ObjectStore,
    paths: &BTreeMap<String, (ObjectId, EntryMode)>,
) -> MergeResult<ObjectId> {
    let mut direct: Vec<TreeEntry> = Vec::new();
    let mut nested: BTreeMap<String, BTreeMap<String, (ObjectId, EntryMode)>> = BTreeMap::new();

    for (path, (id, mode)) in paths {
        match path.split_once('/') {
            Some((head, rest)) => {
                nested
                    .entry(head.to_string())
                    .or_default()
                    .insert(rest.to_string(), (*id, *mode));
            }
            None => direct.push(TreeEntry {
                name: path.clone(),
                mode: *mode,
                id: *id,
            }),
        }
    }

    for (name, sub) in nested {
        let sub_id = build_tree(store, &sub)?;
        direct.push(TreeEntry {
            name,
            mode: EntryMode::Tree,
            id: sub_id,
        });
    }

    direct.sort_by(|a, b| tree_sort_key(a).cmp(&tree_sort_key(b)));
    Ok(store.write_tree(&direct)?)
}

/// Apply every recorded resolution to a fully-resolved merge index and
/// write out the resulting tree. Fails with [`MergeError::UnresolvedConflicts`]
/// if any conflict still lacks a resolve -- callers should check
/// [`MergeIndex::is_fully_resolved`] first if they want a nicer error for
/// the user, this is the final guard.
pub fn finalise_tree(store: &dyn ObjectStore, index: &MergeIndex) -> MergeResult<ObjectId> {
    let unresolved = index.unresolved_keys().len();
    if unresolved > 0 {
        return Err(MergeError::UnresolvedConflicts(unresolved));
    }

    let mut paths: BTreeMap<String, (ObjectId, EntryMode)> = index
        .entries
        .iter()
        .map(|(path, (id, mode))| (path.clone(), (*id, EntryMode::from(*mode))))
        .collect();

    for (key, variants) in &index.conflicts {
        let resolve = index
            .resolves
            .get(key)
            .expect("is_fully_resolved guaranteed every conflict has a resolve");
        match resolve {
            Resolve::Delete => {
                if let Some(entry) = variants
                    .ours
                    .as_ref()
                    .or(variants.theirs.as_ref())
                    .or(variants.ancestor.as_ref())
                {
                    paths.remove(&entry.path);
                }
            }
            Resolve::Merged(entry) => {
                paths.insert(entry.path.clone(), (entry.id, EntryMode::from(entry.mode)));
            }
            Resolve::KeepBoth { ours, theirs } => {
                paths.insert(ours.path.clone(), (ours.id, EntryMode::from(ours.mode)));
                let alt_path = format!("{}__theirs", theirs.path);
                paths.insert(alt_path, (theirs.id, EntryMode::from(theirs.mode)));
            }
        }
    }

    build_tree(store, &paths)
}
