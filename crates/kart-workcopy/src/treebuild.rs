use std::collections::BTreeMap;

use kart_store::{EntryMode, ObjectId, ObjectStore, StoreResult, TreeEntry};

/// Flatten a tree (recursively) into a full path -> (id, mode) map. Mirrors
/// the same pattern used by the diff and merge engines to walk a tree
/// without a dataset-aware lens.
pub fn flatten_tree(
    store: &dyn ObjectStore,
    tree_id: Option<ObjectId>,
) -> StoreResult<BTreeMap<String, (ObjectId, EntryMode)>> {
    let mut out = BTreeMap::new();
    if let Some(tree_id) = tree_id {
        walk(store, tree_id, "", &mut out)?;
    }
    Ok(out)
}

fn walk(
    store: &dyn ObjectStore,
    tree_id: ObjectId,
    prefix: &str,
    out: &mut BTreeMap<String, (ObjectId, EntryMode)>,
) -> StoreResult<()> {
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
            walk(store, entry.id, &path, out)?;
        } else {
            out.insert(path, (entry.id, entry.mode));
        }
    }
    Ok(())
}

fn sort_key(name: &str, is_tree: bool) -> String {
    if is_tree {
        format!("{name}/")
    } else {
        name.to_string()
    }
}

/// Rebuild a tree bottom-up from a flat path map, grouping by first path
/// segment at each level. `TreeEditor` does the same thing but is only
/// reachable through the concrete git-backed store, not the trait object
/// this crate holds.
pub fn build_tree(store: &dyn ObjectStore, paths: &BTreeMap<String, (ObjectId, EntryMode)>) -> StoreResult<ObjectId> {
    build_level(store, paths, "")
}

fn build_level(
    store: &dyn ObjectStore,
    paths: &BTreeMap<String, (ObjectId, EntryMode)>,
    prefix: &str,
) -> StoreResult<ObjectId> {
    let mut groups: BTreeMap<String, BTreeMap<String, (ObjectId, EntryMode)>> = BTreeMap::new();
    let mut direct: BTreeMap<String, (ObjectId, EntryMode)> = BTreeMap::new();

    for (path, value) in paths {
        let Some(rest) = path.strip_prefix(prefix) else { continue };
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        if rest.is_empty() {
            continue;
        }
        match rest.split_once('/') {
            Some((first, remainder)) => {
                let full_child = if prefix.is_empty() {
                    first.to_string()
                } else {
                    format!("{prefix}/{first}")
                };
                groups
                    .entry(first.to_string())
                    .or_default()
                    .insert(format!("{full_child}/{remainder}"), *value);
            }
            None => {
                direct.insert(rest.to_string(), *value);
            }
        }
    }

    let mut entries = Vec::new();
    for (name, value) in direct {
        entries.push((name, value.0, value.1));
    }
    for (name, children) in groups {
        let child_prefix = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        let subtree_id = build_level(store, &children, &child_prefix)?;
        entries.push((name, subtree_id, EntryMode::Tree));
    }

    entries.sort_by(|a, b| sort_key(&a.0, a.2.is_tree()).cmp(&sort_key(&b.0, b.2.is_tree())));
    let tree_entries: Vec<TreeEntry> = entries
        .into_iter()
        .map(|(name, id, mode)| TreeEntry { name, mode, id })
        .collect();
    store.write_tree(&tree_entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_store::GitObjectStore;
    use tempfile::tempdir;

    #[test]
    fn flatten_then_build_round_trips() {
        let dir = tempdir().unwrap();
        let store = GitObjectStore::init_bare(dir.path()).unwrap();
        let blob = store.write_blob(b"x").unwrap();
        let mut editor = store.tree_editor(None);
        editor.insert("a/b/c", blob, EntryMode::Blob);
        editor.insert("a/d", blob, EntryMode::Blob);
        let tree_id = editor.flush().unwrap();

        let flat = flatten_tree(&store, Some(tree_id)).unwrap();
        assert_eq!(flat.len(), 2);

        let rebuilt = build_tree(&store, &flat).unwrap();
        assert_eq!(rebuilt, tree_id);
    }
}
