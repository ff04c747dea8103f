//! Blob-level tree-to-tree diff: walk two trees in lockstep, recursing into
//! matching subtrees, and yield one change per full path whose blob differs.
//!
//! This is the flat layer the dataset-aware diff in [`crate::delta`] builds
//! on: it doesn't know about datasets, features or tiles, only about paths
//! and object ids, the same way the underlying object store sees them.

use std::collections::BTreeMap;

use kart_store::{EntryMode, ObjectId, ObjectStore, TreeEntry};

use crate::error::DiffResult;

/// One change between two trees at a single path. `path` is fully
/// qualified (slash-joined) from the tree root.
#[derive(Clone, Debug, PartialEq)]
pub enum RawChange {
    Added {
        path: String,
        new_id: ObjectId,
        mode: EntryMode,
    },
    Deleted {
        path: String,
        old_id: ObjectId,
        mode: EntryMode,
    },
    Modified {
        path: String,
        old_id: ObjectId,
        new_id: ObjectId,
        mode: EntryMode,
    },
}

impl RawChange {
    pub fn path(&self) -> &str {
        match self {
            RawChange::Added { path, .. }
            | RawChange::Deleted { path, .. }
            | RawChange::Modified { path, .. } => path,
        }
    }
}

/// Recursively diff `old_tree` (or an empty tree, if `None`) against
/// `new_tree`, descending into any subtree present on both sides and
/// treating a subtree present on only one side as a whole-subtree
/// add/delete expanded to its leaf blobs.
pub fn diff_tree_to_tree(
    store: &dyn ObjectStore,
    old_tree: Option<ObjectId>,
    new_tree: ObjectId,
) -> DiffResult<Vec<RawChange>> {
    let mut out = Vec::new();
    diff_into(store, old_tree, Some(new_tree), "", &mut out)?;
    Ok(out)
}

fn diff_into(
    store: &dyn ObjectStore,
    old_id: Option<ObjectId>,
    new_id: Option<ObjectId>,
    prefix: &str,
    out: &mut Vec<RawChange>,
) -> DiffResult<()> {
    let old_entries = match old_id {
        Some(id) => entries_by_name(store, &id)?,
        None => BTreeMap::new(),
    };
    let new_entries = match new_id {
        Some(id) => entries_by_name(store, &id)?,
        None => BTreeMap::new(),
    };

    let mut names: Vec<&String> = old_entries.keys().chain(new_entries.keys()).collect();
    names.sort();
    names.dedup();

    for name in names {
        let full_path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        let old_entry = old_entries.get(name);
        let new_entry = new_entries.get(name);

        match (old_entry, new_entry) {
            (Some(o), Some(n)) if o.mode.is_tree() && n.mode.is_tree() => {
                if o.id != n.id {
                    diff_into(store, Some(o.id), Some(n.id), &full_path, out)?;
                }
            }
            (Some(o), Some(n)) if o.mode.is_tree() != n.mode.is_tree() => {
                // a tree became a blob or vice versa: model as delete-then-add
                if o.mode.is_tree() {
                    diff_into(store, Some(o.id), None, &full_path, out)?;
                } else {
                    out.push(RawChange::Deleted {
                        path: full_path.clone(),
                        old_id: o.id,
                        mode: o.mode,
                    });
                }
                if n.mode.is_tree() {
                    diff_into(store, None, Some(n.id), &full_path, out)?;
                } else {
                    out.push(RawChange::Added {
                        path: full_path,
                        new_id: n.id,
                        mode: n.mode,
                    });
                }
            }
            (Some(o), Some(n)) => {
                if o.id != n.id {
                    out.push(RawChange::Modified {
                        path: full_path,
                        old_id: o.id,
                        new_id: n.id,
                        mode: n.mode,
                    });
                }
            }
            (Some(o), None) => {
                if o.mode.is_tree() {
                    diff_into(store, Some(o.id), None, &full_path, out)?;
                } else {
                    out.push(RawChange::Deleted {
                        path: full_path,
                        old_id: o.id,
                        mode: o.mode,
                    });
                }
            }
            (None, Some(n)) => {
                if n.mode.is_tree() {
                    diff_into(store, None, Some(n.id), &full_path, out)?;
                } else {
                    out.push(RawChange::Added {
                        path: full_path,
                        new_id: n.id,
                        mode: n.mode,
                    });
                }
            }
            (None, None) => unreachable!("name came from one of the two maps"),
        }
    }

    Ok(())
}

fn entries_by_name(store: &dyn ObjectStore, id: &ObjectId) -> DiffResult<BTreeMap<String, TreeEntry>> {
    let tree = store
        .read_tree(id)?
        .ok_or(crate::error::DiffError::ObjectNotFound(*id))?;
    Ok(tree.entries.into_iter().map(|e| (e.name.clone(), e)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_store::GitObjectStore;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, GitObjectStore) {
        let dir = tempdir().unwrap();
        let s = GitObjectStore::init_bare(dir.path()).unwrap();
        (dir, s)
    }

    #[test]
    fn detects_addition_in_nested_subtree() {
        let (_d, s) = store();
        let blob = s.write_blob(b"hello").unwrap();
        let mut editor = s.tree_editor(None);
        editor.insert("a/b/c.txt", blob, EntryMode::Blob);
        let new_root = editor.flush().unwrap();

        let changes = diff_tree_to_tree(&s, None, new_root).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path(), "a/b/c.txt");
        assert!(matches!(changes[0], RawChange::Added { .. }));
    }

    #[test]
    fn identical_trees_produce_no_changes() {
        let (_d, s) = store();
        let blob = s.write_blob(b"x").unwrap();
        let mut editor = s.tree_editor(None);
        editor.insert("file.txt", blob, EntryMode::Blob);
        let root = editor.flush().unwrap();

        let changes = diff_tree_to_tree(&s, Some(root), root).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn detects_modification_deep_in_tree() {
        let (_d, s) = store();
        let blob1 = s.write_blob(b"v1").unwrap();
        let blob2 = s.write_blob(b"v2").unwrap();

        let mut e1 = s.tree_editor(None);
        e1.insert("ds/feature/00/00/xyz", blob1, EntryMode::Blob);
        let root1 = e1.flush().unwrap();

        let mut e2 = s.tree_editor(Some(root1));
        e2.insert("ds/feature/00/00/xyz", blob2, EntryMode::Blob);
        let root2 = e2.flush().unwrap();

        let changes = diff_tree_to_tree(&s, Some(root1), root2).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], RawChange::Modified { .. }));
    }
}
