//! Merge engine (§4.6).
//!
//! Three-way merges a base/ours/theirs set of trees, auto-resolving
//! everything that can be resolved without a human (byte-equal values,
//! unchanged-side edits, and the tile-dataset meta merge policy from
//! `kart-dataset`) and leaving the rest as a numbered, persistable
//! [`MergeIndex`] of conflicts. Resolving a conflict and finalising the
//! merge are separate steps so a merge can be worked on incrementally,
//! across process restarts, one key at a time.

pub mod conflict;
pub mod error;
pub mod finalise;
pub mod index;
pub mod mode;
pub mod session;
pub mod tree_merge;

pub use conflict::{classify, ConflictCategory, ConflictPart};
pub use error::{MergeError, MergeResult};
pub use finalise::finalise_tree;
pub use index::{AncestorOursTheirs, ConflictEntry, MergeIndex, Resolve};
pub use mode::Mode;
pub use session::MergeSession;
pub use tree_merge::{classify_all, summarise_dataset_conflicts, three_way_merge, DatasetConflictKind};

use kart_store::{ObjectId, ObjectStore, StoreError};

/// How fast-forward merges should be handled, mirroring `kart merge`'s
/// `--ff`/`--no-ff`/`--ff-only` flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FastForwardMode {
    /// Fast-forward when possible, otherwise do a real merge (the default).
    Auto,
    /// Refuse to do anything but a fast-forward.
    Only,
    /// Always create a merge commit, even when a fast-forward is possible.
    Never,
}

/// What a merge attempt resolved to before any commit is written.
#[derive(Clone, Debug)]
pub enum MergeOutcome {
    /// `theirs` is already an ancestor of `ours` (or identical) -- nothing
    /// to do.
    UpToDate,
    /// `ours` is an ancestor of `theirs`: the branch can simply be moved.
    FastForward { commit: ObjectId, tree: ObjectId },
    /// A real three-way merge was performed. `index.conflicts` may be
    /// empty, in which case the caller can finalise immediately.
    Resolved { index: MergeIndex },
}

/// Plan a merge of `theirs` into `ours`, given their merge base. Does not
/// write a commit: for a fast-forward the caller still has to move the
/// branch ref, and for a real merge the caller still has to resolve any
/// conflicts and call [`finalise_tree`] (§4.6, `kart merge`).
///
/// `base` is `None` when the two commits share no common ancestor; most
/// callers should refuse to proceed in that case, which is exactly what
/// this function does (testable property 8 only covers the related-history
/// case).
pub fn plan_merge(
    store: &dyn ObjectStore,
    base: Option<ObjectId>,
    ours: ObjectId,
    theirs: ObjectId,
    ff: FastForwardMode,
) -> MergeResult<MergeOutcome> {
    let Some(base) = base else {
        return Err(MergeError::Unrelated);
    };

    if base == theirs {
        return Ok(MergeOutcome::UpToDate);
    }

    let can_fast_forward = base == ours;
    if matches!(ff, FastForwardMode::Only) && !can_fast_forward {
        return Err(MergeError::NotFastForward);
    }

    if can_fast_forward && !matches!(ff, FastForwardMode::Never) {
        let theirs_commit = store
            .read_commit(&theirs)?
            .ok_or(StoreError::NotFound(theirs))?;
        return Ok(MergeOutcome::FastForward {
            commit: theirs,
            tree: theirs_commit.tree_id,
        });
    }

    let base_commit = store.read_commit(&base)?.ok_or(StoreError::NotFound(base))?;
    let ours_commit = store.read_commit(&ours)?.ok_or(StoreError::NotFound(ours))?;
    let theirs_commit = store
        .read_commit(&theirs)?
        .ok_or(StoreError::NotFound(theirs))?;

    let index = three_way_merge(
        store,
        Some(base_commit.tree_id),
        Some(ours_commit.tree_id),
        Some(theirs_commit.tree_id),
    )?;

    Ok(MergeOutcome::Resolved { index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_store::{CommitInfo, EntryMode, GitObjectStore};
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, GitObjectStore) {
        let dir = tempdir().unwrap();
        let store = GitObjectStore::init_bare(dir.path()).unwrap();
        (dir, store)
    }

    fn commit(store: &GitObjectStore, tree_id: ObjectId, parents: Vec<ObjectId>) -> ObjectId {
        store
            .write_commit(&CommitInfo {
                tree_id,
                parent_ids: parents,
                author_name: "Kart".into(),
                author_email: "kart@example.com".into(),
                author_time: 0,
                author_tz_offset_minutes: 0,
                committer_name: "Kart".into(),
                committer_email: "kart@example.com".into(),
                committer_time: 0,
                committer_tz_offset_minutes: 0,
                message: "m".into(),
            })
            .unwrap()
    }

    #[test]
    fn up_to_date_when_base_equals_theirs() {
        let (_dir, store) = store();
        let blob = store.write_blob(b"x").unwrap();
        let mut e = store.tree_editor(None);
        e.insert("a", blob, EntryMode::Blob);
        let tree = e.flush().unwrap();
        let c = commit(&store, tree, vec![]);

        let outcome = plan_merge(&store, Some(c), c, c, FastForwardMode::Auto).unwrap();
        assert!(matches!(outcome, MergeOutcome::UpToDate));
    }

    #[test]
    fn fast_forwards_when_ours_equals_base() {
        let (_dir, store) = store();
        let blob1 = store.write_blob(b"v1").unwrap();
        let mut e = store.tree_editor(None);
        e.insert("a", blob1, EntryMode::Blob);
        let base_tree = e.flush().unwrap();
        let base_commit = commit(&store, base_tree, vec![]);

        let blob2 = store.write_blob(b"v2").unwrap();
        let mut e = store.tree_editor(Some(base_tree));
        e.insert("a", blob2, EntryMode::Blob);
        let theirs_tree = e.flush().unwrap();
        let theirs_commit = commit(&store, theirs_tree, vec![base_commit]);

        let outcome = plan_merge(
            &store,
            Some(base_commit),
            base_commit,
            theirs_commit,
            FastForwardMode::Auto,
        )
        .unwrap();
        match outcome {
            MergeOutcome::FastForward { commit, tree } => {
                assert_eq!(commit, theirs_commit);
                assert_eq!(tree, theirs_tree);
            }
            other => panic!("expected FastForward, got {other:?}"),
        }
    }

    #[test]
    fn ff_only_rejects_a_real_merge() {
        let (_dir, store) = store();
        let blob = store.write_blob(b"base").unwrap();
        let mut e = store.tree_editor(None);
        e.insert("a", blob, EntryMode::Blob);
        let base_tree = e.flush().unwrap();
        let base_commit = commit(&store, base_tree, vec![]);

        let ours_blob = store.write_blob(b"ours").unwrap();
        let mut e = store.tree_editor(Some(base_tree));
        e.insert("a", ours_blob, EntryMode::Blob);
        let ours_tree = e.flush().unwrap();
        let ours_commit = commit(&store, ours_tree, vec![base_commit]);

        let theirs_blob = store.write_blob(b"theirs").unwrap();
        let mut e = store.tree_editor(Some(base_tree));
        e.insert("b", theirs_blob, EntryMode::Blob);
        let theirs_tree = e.flush().unwrap();
        let theirs_commit = commit(&store, theirs_tree, vec![base_commit]);

        let err = plan_merge(
            &store,
            Some(base_commit),
            ours_commit,
            theirs_commit,
            FastForwardMode::Only,
        )
        .unwrap_err();
        assert!(matches!(err, MergeError::NotFastForward));
    }

    #[test]
    fn unrelated_histories_are_rejected() {
        let (_dir, store) = store();
        let blob = store.write_blob(b"x").unwrap();
        let mut e = store.tree_editor(None);
        e.insert("a", blob, EntryMode::Blob);
        let tree = e.flush().unwrap();
        let c = commit(&store, tree, vec![]);

        let err = plan_merge(&store, None, c, c, FastForwardMode::Auto).unwrap_err();
        assert!(matches!(err, MergeError::Unrelated));
    }

    #[test]
    fn real_merge_with_no_conflicts_can_finalise_immediately() {
        let (_dir, store) = store();
        let blob = store.write_blob(b"base").unwrap();
        let mut e = store.tree_editor(None);
        e.insert("a", blob, EntryMode::Blob);
        e.insert("b", blob, EntryMode::Blob);
        let base_tree = e.flush().unwrap();
        let base_commit = commit(&store, base_tree, vec![]);

        let ours_blob = store.write_blob(b"ours").unwrap();
        let mut e = store.tree_editor(Some(base_tree));
        e.insert("a", ours_blob, EntryMode::Blob);
        let ours_tree = e.flush().unwrap();
        let ours_commit = commit(&store, ours_tree, vec![base_commit]);

        let theirs_blob = store.write_blob(b"theirs").unwrap();
        let mut e = store.tree_editor(Some(base_tree));
        e.insert("b", theirs_blob, EntryMode::Blob);
        let theirs_tree = e.flush().unwrap();
        let theirs_commit = commit(&store, theirs_tree, vec![base_commit]);

        let outcome = plan_merge(
            &store,
            Some(base_commit),
            ours_commit,
            theirs_commit,
            FastForwardMode::Auto,
        )
        .unwrap();
        let MergeOutcome::Resolved { index } = outcome else {
            panic!("expected a real merge")
        };
        assert!(index.is_fully_resolved());
        let tree_id = finalise_tree(&store, &index).unwrap();
        let tree = store.read_tree(&tree_id).unwrap().unwrap();
        assert_eq!(tree.get("a").unwrap().id, ours_blob);
        assert_eq!(tree.get("b").unwrap().id, theirs_blob);
    }
}
