use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use git2::{ObjectType, Repository as Git2Repository, Signature};
use kart_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{CommitInfo, EntryMode, Tree, TreeEntry};
use crate::traits::ObjectStore;

fn git_oid_to_object_id(oid: git2::Oid) -> StoreResult<ObjectId> {
    let bytes = oid.as_bytes();
    let arr: [u8; 20] = bytes
        .try_into()
        .map_err(|_| StoreError::CorruptObject {
            id: ObjectId::null(),
            reason: format!("object id {oid} is not 20 bytes (non-SHA-1 odb?)"),
        })?;
    Ok(ObjectId::from_hash(arr))
}

fn object_id_to_git_oid(id: &ObjectId) -> StoreResult<git2::Oid> {
    Ok(git2::Oid::from_bytes(&id.as_bytes().to_vec())?)
}

/// Object store adapter wrapping a real git object database via `git2`.
///
/// This is the thing every other Kart crate is actually grounded on: blobs,
/// trees and commits are exactly what `git cat-file` would show you, and
/// refs/merge-base/commit-walk reuse the same object database git itself
/// uses. Kart doesn't reimplement any of this -- it borrows libgit2's
/// plumbing and only adds the dataset-shaped interpretation on top.
pub struct GitObjectStore {
    repo: Git2Repository,
    path: PathBuf,
}

impl GitObjectStore {
    /// Open an existing repository (bare or with a working tree) at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let repo = Git2Repository::open(&path)?;
        Ok(Self { repo, path })
    }

    /// Initialise a new bare repository at `path` (Kart repos are bare git
    /// repositories; the dataset working copy lives in a separate location
    /// managed by `kart-workcopy`).
    pub fn init_bare(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let repo = Git2Repository::init_bare(&path)?;
        // pin the default branch name rather than depend on the caller's
        // global init.defaultBranch, so a fresh repo's HEAD is predictable.
        repo.set_head("refs/heads/main")?;
        Ok(Self { repo, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn git2_repo(&self) -> &Git2Repository {
        &self.repo
    }

    /// Resolve a ref (e.g. `refs/heads/main`, `HEAD`) to the object id it
    /// currently points at.
    pub fn resolve_ref(&self, name: &str) -> StoreResult<Option<ObjectId>> {
        match self.repo.refname_to_id(name) {
            Ok(oid) => Ok(Some(git_oid_to_object_id(oid)?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Update `name` to point at `new_id`, failing if its current value
    /// isn't exactly `expected` (compare-and-swap). Pass `None` for
    /// `expected` to require the ref not already exist.
    pub fn compare_and_swap_ref(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new_id: ObjectId,
    ) -> StoreResult<()> {
        let current = self.resolve_ref(name)?;
        if current != expected {
            return Err(StoreError::RefConflict {
                name: name.to_string(),
                expected: expected.map(|i| i.to_hex()).unwrap_or_else(|| "<absent>".into()),
                actual: current.map(|i| i.to_hex()).unwrap_or_else(|| "<absent>".into()),
            });
        }
        let oid = object_id_to_git_oid(&new_id)?;
        self.repo
            .reference(name, oid, true, "kart: update ref")?;
        Ok(())
    }

    /// Delete a ref outright. Used by branch deletion and merge abort
    /// (`ORIG_HEAD` cleanup).
    pub fn delete_ref(&self, name: &str) -> StoreResult<()> {
        if let Ok(mut r) = self.repo.find_reference(name) {
            r.delete()?;
        }
        Ok(())
    }

    /// Lowest common ancestor of two commits, per `git merge-base`. Used by
    /// `kart-merge` to find the base for a three-way merge.
    pub fn merge_base(&self, a: ObjectId, b: ObjectId) -> StoreResult<Option<ObjectId>> {
        let a = object_id_to_git_oid(&a)?;
        let b = object_id_to_git_oid(&b)?;
        match self.repo.merge_base(a, b) {
            Ok(oid) => Ok(Some(git_oid_to_object_id(oid)?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Walk commit history starting at `from`, most recent first, exactly
    /// as `git log` would (topological + time order).
    pub fn commit_walk(&self, from: ObjectId) -> StoreResult<Vec<ObjectId>> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(object_id_to_git_oid(&from)?)?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;
        let mut out = Vec::new();
        for oid in revwalk {
            out.push(git_oid_to_object_id(oid?)?);
        }
        Ok(out)
    }

    /// Start a buffered set of nested-path edits against a base tree (or an
    /// empty tree if `base` is `None`). See [`TreeEditor`] for semantics.
    pub fn tree_editor(&self, base: Option<ObjectId>) -> TreeEditor<'_> {
        TreeEditor::new(self, base)
    }

    /// Acquire the repository's advisory lock, used around working-copy
    /// resets and in-progress merges so two Kart processes don't stomp on
    /// the same checkout concurrently. Dropping the guard releases it.
    pub fn lock(&self) -> StoreResult<RepoLock> {
        RepoLock::acquire(&self.path)
    }

    /// The branch `HEAD` currently points at, if it points at a branch at
    /// all. Reads the symbolic target directly rather than `repo.head()`,
    /// so this still answers for an unborn branch (no commits yet) instead
    /// of erroring; a detached `HEAD` yields `None`.
    pub fn current_branch(&self) -> StoreResult<Option<String>> {
        let head_ref = match self.repo.find_reference("HEAD") {
            Ok(r) => r,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(head_ref
            .symbolic_target()
            .and_then(|t| t.strip_prefix("refs/heads/"))
            .map(|s| s.to_string()))
    }

    /// Point the symbolic `HEAD` ref at `refs/heads/<name>`, without
    /// touching what that branch resolves to. Used by `switch`.
    pub fn set_head_to_branch(&self, name: &str) -> StoreResult<()> {
        self.repo.set_head(&format!("refs/heads/{name}"))?;
        Ok(())
    }

    /// Every local branch name, sorted.
    pub fn list_branches(&self) -> StoreResult<Vec<String>> {
        let mut out = Vec::new();
        for entry in self.repo.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = entry?;
            if let Some(name) = branch.name()? {
                out.push(name.to_string());
            }
        }
        out.sort();
        Ok(out)
    }
}

impl ObjectStore for GitObjectStore {
    fn read_blob(&self, id: &ObjectId) -> StoreResult<Option<Vec<u8>>> {
        let oid = object_id_to_git_oid(id)?;
        match self.repo.find_blob(oid) {
            Ok(blob) => Ok(Some(blob.content().to_vec())),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_blob(&self, data: &[u8]) -> StoreResult<ObjectId> {
        let oid = self.repo.blob(data)?;
        git_oid_to_object_id(oid)
    }

    fn read_tree(&self, id: &ObjectId) -> StoreResult<Option<Tree>> {
        let oid = object_id_to_git_oid(id)?;
        let tree = match self.repo.find_tree(oid) {
            Ok(t) => t,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut entries = Vec::with_capacity(tree.len());
        for entry in tree.iter() {
            let name = entry
                .name()
                .ok_or_else(|| StoreError::CorruptObject {
                    id: *id,
                    reason: "tree entry name is not valid UTF-8".to_string(),
                })?
                .to_string();
            entries.push(TreeEntry {
                name,
                mode: EntryMode::from_git(entry.filemode()),
                id: git_oid_to_object_id(entry.id())?,
            });
        }
        Ok(Some(Tree { entries }))
    }

    fn write_tree(&self, entries: &[TreeEntry]) -> StoreResult<ObjectId> {
        let mut builder = self.repo.treebuilder(None)?;
        for entry in entries {
            let oid = object_id_to_git_oid(&entry.id)?;
            builder.insert(&entry.name, oid, entry.mode.to_git())?;
        }
        git_oid_to_object_id(builder.write()?)
    }

    fn read_commit(&self, id: &ObjectId) -> StoreResult<Option<CommitInfo>> {
        let oid = object_id_to_git_oid(id)?;
        let commit = match self.repo.find_commit(oid) {
            Ok(c) => c,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let author = commit.author();
        let committer = commit.committer();
        Ok(Some(CommitInfo {
            tree_id: git_oid_to_object_id(commit.tree_id())?,
            parent_ids: commit
                .parent_ids()
                .map(git_oid_to_object_id)
                .collect::<StoreResult<Vec<_>>>()?,
            author_name: author.name().unwrap_or_default().to_string(),
            author_email: author.email().unwrap_or_default().to_string(),
            author_time: author.when().seconds(),
            author_tz_offset_minutes: author.when().offset_minutes(),
            committer_name: committer.name().unwrap_or_default().to_string(),
            committer_email: committer.email().unwrap_or_default().to_string(),
            committer_time: committer.when().seconds(),
            committer_tz_offset_minutes: committer.when().offset_minutes(),
            message: commit.message().unwrap_or_default().to_string(),
        }))
    }

    fn write_commit(&self, info: &CommitInfo) -> StoreResult<ObjectId> {
        let tree_oid = object_id_to_git_oid(&info.tree_id)?;
        let tree = self.repo.find_tree(tree_oid)?;

        let author = Signature::new(
            &info.author_name,
            &info.author_email,
            &git2::Time::new(info.author_time, info.author_tz_offset_minutes),
        )?;
        let committer = Signature::new(
            &info.committer_name,
            &info.committer_email,
            &git2::Time::new(info.committer_time, info.committer_tz_offset_minutes),
        )?;

        let mut parent_oids = Vec::with_capacity(info.parent_ids.len());
        for p in &info.parent_ids {
            parent_oids.push(object_id_to_git_oid(p)?);
        }
        let parent_commits = parent_oids
            .iter()
            .map(|oid| self.repo.find_commit(*oid))
            .collect::<Result<Vec<_>, _>>()?;
        let parent_refs: Vec<&git2::Commit> = parent_commits.iter().collect();

        let oid = self.repo.commit(
            None,
            &author,
            &committer,
            &info.message,
            &tree,
            &parent_refs,
        )?;
        git_oid_to_object_id(oid)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let oid = object_id_to_git_oid(id)?;
        Ok(self.repo.find_object(oid, None::<ObjectType>).is_ok())
    }
}

/// Buffered editor over a tree's nested paths, per the working-copy commit
/// path (§4.1): callers stage `insert`/`remove` calls keyed by full
/// slash-separated path, and only a single `flush()` walks the affected
/// subtrees bottom-up and writes new tree objects, creating any missing
/// intermediate trees and silently ignoring a `remove` of a path that was
/// never present.
pub struct TreeEditor<'a> {
    store: &'a GitObjectStore,
    base: Option<ObjectId>,
    edits: Vec<(String, Edit)>,
}

enum Edit {
    Insert(ObjectId, EntryMode),
    Remove,
}

impl<'a> TreeEditor<'a> {
    fn new(store: &'a GitObjectStore, base: Option<ObjectId>) -> Self {
        Self {
            store,
            base,
            edits: Vec::new(),
        }
    }

    /// Stage an insert/overwrite of `path` (later calls for the same path
    /// win -- last-write-wins).
    pub fn insert(&mut self, path: impl Into<String>, id: ObjectId, mode: EntryMode) -> &mut Self {
        self.edits.push((path.into(), Edit::Insert(id, mode)));
        self
    }

    /// Stage removal of `path`. A path that doesn't exist in the resulting
    /// tree is simply a no-op once flushed.
    pub fn remove(&mut self, path: impl Into<String>) -> &mut Self {
        self.edits.push((path.into(), Edit::Remove));
        self
    }

    /// Apply every staged edit and return the resulting root tree id.
    pub fn flush(&mut self) -> StoreResult<ObjectId> {
        // last-write-wins: keep only the final edit per path
        let mut by_path: std::collections::HashMap<String, Edit> = std::collections::HashMap::new();
        for (path, edit) in self.edits.drain(..) {
            by_path.insert(path, edit);
        }

        let base_tree = match self.base {
            Some(id) => self.store.read_tree(&id)?,
            None => None,
        };
        let mut root = base_tree.unwrap_or_default();

        // group edits by their first path segment, recursing one level at a time
        let mut direct: Vec<(String, Edit)> = Vec::new();
        let mut nested: std::collections::HashMap<String, Vec<(String, Edit)>> =
            std::collections::HashMap::new();
        for (path, edit) in by_path {
            match path.split_once('/') {
                Some((head, rest)) => nested
                    .entry(head.to_string())
                    .or_default()
                    .push((rest.to_string(), edit)),
                None => direct.push((path, edit)),
            }
        }

        for (name, rest) in nested {
            let existing_subtree = root.get(&name).filter(|e| e.mode.is_tree()).map(|e| e.id);
            let mut sub_editor = TreeEditor::new(self.store, existing_subtree);
            for (path, edit) in rest {
                match edit {
                    Edit::Insert(id, mode) => {
                        sub_editor.insert(path, id, mode);
                    }
                    Edit::Remove => {
                        sub_editor.remove(path);
                    }
                }
            }
            let new_subtree_id = sub_editor.flush()?;
            let new_subtree = self.store.read_tree(&new_subtree_id)?.unwrap_or_default();
            root.entries.retain(|e| e.name != name);
            if !new_subtree.is_empty() {
                root.entries.push(TreeEntry {
                    name: name.clone(),
                    mode: EntryMode::Tree,
                    id: new_subtree_id,
                });
            }
            // an empty resulting subtree is dropped: git doesn't record empty trees
        }

        for (name, edit) in direct {
            root.entries.retain(|e| e.name != name);
            if let Edit::Insert(id, mode) = edit {
                root.entries.push(TreeEntry { name, mode, id });
            }
            // Edit::Remove of an absent entry is a no-op, matching the retain above
        }

        root.entries.sort_by(|a, b| tree_sort_key(a).cmp(&tree_sort_key(b)));
        self.store.write_tree(&root.entries)
    }
}

/// git sorts tree entries as if directory names had a trailing `/`, so
/// `"foo"` (a file) sorts before `"foo.bar"` but after `"foo/"` (a tree)
/// would if both existed -- in practice this only matters for entries that
/// share a prefix.
fn tree_sort_key(entry: &TreeEntry) -> String {
    if entry.mode.is_tree() {
        format!("{}/", entry.name)
    } else {
        entry.name.clone()
    }
}

/// Advisory lock held for the duration of an operation that mutates the
/// working copy or merge state (reset, checkout, merge). Backed by a
/// `.kart/lock` sentinel file and an OS advisory file lock, so a stale lock
/// left by a crashed process doesn't wedge the repository forever once the
/// holding process exits.
pub struct RepoLock {
    file: File,
    sentinel_path: PathBuf,
}

impl RepoLock {
    fn acquire(repo_path: &Path) -> StoreResult<Self> {
        let sentinel_path = repo_path.join("kart.lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&sentinel_path)?;
        file.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(sentinel_path.display().to_string()))?;
        Ok(Self {
            file,
            sentinel_path,
        })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.sentinel_path);
    }
}
