use kart_types::ObjectId;

/// The mode under which a [`TreeEntry`] is recorded, mirroring the handful
/// of modes git itself understands. Kart never writes `Commit` (submodule)
/// entries itself but must round-trip them untouched if it finds one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryMode {
    Blob,
    BlobExecutable,
    Tree,
    Symlink,
    Commit,
}

impl EntryMode {
    pub(crate) fn from_git(mode: i32) -> Self {
        match mode {
            0o040000 => Self::Tree,
            0o100755 => Self::BlobExecutable,
            0o120000 => Self::Symlink,
            0o160000 => Self::Commit,
            _ => Self::Blob,
        }
    }

    pub(crate) fn to_git(self) -> i32 {
        match self {
            Self::Blob => 0o100644,
            Self::BlobExecutable => 0o100755,
            Self::Tree => 0o040000,
            Self::Symlink => 0o120000,
            Self::Commit => 0o160000,
        }
    }

    pub fn is_tree(self) -> bool {
        matches!(self, Self::Tree)
    }
}

/// One entry in a [`Tree`]: a name, the mode it's recorded under, and the
/// id of the object it points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub mode: EntryMode,
    pub id: ObjectId,
}

/// A directory listing, read out of the object database in git's own sort
/// order (entries sorted as if tree names carried a trailing `/`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A commit's parsed metadata, independent of how many parents it has
/// (merge commits carry more than one).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    pub tree_id: ObjectId,
    pub parent_ids: Vec<ObjectId>,
    pub author_name: String,
    pub author_email: String,
    pub author_time: i64,
    pub author_tz_offset_minutes: i32,
    pub committer_name: String,
    pub committer_email: String,
    pub committer_time: i64,
    pub committer_tz_offset_minutes: i32,
    pub message: String,
}
