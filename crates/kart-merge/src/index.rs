use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use kart_store::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::{MergeError, MergeResult};
use crate::mode::Mode;

/// A path/object pair as it existed on one side of a merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub path: String,
    pub id: ObjectId,
    pub mode: Mode,
}

/// The three variants of a path across a merge's three inputs, in the fixed
/// order ancestor / ours / theirs. Any slot may be absent (the path didn't
/// exist on that side).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorOursTheirs<T> {
    pub ancestor: Option<T>,
    pub ours: Option<T>,
    pub theirs: Option<T>,
}

impl<T> AncestorOursTheirs<T> {
    pub fn new(ancestor: Option<T>, ours: Option<T>, theirs: Option<T>) -> Self {
        Self {
            ancestor,
            ours,
            theirs,
        }
    }
}

/// A user's chosen resolution for one conflict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolve {
    /// Take a single entry as the merged result (covers `--ours`, `--theirs`,
    /// `--ancestor` and `--with=<file>` -- the caller picks which bytes to
    /// wrap as the resolved entry).
    Merged(ConflictEntry),
    /// Keep both sides, writing `theirs` alongside `ours` under a
    /// disambiguated path so neither is lost.
    KeepBoth {
        ours: ConflictEntry,
        theirs: ConflictEntry,
    },
    /// The conflicting path should not exist in the merge result.
    Delete,
}

/// The full state of an in-progress (or just-completed) merge: entries that
/// merged without any human involvement, conflicts still awaiting a
/// decision, and resolutions recorded against conflict keys so far.
///
/// This is the unit of persistence (§3.6): written to a single file under
/// the repository's private directory so the merge can be resolved
/// incrementally, a key at a time, across process restarts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MergeIndex {
    /// Path -> (object id, mode) for every entry whose value is already
    /// settled (no conflict, or a trivial same-value/unchanged-side merge).
    pub entries: BTreeMap<String, (ObjectId, Mode)>,
    /// Conflict key -> the three variants of that path. Keys are opaque,
    /// stable strings assigned in (dataset, part, item) order at merge time.
    pub conflicts: BTreeMap<String, AncestorOursTheirs<ConflictEntry>>,
    /// Conflict key -> the resolution chosen for it so far. A key present
    /// here and absent from `conflicts` is stale and ignored.
    pub resolves: BTreeMap<String, Resolve>,
}

impl MergeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conflict keys that still have no resolution recorded.
    pub fn unresolved_keys(&self) -> Vec<&str> {
        self.conflicts
            .keys()
            .filter(|k| !self.resolves.contains_key(*k))
            .map(String::as_str)
            .collect()
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved_keys().is_empty()
    }

    pub fn record_resolve(&mut self, key: &str, resolve: Resolve) -> MergeResult<()> {
        if !self.conflicts.contains_key(key) {
            return Err(MergeError::UnknownConflictKey(key.to_string()));
        }
        self.resolves.insert(key.to_string(), resolve);
        Ok(())
    }

    pub fn clear_resolve(&mut self, key: &str) {
        self.resolves.remove(key);
    }

    /// Serialise to the exact bytes written on disk (pretty JSON, so a
    /// partially-resolved merge can be inspected or hand-edited).
    pub fn to_json(&self) -> MergeResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> MergeResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn write_to_file(&self, path: &Path) -> MergeResult<()> {
        let bytes = self.to_json()?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> MergeResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, byte: u8) -> ConflictEntry {
        ConflictEntry {
            path: path.to_string(),
            id: ObjectId::from_hash([byte; 20]),
            mode: Mode::Blob,
        }
    }

    #[test]
    fn round_trips_through_json_losslessly() {
        let mut index = MergeIndex::new();
        index
            .entries
            .insert("a.txt".to_string(), (ObjectId::from_hash([1; 20]), Mode::Blob));
        index.conflicts.insert(
            "0".to_string(),
            AncestorOursTheirs::new(Some(entry("a.txt", 2)), Some(entry("a.txt", 3)), Some(entry("a.txt", 4))),
        );
        index
            .record_resolve("0", Resolve::Merged(entry("a.txt", 3)))
            .unwrap();

        let bytes = index.to_json().unwrap();
        let restored = MergeIndex::from_json(&bytes).unwrap();
        assert_eq!(restored.entries, index.entries);
        assert_eq!(restored.conflicts, index.conflicts);
        assert_eq!(restored.resolves, index.resolves);
    }

    #[test]
    fn resolving_unknown_key_is_an_error() {
        let mut index = MergeIndex::new();
        let err = index
            .record_resolve("missing", Resolve::Delete)
            .unwrap_err();
        assert!(matches!(err, MergeError::UnknownConflictKey(_)));
    }

    #[test]
    fn fully_resolved_once_every_conflict_has_a_resolve() {
        let mut index = MergeIndex::new();
        index.conflicts.insert(
            "0".to_string(),
            AncestorOursTheirs::new(None, Some(entry("a", 1)), Some(entry("a", 2))),
        );
        assert!(!index.is_fully_resolved());
        index.record_resolve("0", Resolve::Delete).unwrap();
        assert!(index.is_fully_resolved());
    }
}
