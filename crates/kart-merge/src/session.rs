use std::path::{Path, PathBuf};

use kart_store::ObjectId;

use crate::error::{MergeError, MergeResult};
use crate::index::MergeIndex;

const MERGE_HEAD: &str = "MERGE_HEAD";
const ORIG_HEAD: &str = "ORIG_HEAD";
const MERGE_MSG: &str = "MERGE_MSG";
const MERGE_INDEX: &str = "MERGE_INDEX";

/// The on-disk state of an in-progress merge, living under the repository's
/// private directory (`.kart/`). Mirrors git's own `MERGE_HEAD`/`ORIG_HEAD`/
/// `MERGE_MSG` sentinel files so a merge can be resumed, inspected or
/// aborted across process restarts -- the CLEAN/RESOLVING state machine of
/// §4.6 is implemented entirely in terms of whether these files exist.
pub struct MergeSession {
    dir: PathBuf,
}

impl MergeSession {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn is_in_progress(&self) -> bool {
        self.path(MERGE_HEAD).exists()
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Begin a new merge: writes every sentinel file. Fails if one is
    /// already in progress.
    pub fn start(
        &self,
        orig_head: ObjectId,
        their_head: ObjectId,
        message: &str,
        index: &MergeIndex,
    ) -> MergeResult<()> {
        if self.is_in_progress() {
            return Err(MergeError::MergeInProgress);
        }
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(ORIG_HEAD), orig_head.to_hex())?;
        std::fs::write(self.path(MERGE_HEAD), their_head.to_hex())?;
        std::fs::write(self.path(MERGE_MSG), message)?;
        index.write_to_file(&self.path(MERGE_INDEX))?;
        Ok(())
    }

    pub fn orig_head(&self) -> MergeResult<ObjectId> {
        self.read_oid(ORIG_HEAD)
    }

    pub fn their_head(&self) -> MergeResult<ObjectId> {
        self.read_oid(MERGE_HEAD)
    }

    fn read_oid(&self, name: &str) -> MergeResult<ObjectId> {
        if !self.is_in_progress() {
            return Err(MergeError::NoMergeInProgress);
        }
        let text = std::fs::read_to_string(self.path(name))?;
        ObjectId::from_hex(text.trim())
            .map_err(|e| MergeError::CorruptIndex(format!("{name}: {e}")))
    }

    pub fn message(&self) -> MergeResult<String> {
        if !self.is_in_progress() {
            return Err(MergeError::NoMergeInProgress);
        }
        Ok(std::fs::read_to_string(self.path(MERGE_MSG))?)
    }

    pub fn load_index(&self) -> MergeResult<MergeIndex> {
        if !self.is_in_progress() {
            return Err(MergeError::NoMergeInProgress);
        }
        MergeIndex::read_from_file(&self.path(MERGE_INDEX))
    }

    pub fn save_index(&self, index: &MergeIndex) -> MergeResult<()> {
        if !self.is_in_progress() {
            return Err(MergeError::NoMergeInProgress);
        }
        index.write_to_file(&self.path(MERGE_INDEX))
    }

    /// Abandon the merge, discarding its state entirely.
    pub fn abort(&self) -> MergeResult<()> {
        if !self.is_in_progress() {
            return Err(MergeError::NoMergeInProgress);
        }
        self.remove_sentinels()
    }

    /// Clear merge state after a successful finalise. Distinct from
    /// `abort` only in intent: both remove the same files.
    pub fn finish(&self) -> MergeResult<()> {
        self.remove_sentinels()
    }

    fn remove_sentinels(&self) -> MergeResult<()> {
        for name in [MERGE_HEAD, ORIG_HEAD, MERGE_MSG, MERGE_INDEX] {
            let path = self.path(name);
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

pub fn private_dir_default(repo_path: &Path) -> PathBuf {
    repo_path.join("kart-merge")
}
