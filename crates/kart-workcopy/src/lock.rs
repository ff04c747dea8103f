use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{WorkcopyError, WorkcopyResult};

/// Advisory lock held for the duration of a reset, commit or merge against
/// a working copy, so two Kart processes never materialise or write back
/// the same database concurrently. Mirrors `kart_store::RepoLock`'s
/// sentinel-file-plus-flock approach, duplicated here because the working
/// copy is locked independently of the object store.
pub struct WorkcopyLock {
    file: File,
    sentinel_path: PathBuf,
}

impl WorkcopyLock {
    pub fn acquire(db_path: &Path) -> WorkcopyResult<Self> {
        let sentinel_path = db_path.with_extension("lock");
        let file = OpenOptions::new().create(true).write(true).open(&sentinel_path)?;
        fs2::FileExt::try_lock_exclusive(&file).map_err(|_| WorkcopyError::Locked)?;
        Ok(Self { file, sentinel_path })
    }
}

impl Drop for WorkcopyLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.sentinel_path);
    }
}
