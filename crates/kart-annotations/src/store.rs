use std::path::{Path, PathBuf};

use kart_types::ObjectId;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{AnnotationsError, AnnotationsResult};

/// A kind of memoised annotation. The original implementation keys its
/// sqlite rows on a free-text "kind" column (`"feature-change-counts"`,
/// `"reflist"`, ...); we keep that shape but give the handful of kinds the
/// core cares about names instead of leaving every caller to stringify its
/// own key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnnotationKind {
    /// Exact feature/tile change counts between two trees (§4.4 "Counts").
    FeatureChangeCounts,
}

impl AnnotationKind {
    fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::FeatureChangeCounts => "feature-change-counts",
        }
    }
}

/// The repository-private advisory cache (§3.7, `annotations.db`): a
/// key-value store keyed by `(kind, object-id)`, upserted freely and
/// consulted before recomputation. A missing entry is normal and must
/// never surface as an error -- only [`Self::get`] returning `None`.
pub struct AnnotationsStore {
    conn: Connection,
    path: PathBuf,
}

impl AnnotationsStore {
    pub fn open(path: impl AsRef<Path>) -> AnnotationsResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|e| AnnotationsError::Sqlite {
            path: path.display().to_string(),
            source: e,
        })?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS annotations (
                kind TEXT NOT NULL,
                object_id TEXT NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (kind, object_id)
            );",
        )
        .map_err(|e| AnnotationsError::Sqlite {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Self { conn, path })
    }

    fn wrap(&self, source: rusqlite::Error) -> AnnotationsError {
        AnnotationsError::Sqlite {
            path: self.path.display().to_string(),
            source,
        }
    }

    /// Upsert `value` for `(kind, object_id)`.
    pub fn set(&self, kind: AnnotationKind, object_id: &str, value: &[u8]) -> AnnotationsResult<()> {
        self.conn
            .execute(
                "INSERT INTO annotations (kind, object_id, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(kind, object_id) DO UPDATE SET value = excluded.value",
                params![kind.as_str(), object_id, value],
            )
            .map_err(|e| self.wrap(e))?;
        Ok(())
    }

    /// Look up `(kind, object_id)`. `Ok(None)` means "not cached" -- the
    /// caller should recompute, not treat this as a failure.
    pub fn get(&self, kind: AnnotationKind, object_id: &str) -> AnnotationsResult<Option<Vec<u8>>> {
        self.conn
            .query_row(
                "SELECT value FROM annotations WHERE kind = ?1 AND object_id = ?2",
                params![kind.as_str(), object_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| self.wrap(e))
    }

    /// Drop every cached entry of `kind`. Used when the meaning of a kind's
    /// payload changes (schema migration of the cache itself), never as
    /// part of ordinary operation.
    pub fn evict_kind(&self, kind: AnnotationKind) -> AnnotationsResult<()> {
        self.conn
            .execute("DELETE FROM annotations WHERE kind = ?1", params![kind.as_str()])
            .map_err(|e| self.wrap(e))?;
        Ok(())
    }
}

/// The symmetric key an exact-feature-count entry is cached under: two
/// trees being diffed in either order must hit the same cache row, per
/// §4.4 ("memoised ... keyed by the symmetric pair `min(a,b)...max(a,b)`").
pub fn symmetric_pair_key(a: ObjectId, b: ObjectId) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}...{hi}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_entry_is_none_not_error() {
        let dir = tempdir().unwrap();
        let store = AnnotationsStore::open(dir.path().join("annotations.db")).unwrap();
        assert!(store.get(AnnotationKind::FeatureChangeCounts, "abc").unwrap().is_none());
    }

    #[test]
    fn set_then_get_roundtrips() {
        let dir = tempdir().unwrap();
        let store = AnnotationsStore::open(dir.path().join("annotations.db")).unwrap();
        store.set(AnnotationKind::FeatureChangeCounts, "abc", b"42").unwrap();
        let value = store.get(AnnotationKind::FeatureChangeCounts, "abc").unwrap();
        assert_eq!(value, Some(b"42".to_vec()));
    }

    #[test]
    fn set_overwrites_previous_value() {
        let dir = tempdir().unwrap();
        let store = AnnotationsStore::open(dir.path().join("annotations.db")).unwrap();
        store.set(AnnotationKind::FeatureChangeCounts, "k", b"1").unwrap();
        store.set(AnnotationKind::FeatureChangeCounts, "k", b"2").unwrap();
        assert_eq!(
            store.get(AnnotationKind::FeatureChangeCounts, "k").unwrap(),
            Some(b"2".to_vec())
        );
    }

    #[test]
    fn symmetric_pair_key_is_order_independent() {
        let a = ObjectId::from_hash([1; 20]);
        let b = ObjectId::from_hash([2; 20]);
        assert_eq!(symmetric_pair_key(a, b), symmetric_pair_key(b, a));
    }

    #[test]
    fn evict_kind_clears_only_that_kind() {
        let dir = tempdir().unwrap();
        let store = AnnotationsStore::open(dir.path().join("annotations.db")).unwrap();
        store.set(AnnotationKind::FeatureChangeCounts, "k", b"1").unwrap();
        store.evict_kind(AnnotationKind::FeatureChangeCounts).unwrap();
        assert!(store.get(AnnotationKind::FeatureChangeCounts, "k").unwrap().is_none());
    }
}
