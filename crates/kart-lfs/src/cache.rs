use std::fs;
use std::path::{Path, PathBuf};

use kart_crypto::Sha256Oid;

use crate::error::{LfsError, LfsResult};
use crate::fetch::LfsFetcher;

/// The content-addressed LFS object cache at `.kart/lfs/objects/<p1>/<p2>/<hex>`
/// (§3.4, §6). Write-once per oid: a concurrent writer producing the same
/// content lands on the same path, so a second write is simply a no-op.
pub struct LfsCache {
    root: PathBuf,
}

impl LfsCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, oid: Sha256Oid) -> PathBuf {
        let (p1, p2) = oid.cache_prefixes();
        self.root.join(p1).join(p2).join(oid.to_hex())
    }

    /// Compute the cache location for `oid` without touching the network.
    /// Returns `None` if the object isn't cached locally.
    pub fn local_path_of(&self, oid: Sha256Oid) -> Option<PathBuf> {
        let path = self.object_path(oid);
        path.is_file().then_some(path)
    }

    /// Write `data` into the cache, computing its content hash. Idempotent:
    /// writing identical bytes twice is a no-op the second time.
    pub fn write_object(&self, data: &[u8]) -> LfsResult<(Sha256Oid, u64)> {
        let oid = Sha256Oid::of(data);
        let dest = self.object_path(oid);
        if dest.is_file() {
            return Ok((oid, data.len() as u64));
        }
        fs::create_dir_all(dest.parent().unwrap())?;
        let tmp = dest.with_extension(format!("tmp-{}", std::process::id()));
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &dest)?;
        Ok((oid, data.len() as u64))
    }

    /// Move an existing file into the cache atomically, same semantics as
    /// [`Self::write_object`] but for content already on disk (e.g. a
    /// GDAL-converted tile that shouldn't be read twice).
    pub fn write_object_from_path(&self, source: &Path) -> LfsResult<(Sha256Oid, u64)> {
        let data = fs::read(source)?;
        let oid = Sha256Oid::of(&data);
        let dest = self.object_path(oid);
        if dest.is_file() {
            return Ok((oid, data.len() as u64));
        }
        fs::create_dir_all(dest.parent().unwrap())?;
        let tmp = dest.with_extension(format!("tmp-{}", std::process::id()));
        fs::copy(source, &tmp)?;
        fs::rename(&tmp, &dest)?;
        Ok((oid, data.len() as u64))
    }

    /// Ensure `oid` (of the given `size`) is present locally, fetching from
    /// `url` through `fetcher` if it's missing. Verifies the downloaded
    /// content's hash before renaming it into place; a partial download is
    /// discarded rather than left half-written.
    pub fn ensure_local(
        &self,
        oid: Sha256Oid,
        size: u64,
        url: Option<&str>,
        fetcher: &dyn LfsFetcher,
    ) -> LfsResult<PathBuf> {
        if let Some(path) = self.local_path_of(oid) {
            return Ok(path);
        }
        let url = url.ok_or(LfsError::NotFound(oid))?;

        let data = crate::fetch::fetch_with_retry(fetcher, url, oid)?;
        if data.len() as u64 != size {
            tracing::warn!(
                "LFS object {oid} fetched from {url} has size {} but pointer recorded {size}",
                data.len()
            );
        }
        if !oid.verify(&data) {
            return Err(LfsError::IntegrityError { oid });
        }

        let dest = self.object_path(oid);
        fs::create_dir_all(dest.parent().unwrap())?;
        let tmp = dest.with_extension(format!("tmp-{}", std::process::id()));
        fs::write(&tmp, &data)?;
        fs::rename(&tmp, &dest)?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::StubFetcher;
    use tempfile::tempdir;

    #[test]
    fn write_object_is_idempotent() {
        let dir = tempdir().unwrap();
        let cache = LfsCache::new(dir.path());
        let (oid1, size1) = cache.write_object(b"tile bytes").unwrap();
        let (oid2, size2) = cache.write_object(b"tile bytes").unwrap();
        assert_eq!(oid1, oid2);
        assert_eq!(size1, size2);
        assert!(cache.local_path_of(oid1).is_some());
    }

    #[test]
    fn local_path_of_missing_is_none() {
        let dir = tempdir().unwrap();
        let cache = LfsCache::new(dir.path());
        let oid = Sha256Oid::of(b"never written");
        assert!(cache.local_path_of(oid).is_none());
    }

    #[test]
    fn ensure_local_fetches_and_verifies() {
        let dir = tempdir().unwrap();
        let cache = LfsCache::new(dir.path());
        let content = b"fetched tile content";
        let oid = Sha256Oid::of(content);
        let fetcher = StubFetcher::succeeding(content.to_vec());

        let path = cache
            .ensure_local(oid, content.len() as u64, Some("https://example.com/t.tif"), &fetcher)
            .unwrap();
        assert_eq!(fs::read(&path).unwrap(), content);
    }

    #[test]
    fn ensure_local_rejects_hash_mismatch() {
        let dir = tempdir().unwrap();
        let cache = LfsCache::new(dir.path());
        let oid = Sha256Oid::of(b"expected content");
        let fetcher = StubFetcher::succeeding(b"wrong content".to_vec());

        let err = cache
            .ensure_local(oid, 0, Some("https://example.com/t.tif"), &fetcher)
            .unwrap_err();
        assert!(matches!(err, LfsError::IntegrityError { .. }));
        assert!(cache.local_path_of(oid).is_none(), "a failed verify must not poison the cache");
    }

    #[test]
    fn ensure_local_without_url_and_not_cached_is_not_found() {
        let dir = tempdir().unwrap();
        let cache = LfsCache::new(dir.path());
        let oid = Sha256Oid::of(b"x");
        let fetcher = StubFetcher::succeeding(vec![]);
        let err = cache.ensure_local(oid, 0, None, &fetcher).unwrap_err();
        assert!(matches!(err, LfsError::NotFound(_)));
    }
}
