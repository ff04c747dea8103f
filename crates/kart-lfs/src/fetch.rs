use std::time::Duration;

use kart_crypto::Sha256Oid;

use crate::error::{LfsError, LfsResult};

/// A pluggable source for fetching LFS object content by URL. The subsystem
/// itself knows nothing about HTTP or S3 -- it only needs something that
/// can turn a `url` into bytes, retried at this layer.
pub trait LfsFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String>;

    /// How long to sleep before retry attempt `attempt` (0-based). Default
    /// is exponential backoff starting at 200ms, capped at 5s.
    fn backoff(&self, attempt: u32) -> Duration {
        let millis = 200u64.saturating_mul(1u64 << attempt.min(8));
        Duration::from_millis(millis.min(5_000))
    }
}

const MAX_ATTEMPTS: u32 = 5;

/// Fetch `url` through `fetcher`, retrying transient failures with bounded
/// exponential backoff (§4.3 failure model). The last error is surfaced as
/// [`LfsError::Transport`] once the attempt budget is exhausted.
pub fn fetch_with_retry(fetcher: &dyn LfsFetcher, url: &str, oid: Sha256Oid) -> LfsResult<Vec<u8>> {
    let mut last_err = String::new();
    for attempt in 0..MAX_ATTEMPTS {
        match fetcher.fetch(url) {
            Ok(data) => return Ok(data),
            Err(e) => {
                tracing::warn!("LFS fetch of {url} failed (attempt {}/{MAX_ATTEMPTS}): {e}", attempt + 1);
                last_err = e;
                if attempt + 1 < MAX_ATTEMPTS {
                    std::thread::sleep(fetcher.backoff(attempt));
                }
            }
        }
    }
    Err(LfsError::Transport {
        oid,
        url: url.to_string(),
        reason: last_err,
    })
}
