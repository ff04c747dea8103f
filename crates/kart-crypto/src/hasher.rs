use sha1::{Digest, Sha1};
use sha2::Sha256;

/// Domain-separated SHA-1 digest used to spread sibling blobs across
/// directories (§3.3 fan-out, §3.4 tile fan-out).
///
/// Each hasher carries a domain tag that is prepended to every digest. This
/// is not a security boundary -- it just keeps a primary-key fan-out digest
/// from colliding in meaning with a tile-filename fan-out digest, the way
/// the original implementation's per-purpose `hashlib.sha1(...)` calls never
/// overlap because they hash different strings.
pub struct FanOutHasher {
    domain: &'static str,
}

impl FanOutHasher {
    /// Fan-out for a table dataset's primary key, per §3.3: the path is
    /// built from fixed-length slices of `sha1(pk_bytes)`.
    pub const PRIMARY_KEY: Self = Self {
        domain: "kart-pk-fanout-v1",
    };

    /// Fan-out for a tile dataset's filename stem, per §3.4/§4.2
    /// `tile_path_for`.
    pub const TILE_NAME: Self = Self {
        domain: "kart-tile-fanout-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Digest raw bytes with domain separation. Returns the full 20-byte
    /// SHA-1 digest; callers take fixed-length hex prefixes of it for the
    /// two directory levels.
    pub fn digest(&self, data: &[u8]) -> [u8; 20] {
        let mut hasher = Sha1::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        hasher.finalize().into()
    }

    /// Hex-encoded digest, ready to be sliced into fan-out prefixes.
    pub fn digest_hex(&self, data: &[u8]) -> String {
        hex::encode(self.digest(data))
    }
}

/// Content hash for an LFS object (§3.4): `sha256:<hex>`, exactly as the
/// LFS pointer format and the `objects/<p1>/<p2>/<hex>` cache layout expect.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Sha256Oid([u8; 32]);

impl Sha256Oid {
    pub fn of(data: &[u8]) -> Self {
        let digest: [u8; 32] = Sha256::digest(data).into();
        Self(digest)
    }

    pub fn from_hex(s: &str) -> Result<Self, HasherError> {
        let bytes = hex::decode(s).map_err(|e| HasherError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(HasherError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The two-level directory prefix used by the LFS object cache layout:
    /// `objects/<p1>/<p2>/<hex>`.
    pub fn cache_prefixes(&self) -> (String, String) {
        let hex = self.to_hex();
        (hex[0..2].to_string(), hex[2..4].to_string())
    }

    pub fn verify(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }
}

impl std::fmt::Display for Sha256Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fanout_digest_is_deterministic() {
        let a = FanOutHasher::PRIMARY_KEY.digest(b"pk-bytes");
        let b = FanOutHasher::PRIMARY_KEY.digest(b"pk-bytes");
        assert_eq!(a, b);
    }

    #[test]
    fn fanout_domains_produce_different_digests() {
        let pk = FanOutHasher::PRIMARY_KEY.digest(b"same");
        let tile = FanOutHasher::TILE_NAME.digest(b"same");
        assert_ne!(pk, tile);
    }

    #[test]
    fn sha256_oid_roundtrip() {
        let oid = Sha256Oid::of(b"tile contents");
        let hex = oid.to_hex();
        let parsed = Sha256Oid::from_hex(&hex).unwrap();
        assert_eq!(oid, parsed);
    }

    #[test]
    fn sha256_oid_display_has_prefix() {
        let oid = Sha256Oid::of(b"x");
        assert!(oid.to_string().starts_with("sha256:"));
    }

    #[test]
    fn sha256_oid_verify() {
        let oid = Sha256Oid::of(b"original");
        assert!(oid.verify(b"original"));
        assert!(!oid.verify(b"tampered"));
    }

    #[test]
    fn cache_prefixes_are_two_hex_chars_each() {
        let oid = Sha256Oid::of(b"anything");
        let (p1, p2) = oid.cache_prefixes();
        assert_eq!(p1.len(), 2);
        assert_eq!(p2.len(), 2);
        assert!(oid.to_hex().starts_with(&format!("{p1}{p2}")));
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = Sha256Oid::from_hex("ab").unwrap_err();
        assert!(matches!(err, HasherError::InvalidLength { .. }));
    }
}
