use std::collections::BTreeMap;

use kart_crypto::Sha256Oid;

use crate::error::{DatasetError, DatasetResult};

/// A decoded LFS pointer blob (§3.4, §6 wire format): the small text file
/// the tree stores in place of a tile's actual (large) content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TilePointer {
    pub version_url: String,
    pub oid: Sha256Oid,
    pub size: u64,
    /// Additional key/value metadata (`format`, `crs`, `extent`,
    /// `dimensions`, `name`, optionally `pamOid`/`pamSize`/`pamName` for a
    /// PAM sidecar), kept in the order callers set them but always
    /// serialised lexicographically by key.
    pub extra: BTreeMap<String, String>,
}

const DEFAULT_VERSION_URL: &str = "https://git-lfs.github.com/spec/v1";

impl TilePointer {
    pub fn new(oid: Sha256Oid, size: u64) -> Self {
        Self {
            version_url: DEFAULT_VERSION_URL.to_string(),
            oid,
            size,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn pam_oid(&self) -> Option<&str> {
        self.extra.get("pamOid").map(String::as_str)
    }
}

/// Serialise to the exact on-disk wire format: `version`, `oid`, `size`,
/// then every extra key in lexicographic order, one `key value` per line,
/// LF-terminated.
pub fn encode_tile_pointer(pointer: &TilePointer) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&format!("version {}\n", pointer.version_url));
    out.push_str(&format!("oid {}\n", pointer.oid));
    out.push_str(&format!("size {}\n", pointer.size));
    for (key, value) in &pointer.extra {
        out.push_str(&format!("{key} {value}\n"));
    }
    out.into_bytes()
}

/// Parse a pointer blob back into its structured form. Fails with
/// [`DatasetError::MalformedPointer`] if any of `version`/`oid`/`size` is
/// missing or doesn't parse.
pub fn decode_tile_pointer(bytes: &[u8]) -> DatasetResult<TilePointer> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| DatasetError::MalformedPointer("pointer blob is not valid UTF-8".into()))?;

    let mut version_url = None;
    let mut oid = None;
    let mut size = None;
    let mut extra = BTreeMap::new();

    for line in text.lines() {
        let Some((key, value)) = line.split_once(' ') else {
            return Err(DatasetError::MalformedPointer(format!(
                "line with no key/value separator: {line:?}"
            )));
        };
        match key {
            "version" => version_url = Some(value.to_string()),
            "oid" => {
                let hex = value.strip_prefix("sha256:").ok_or_else(|| {
                    DatasetError::MalformedPointer(format!("oid line missing sha256: prefix: {value}"))
                })?;
                oid = Some(Sha256Oid::from_hex(hex)?);
            }
            "size" => {
                size = Some(value.parse::<u64>().map_err(|_| {
                    DatasetError::MalformedPointer(format!("size is not a valid integer: {value}"))
                })?);
            }
            other => {
                extra.insert(other.to_string(), value.to_string());
            }
        }
    }

    Ok(TilePointer {
        version_url: version_url
            .ok_or_else(|| DatasetError::MalformedPointer("missing version line".into()))?,
        oid: oid.ok_or_else(|| DatasetError::MalformedPointer("missing oid line".into()))?,
        size: size.ok_or_else(|| DatasetError::MalformedPointer("missing size line".into()))?,
        extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_extra_metadata() {
        let oid = Sha256Oid::of(b"tile bytes");
        let pointer = TilePointer::new(oid, 1024)
            .with_extra("format", "geotiff")
            .with_extra("name", "tile_0_0.tif");

        let bytes = encode_tile_pointer(&pointer);
        let decoded = decode_tile_pointer(&bytes).unwrap();
        assert_eq!(decoded, pointer);
    }

    #[test]
    fn extra_keys_serialise_lexicographically() {
        let oid = Sha256Oid::of(b"x");
        let pointer = TilePointer::new(oid, 1)
            .with_extra("zebra", "1")
            .with_extra("alpha", "2");
        let text = String::from_utf8(encode_tile_pointer(&pointer)).unwrap();
        let alpha_pos = text.find("alpha").unwrap();
        let zebra_pos = text.find("zebra").unwrap();
        assert!(alpha_pos < zebra_pos);
    }

    #[test]
    fn missing_oid_is_malformed() {
        let bytes = b"version https://git-lfs.github.com/spec/v1\nsize 10\n".to_vec();
        let err = decode_tile_pointer(&bytes).unwrap_err();
        assert!(matches!(err, DatasetError::MalformedPointer(_)));
    }

    #[test]
    fn wire_format_starts_with_version_oid_size_in_order() {
        let oid = Sha256Oid::of(b"abc");
        let pointer = TilePointer::new(oid, 42);
        let text = String::from_utf8(encode_tile_pointer(&pointer)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("version "));
        assert!(lines[1].starts_with("oid sha256:"));
        assert!(lines[2].starts_with("size "));
    }
}
