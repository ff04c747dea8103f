use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The dataset-format version that applies to a commit's tree, encoded in
/// the top-level `.kart.repostructure.version` blob (or the legacy
/// `.sno.repository.version` blob written by older tooling).
///
/// Only versions 2 and 3 are fully supported. Version 1 (`.sno-table/`
/// layout) is recognised so it can be refused with a message pointing at
/// the upgrade tool, rather than silently misbehaving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoStructureVersion(u32);

impl RepoStructureVersion {
    pub const V1_LEGACY: Self = Self(1);
    pub const V2: Self = Self(2);
    pub const V3: Self = Self(3);

    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let n: u32 = raw
            .trim()
            .parse()
            .map_err(|_| TypeError::InvalidDatasetPath(raw.to_string()))?;
        Ok(Self(n))
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Versions 2 and 3 are readable/writable by this implementation.
    pub fn is_supported(&self) -> bool {
        matches!(self.0, 2 | 3)
    }

    /// `require_supported` is the gate every entry point (`checkout`,
    /// `clone`, `diff`, ...) calls before touching a commit's tree.
    pub fn require_supported(&self) -> Result<(), TypeError> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(TypeError::UnsupportedRepoVersion(self.0))
        }
    }
}

impl std::fmt::Display for RepoStructureVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_and_v3_are_supported() {
        assert!(RepoStructureVersion::V2.is_supported());
        assert!(RepoStructureVersion::V3.is_supported());
    }

    #[test]
    fn v1_is_recognised_but_unsupported() {
        assert!(!RepoStructureVersion::V1_LEGACY.is_supported());
        assert!(RepoStructureVersion::V1_LEGACY.require_supported().is_err());
    }

    #[test]
    fn parse_roundtrip() {
        let v = RepoStructureVersion::parse("3").unwrap();
        assert_eq!(v, RepoStructureVersion::V3);
        assert_eq!(v.to_string(), "3");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(RepoStructureVersion::parse("not-a-number").is_err());
    }
}
