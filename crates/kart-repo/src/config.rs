use std::path::{Path, PathBuf};

use kart_types::RepoStructureVersion;
use serde::{Deserialize, Serialize};

use crate::error::{RepoError, RepoResult};

/// The kind of working copy this repository is configured to use. Kart
/// upstream supports GeoPackage/SQLite, PostGIS and SQL Server targets; this
/// implementation only materialises the embedded SQLite one (§4.5), so it's
/// the only variant here -- picking any other dialect is simply not offered
/// rather than silently misbehaving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkingCopyKind {
    Sqlite,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkingCopyConfig {
    /// Path of the working-copy database, relative to the repository root.
    pub location: PathBuf,
    pub kind: WorkingCopyKind,
}

/// Persisted repository configuration (§3.1): the dataset-format version
/// that gates every commit's tree, whether the repo is bare (no working
/// copy), the working copy's location and kind, and an optional
/// spatial-filter spec. Stored as TOML at `.kart/config`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepoConfig {
    pub version: u32,
    pub bare: bool,
    pub working_copy: Option<WorkingCopyConfig>,
    pub spatial_filter: Option<String>,
}

impl RepoConfig {
    pub fn new(bare: bool) -> Self {
        Self {
            version: RepoStructureVersion::V3.as_u32(),
            bare,
            working_copy: None,
            spatial_filter: None,
        }
    }

    pub fn load(path: &Path) -> RepoResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> RepoResult<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// The repository-structure version as a checked type, refusing
    /// anything this implementation doesn't support (currently only V1,
    /// kept around so it can be refused with a clear message rather than
    /// silently misread).
    pub fn structure_version(&self) -> RepoResult<RepoStructureVersion> {
        let v = RepoStructureVersion::parse(&self.version.to_string())
            .expect("a u32 field always parses back as a version number");
        v.require_supported()
            .map_err(|_| RepoError::UnsupportedVersion(self.version))?;
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn new_config_defaults_to_v3_and_non_bare() {
        let config = RepoConfig::new(false);
        assert_eq!(config.version, 3);
        assert!(!config.bare);
        assert!(config.working_copy.is_none());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config");
        let mut config = RepoConfig::new(true);
        config.spatial_filter = Some("POLYGON((...))".to_string());
        config.save(&path).unwrap();

        let reloaded = RepoConfig::load(&path).unwrap();
        assert_eq!(reloaded.bare, true);
        assert_eq!(reloaded.spatial_filter, config.spatial_filter);
    }

    #[test]
    fn unsupported_version_is_refused() {
        let mut config = RepoConfig::new(false);
        config.version = 1;
        let err = config.structure_version().unwrap_err();
        assert!(matches!(err, RepoError::UnsupportedVersion(1)));
    }
}
