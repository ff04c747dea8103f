use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The marker subdirectory name that identifies a dataset of a given kind and
/// version, e.g. `.table-dataset.v3`. Kart repositories authored by the
/// legacy "sno" tooling use `.sno-table` instead; readers must accept both
/// (see `DatasetMarker::matches`), writers always emit the `kart` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetKind {
    Table,
    PointCloud,
    Raster,
}

impl DatasetKind {
    pub fn marker_name(&self, version: u32) -> String {
        match self {
            Self::Table => format!(".table-dataset.v{version}"),
            Self::PointCloud => format!(".point-cloud-dataset.v{version}"),
            Self::Raster => format!(".raster-dataset.v{version}"),
        }
    }

    /// Legacy "sno" marker names a reader must also recognise.
    fn legacy_marker_name(&self) -> Option<&'static str> {
        match self {
            Self::Table => Some(".sno-table"),
            Self::PointCloud | Self::Raster => None,
        }
    }

    /// Parse a marker directory name into its kind and version.
    ///
    /// Accepts both the current `.kind-dataset.vN` form and the legacy
    /// `.sno-table` form for table datasets (version is implicitly 1,
    /// which callers should refuse with an upgrade-tool message).
    pub fn parse_marker(name: &str) -> Option<(Self, u32)> {
        if name == ".sno-table" {
            return Some((Self::Table, 1));
        }
        let rest = name.strip_prefix('.')?;
        let (kind_str, ver_str) = rest.rsplit_once(".v")?;
        let version: u32 = ver_str.parse().ok()?;
        let kind = match kind_str {
            "table-dataset" => Self::Table,
            "point-cloud-dataset" => Self::PointCloud,
            "raster-dataset" => Self::Raster,
            _ => return None,
        };
        Some((kind, version))
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::PointCloud => write!(f, "point-cloud"),
            Self::Raster => write!(f, "raster"),
        }
    }
}

/// A slash-separated path identifying a dataset inside a commit's root tree,
/// e.g. `nz_pa_points_topo_150k` or `surveys/coastal/points`.
///
/// Dataset paths are validated at construction: no leading/trailing slash,
/// no empty segments, no segment starting with `.` (that namespace is
/// reserved for marker directories).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetPath(String);

impl DatasetPath {
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
            return Err(TypeError::InvalidDatasetPath(path));
        }
        for segment in path.split('/') {
            if segment.is_empty() || segment.starts_with('.') {
                return Err(TypeError::InvalidDatasetPath(path));
            }
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The full path to this dataset's marker directory under the given kind.
    pub fn marker_path(&self, kind: DatasetKind, version: u32) -> String {
        format!("{}/{}", self.0, kind.marker_name(version))
    }
}

impl fmt::Display for DatasetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_current_markers() {
        assert_eq!(
            DatasetKind::parse_marker(".table-dataset.v3"),
            Some((DatasetKind::Table, 3))
        );
        assert_eq!(
            DatasetKind::parse_marker(".point-cloud-dataset.v1"),
            Some((DatasetKind::PointCloud, 1))
        );
        assert_eq!(
            DatasetKind::parse_marker(".raster-dataset.v1"),
            Some((DatasetKind::Raster, 1))
        );
    }

    #[test]
    fn parses_legacy_sno_table_marker() {
        assert_eq!(
            DatasetKind::parse_marker(".sno-table"),
            Some((DatasetKind::Table, 1))
        );
    }

    #[test]
    fn rejects_unknown_marker() {
        assert_eq!(DatasetKind::parse_marker("not-a-marker"), None);
    }

    #[test]
    fn dataset_path_rejects_reserved_segments() {
        assert!(DatasetPath::new("a/.hidden/b").is_err());
        assert!(DatasetPath::new("/leading").is_err());
        assert!(DatasetPath::new("trailing/").is_err());
        assert!(DatasetPath::new("").is_err());
    }

    #[test]
    fn dataset_path_accepts_nested_paths() {
        let p = DatasetPath::new("surveys/coastal/points").unwrap();
        assert_eq!(p.as_str(), "surveys/coastal/points");
        assert_eq!(
            p.marker_path(DatasetKind::Table, 3),
            "surveys/coastal/points/.table-dataset.v3"
        );
    }

    #[test]
    fn legacy_marker_name_only_for_table() {
        assert_eq!(DatasetKind::Table.legacy_marker_name(), Some(".sno-table"));
        assert_eq!(DatasetKind::Raster.legacy_marker_name(), None);
    }
}
