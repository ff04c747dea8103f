use std::collections::{BTreeMap, BTreeSet};

use kart_types::DatasetPath;

/// Filters applied at enumeration time, so the engine never decodes a blob
/// the caller has already excluded (§4.4).
#[derive(Clone, Debug, Default)]
pub enum KeyFilter {
    #[default]
    MatchAll,
    Datasets(BTreeMap<DatasetPath, PartFilter>),
}

impl KeyFilter {
    pub fn single_dataset(path: DatasetPath, filter: PartFilter) -> Self {
        let mut map = BTreeMap::new();
        map.insert(path, filter);
        Self::Datasets(map)
    }

    pub fn part_filter_for(&self, dataset_path: &DatasetPath) -> Option<PartFilter> {
        match self {
            KeyFilter::MatchAll => Some(PartFilter::default()),
            KeyFilter::Datasets(map) => map.get(dataset_path).cloned(),
        }
    }
}

/// Per-dataset filter: which meta items and which feature/tile keys to
/// include.
#[derive(Clone, Debug)]
pub struct PartFilter {
    pub meta: KeySet,
    pub feature: KeySet,
}

impl Default for PartFilter {
    fn default() -> Self {
        Self {
            meta: KeySet::MatchAll,
            feature: KeySet::MatchAll,
        }
    }
}

#[derive(Clone, Debug)]
pub enum KeySet {
    MatchAll,
    Set(BTreeSet<String>),
}

impl KeySet {
    pub fn contains(&self, key: &str) -> bool {
        match self {
            KeySet::MatchAll => true,
            KeySet::Set(set) => set.contains(key),
        }
    }
}
