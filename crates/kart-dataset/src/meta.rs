use std::collections::BTreeMap;

/// A dataset's meta-items: named blobs under `meta/` (e.g. `title`,
/// `schema.json`, `crs/EPSG:4326.wkt`). Values are kept as raw bytes --
/// this crate doesn't care whether a given item is JSON, WKT or XML, only
/// the dataset-kind-specific layer above it does.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetaItems {
    items: BTreeMap<String, Vec<u8>>,
}

impl MetaItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.items.get(name).map(Vec::as_slice)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Vec<u8>) {
        self.items.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.items.remove(name)
    }

    /// List item names matching a simple glob: `*` matches any run of
    /// characters, everything else is literal. Used for things like
    /// `crs/*.wkt` or `band/band-*-rat.xml`.
    pub fn list_matching(&self, pattern: &str) -> Vec<&str> {
        self.items
            .keys()
            .filter(|name| glob_match(pattern, name))
            .map(String::as_str)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

fn glob_match(pattern: &str, candidate: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == candidate,
        Some((prefix, suffix)) => {
            candidate.len() >= prefix.len() + suffix.len()
                && candidate.starts_with(prefix)
                && candidate.ends_with(suffix)
        }
    }
}

/// Outcome of merging one meta-item key across ancestor/ours/theirs, per
/// the tile-dataset meta merge policy (§4.2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetaMergeOutcome {
    /// All present sides agree (or only one side changed from the ancestor);
    /// carries the agreed value.
    Merged(Vec<u8>),
    /// A category-label map where no key took two different values across
    /// sides; carries the merged map, re-serialised by the caller.
    MergedMap(BTreeMap<String, String>),
    /// Sides disagree and can't be reconciled automatically: every distinct
    /// observed variant is kept for the user to resolve at commit time.
    ListOfConflicts(Vec<Vec<u8>>),
}

/// Per-key meta-item merge policy for tile datasets (§4.2): byte-equal
/// items merge trivially; category-label maps (JSON objects of string to
/// string) merge if no key takes two different values; otherwise a
/// list-of-conflicts sentinel holding all observed variants is produced.
pub fn merge_meta_item(
    ancestor: Option<&[u8]>,
    ours: Option<&[u8]>,
    theirs: Option<&[u8]>,
) -> MetaMergeOutcome {
    // trivial cases: one side unchanged from ancestor, or both sides equal
    if ours == theirs {
        return MetaMergeOutcome::Merged(ours.unwrap_or_default().to_vec());
    }
    if ours == ancestor {
        return MetaMergeOutcome::Merged(theirs.unwrap_or_default().to_vec());
    }
    if theirs == ancestor {
        return MetaMergeOutcome::Merged(ours.unwrap_or_default().to_vec());
    }

    // attempt category-label map merge: both sides must parse as a flat
    // string-to-string JSON object
    let parse_map = |bytes: Option<&[u8]>| -> Option<BTreeMap<String, String>> {
        let bytes = bytes?;
        serde_json::from_slice(bytes).ok()
    };
    if let (Some(ours_map), Some(theirs_map)) = (parse_map(ours), parse_map(theirs)) {
        let ancestor_map = parse_map(ancestor).unwrap_or_default();

        let mut keys: Vec<&String> = ours_map.keys().chain(theirs_map.keys()).collect();
        keys.sort();
        keys.dedup();

        let mut merged = BTreeMap::new();
        let mut disagreement = false;
        for k in keys {
            let o = ours_map.get(k);
            let t = theirs_map.get(k);
            let a = ancestor_map.get(k);
            let winner = if o == t {
                o.or(t)
            } else if o == a {
                t
            } else if t == a {
                o
            } else {
                disagreement = true;
                None
            };
            if let Some(v) = winner {
                merged.insert(k.clone(), v.clone());
            }
        }

        if !disagreement {
            return MetaMergeOutcome::MergedMap(merged);
        }
    }

    let mut variants: Vec<Vec<u8>> = Vec::new();
    for side in [ancestor, ours, theirs].into_iter().flatten() {
        if !variants.iter().any(|v| v.as_slice() == side) {
            variants.push(side.to_vec());
        }
    }
    MetaMergeOutcome::ListOfConflicts(variants)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_matching_supports_glob_prefix_suffix() {
        let mut items = MetaItems::new();
        items.set("crs/EPSG:4326.wkt", b"WKT".to_vec());
        items.set("crs/EPSG:2193.wkt", b"WKT2".to_vec());
        items.set("title", b"My Dataset".to_vec());
        let mut matches = items.list_matching("crs/*.wkt");
        matches.sort();
        assert_eq!(matches, vec!["crs/EPSG:2193.wkt", "crs/EPSG:4326.wkt"]);
    }

    #[test]
    fn byte_equal_items_merge_trivially() {
        let outcome = merge_meta_item(Some(b"a"), Some(b"b"), Some(b"b"));
        assert_eq!(outcome, MetaMergeOutcome::Merged(b"b".to_vec()));
    }

    #[test]
    fn unchanged_side_takes_the_other_sides_edit() {
        let outcome = merge_meta_item(Some(b"a"), Some(b"a"), Some(b"b"));
        assert_eq!(outcome, MetaMergeOutcome::Merged(b"b".to_vec()));
    }

    #[test]
    fn disagreeing_non_map_items_produce_conflict_list() {
        let outcome = merge_meta_item(Some(b"a"), Some(b"b"), Some(b"c"));
        match outcome {
            MetaMergeOutcome::ListOfConflicts(variants) => {
                assert_eq!(variants.len(), 3);
            }
            other => panic!("expected ListOfConflicts, got {other:?}"),
        }
    }

    #[test]
    fn category_label_maps_merge_when_keys_dont_collide() {
        let ancestor = br#"{"1":"road"}"#;
        let ours = br#"{"1":"road","2":"river"}"#;
        let theirs = br#"{"1":"road","3":"rail"}"#;
        let outcome = merge_meta_item(Some(ancestor), Some(ours), Some(theirs));
        match outcome {
            MetaMergeOutcome::MergedMap(map) => {
                assert_eq!(map.get("2").unwrap(), "river");
                assert_eq!(map.get("3").unwrap(), "rail");
            }
            other => panic!("expected MergedMap, got {other:?}"),
        }
    }
}
