use std::collections::BTreeMap;

use kart_dataset::DatasetPart;
use kart_store::{ObjectId, ObjectStore};
use kart_types::{DatasetKind, DatasetPath};

use crate::error::WorkcopyResult;

/// A blob's full path together with the part of its dataset it belongs to.
pub struct FoundBlob {
    pub full_path: String,
    pub id: ObjectId,
    pub part: DatasetPart,
}

/// Every dataset found in a tree, keyed by path, with the blobs that make
/// it up grouped underneath.
pub struct DiscoveredDataset {
    pub kind: DatasetKind,
    pub version: u32,
    pub blobs: Vec<FoundBlob>,
}

/// Walk a commit tree and group every recognised dataset blob by the
/// dataset it belongs to. Blobs outside any dataset marker are ignored,
/// same as the diff engine's raw layer.
pub fn discover_datasets(
    store: &dyn ObjectStore,
    tree_id: ObjectId,
) -> WorkcopyResult<BTreeMap<DatasetPath, DiscoveredDataset>> {
    let mut out: BTreeMap<DatasetPath, DiscoveredDataset> = BTreeMap::new();
    walk(store, tree_id, "", &mut out)?;
    Ok(out)
}

fn walk(
    store: &dyn ObjectStore,
    tree_id: ObjectId,
    prefix: &str,
    out: &mut BTreeMap<DatasetPath, DiscoveredDataset>,
) -> WorkcopyResult<()> {
    let Some(tree) = store.read_tree(&tree_id)? else {
        return Ok(());
    };
    for entry in &tree.entries {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}/{}", entry.name)
        };
        if entry.mode.is_tree() {
            walk(store, entry.id, &path, out)?;
        } else {
            let Some((dataset_path, kind, version, part)) = kart_dataset::decode_path(&path)? else {
                continue;
            };
            let dataset = out.entry(dataset_path).or_insert_with(|| DiscoveredDataset {
                kind,
                version,
                blobs: Vec::new(),
            });
            dataset.blobs.push(FoundBlob {
                full_path: path,
                id: entry.id,
                part,
            });
        }
    }
    Ok(())
}
