//! Tile/PAM sidecar coalescing (§4.4): a tile's raster data and its `.aux.xml`
//! PAM sidecar are two separate blobs in the tree, but conceptually one
//! change. A change that only touches recomputed statistics inside the PAM
//! file (the GDAL `Info -stats` scenario, S6) should be invisible to `diff`
//! and `status`.

use kart_dataset::{decode_tile_pointer, TilePointer};

use crate::delta::Delta;

/// One coalesced tile change: the tile's own delta plus its PAM sidecar's
/// delta, if either changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoalescedTileDelta {
    pub tile: Option<Delta>,
    pub pam: Option<Delta>,
}

/// Split a dataset's raw tile deltas into (name of tile, is this a PAM
/// sidecar) pairs, matching a sidecar's filename to its tile by stripping
/// the `.aux.xml` suffix.
fn tile_stem(filename: &str) -> (&str, bool) {
    match filename.strip_suffix(".aux.xml") {
        Some(stem) => (stem, true),
        None => (filename, false),
    }
}

/// Coalesce a dataset's flat tile deltas into one entry per tile, merging a
/// tile delta with its PAM sidecar delta when both are present under the
/// same stem.
pub fn coalesce_tile_deltas(deltas: Vec<Delta>) -> Vec<(String, CoalescedTileDelta)> {
    use std::collections::BTreeMap;

    let mut by_stem: BTreeMap<String, CoalescedTileDelta> = BTreeMap::new();

    for delta in deltas {
        let key = delta
            .new_key
            .as_deref()
            .or(delta.old_key.as_deref())
            .unwrap_or_default();
        let (stem, is_pam) = tile_stem(key);
        let entry = by_stem.entry(stem.to_string()).or_insert(CoalescedTileDelta {
            tile: None,
            pam: None,
        });
        if is_pam {
            entry.pam = Some(delta);
        } else {
            entry.tile = Some(delta);
        }
    }

    by_stem.into_iter().collect()
}

/// Given a coalesced tile delta, decide whether it should be suppressed
/// because the only thing that changed is recomputed PAM statistics: the
/// tile's own pointer is unchanged (or absent), and the PAM pointer's `oid`
/// differs but every other field (format, crs, extent, dimensions, name) is
/// identical -- a GDAL stats recompute only touches the PAM blob's content,
/// not any of those.
pub fn is_pure_pam_stats_change(entry: &CoalescedTileDelta, old_pam: Option<&[u8]>, new_pam: Option<&[u8]>) -> bool {
    if entry.tile.is_some() {
        return false;
    }
    let Some(pam_delta) = &entry.pam else {
        return false;
    };
    if pam_delta.old_id.is_none() || pam_delta.new_id.is_none() {
        // an add or a delete of the PAM file is a real change
        return false;
    }

    let parse = |bytes: Option<&[u8]>| -> Option<TilePointer> { decode_tile_pointer(bytes?).ok() };
    let (Some(old), Some(new)) = (parse(old_pam), parse(new_pam)) else {
        return false;
    };

    old.oid != new.oid
        && non_stat_fields(&old) == non_stat_fields(&new)
}

fn non_stat_fields(pointer: &TilePointer) -> Vec<(String, String)> {
    pointer
        .extra
        .iter()
        .filter(|(k, _)| *k != "statsComputed")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
