use crate::index::{AncestorOursTheirs, ConflictEntry};

/// What kind of three-way disagreement a conflict represents, combining
/// which part of a dataset it's in with the shape of the disagreement
/// (§4.6). Tile conflicts share the feature categories: from a merge
/// perspective a tile entry is just another keyed item under a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictCategory {
    /// Both sides independently added a meta item the ancestor didn't have.
    MetaAddAdd,
    /// Both sides edited the same meta item to different values.
    MetaEditEdit,
    /// One side edited a meta item the other side deleted.
    MetaEditDelete,
    /// Both sides independently added a feature or tile at the same key.
    FeatureAddAdd,
    /// Both sides edited the same feature or tile to different values.
    FeatureEditEdit,
    /// One side edited a feature or tile the other side deleted.
    FeatureEditDelete,
    /// A path outside any recognised dataset part (e.g. a plain file in the
    /// working tree) that both sides touched incompatibly.
    Generic,
}

/// Which part of a dataset (if any) a conflicting path belongs to, as far
/// as classification cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictPart {
    Meta,
    Feature,
    None,
}

/// Classify a conflict from the presence/absence pattern of its three
/// variants. Assumes the caller has already filtered out every case that
/// merges trivially (`ours == theirs`, or either side unchanged from the
/// ancestor) -- only genuine disagreements reach this function.
pub fn classify(part: ConflictPart, variants: &AncestorOursTheirs<ConflictEntry>) -> ConflictCategory {
    let has_ancestor = variants.ancestor.is_some();
    let has_ours = variants.ours.is_some();
    let has_theirs = variants.theirs.is_some();

    let shape = match (has_ancestor, has_ours, has_theirs) {
        (false, true, true) => Shape::AddAdd,
        (true, true, true) => Shape::EditEdit,
        (true, _, _) => Shape::EditDelete,
        _ => Shape::EditDelete, // unreachable in practice, trivial cases filtered upstream
    };

    match (part, shape) {
        (ConflictPart::Meta, Shape::AddAdd) => ConflictCategory::MetaAddAdd,
        (ConflictPart::Meta, Shape::EditEdit) => ConflictCategory::MetaEditEdit,
        (ConflictPart::Meta, Shape::EditDelete) => ConflictCategory::MetaEditDelete,
        (ConflictPart::Feature, Shape::AddAdd) => ConflictCategory::FeatureAddAdd,
        (ConflictPart::Feature, Shape::EditEdit) => ConflictCategory::FeatureEditEdit,
        (ConflictPart::Feature, Shape::EditDelete) => ConflictCategory::FeatureEditDelete,
        (ConflictPart::None, _) => ConflictCategory::Generic,
    }
}

enum Shape {
    AddAdd,
    EditEdit,
    EditDelete,
}
