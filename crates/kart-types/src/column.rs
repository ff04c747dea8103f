use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity for a schema column, independent of its current name.
///
/// Schema evolution (§3.2 invariant: "renames preserve the UUID") is
/// modelled by keeping this identifier fixed across a column rename --
/// only the `name` field in the owning `schema.json` meta-item changes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnId(Uuid);

impl ColumnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ColumnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ColumnId({})", self.0)
    }
}

impl std::fmt::Display for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_distinct() {
        assert_ne!(ColumnId::new(), ColumnId::new());
    }

    #[test]
    fn roundtrip_through_uuid() {
        let uuid = Uuid::new_v4();
        let id = ColumnId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn serde_roundtrip() {
        let id = ColumnId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: ColumnId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
