use kart_types::ColumnId;

use crate::value::DataType;

/// A single column in a dataset's `schema.json` meta-item.
///
/// Column identity is the stable [`ColumnId`], not `name` -- a rename only
/// changes `name`; everything that orders or addresses columns by identity
/// (feature encoding, schema-aware diff) keys off `id`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColumnSchema {
    pub id: ColumnId,
    pub name: String,
    pub data_type: DataType,
    /// `Some(i)` if this column is part of the primary key, giving its
    /// ordinal position within a multi-column key.
    pub pk_index: Option<u32>,
    /// SRID the column's geometries are expected to carry, if this is a
    /// geometry column.
    pub geometry_srid: Option<i32>,
}

/// A dataset's schema: its ordered primary-key columns and its full column
/// set. Both feature encoding and path encoding are pure functions of this.
#[derive(Clone, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnSchema>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    /// Primary-key columns, in key order (by `pk_index`).
    pub fn pk_columns(&self) -> Vec<&ColumnSchema> {
        let mut pk: Vec<&ColumnSchema> = self.columns.iter().filter(|c| c.pk_index.is_some()).collect();
        pk.sort_by_key(|c| c.pk_index.unwrap());
        pk
    }

    /// Non-primary-key columns, sorted by `id` (schema-UUID order) -- this
    /// is the fixed column ordering the feature encoding uses (§3.3).
    pub fn value_columns_in_encoding_order(&self) -> Vec<&ColumnSchema> {
        let mut cols: Vec<&ColumnSchema> = self.columns.iter().filter(|c| c.pk_index.is_none()).collect();
        cols.sort_by_key(|c| c.id);
        cols
    }

    pub fn column_by_name(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_by_id(&self, id: ColumnId) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, pk_index: Option<u32>) -> ColumnSchema {
        ColumnSchema {
            id: ColumnId::new(),
            name: name.to_string(),
            data_type: DataType::Integer,
            pk_index,
            geometry_srid: None,
        }
    }

    #[test]
    fn pk_columns_respect_declared_order() {
        let c0 = col("b", Some(1));
        let c1 = col("a", Some(0));
        let schema = Schema::new(vec![c0, c1]);
        let pk = schema.pk_columns();
        assert_eq!(pk[0].name, "a");
        assert_eq!(pk[1].name, "b");
    }

    #[test]
    fn value_columns_sorted_by_id_not_declaration_order() {
        let a = col("a", None);
        let b = col("b", None);
        let schema = Schema::new(vec![a.clone(), b.clone()]);
        let ordered = schema.value_columns_in_encoding_order();
        let expected_first = if a.id < b.id { &a.name } else { &b.name };
        assert_eq!(&ordered[0].name, expected_first);
    }
}
