use kart_dataset::{ColumnSchema, DataType, Schema};
use kart_types::DatasetPath;

use crate::error::{WorkcopyError, WorkcopyResult};
use crate::sql::{geometry_srid_column, quote_ident, sql_type_for};

/// One column's fate when migrating a table from its old schema to a new
/// one, keyed by the column's stable id rather than its name (§4.5).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnMigration {
    /// A column the new schema introduces that the old one didn't have:
    /// existing rows get it as `NULL`.
    Add(ColumnSchema),
    /// A column the new schema no longer has: its data is discarded.
    Drop(ColumnSchema),
    /// A column whose declared type changed compatibly (e.g. integer ->
    /// text). Existing values are left as-is; SQLite's dynamic typing means
    /// no data movement is required.
    Widen { old: ColumnSchema, new: ColumnSchema },
}

/// Whether a type change from `from` to `to` is a widening (information-
/// preserving) change. Identity is trivially a widen.
pub fn is_widening(from: DataType, to: DataType) -> bool {
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (DataType::Boolean, DataType::Integer)
            | (DataType::Boolean, DataType::Text)
            | (DataType::Integer, DataType::Float)
            | (DataType::Integer, DataType::Text)
            | (DataType::Float, DataType::Text)
    )
}

/// Refuse a migration that would narrow a column's type without `force`
/// (§4.5, §7: `WorkcopyError::NarrowingRefused`).
pub fn check_narrowing(dataset: &DatasetPath, old: &Schema, new: &Schema, force: bool) -> WorkcopyResult<()> {
    if force {
        return Ok(());
    }
    for new_col in &new.columns {
        if let Some(old_col) = old.column_by_id(new_col.id) {
            if old_col.data_type != new_col.data_type && !is_widening(old_col.data_type, new_col.data_type) {
                return Err(WorkcopyError::NarrowingRefused {
                    dataset: dataset.clone(),
                    column: new_col.name.clone(),
                    from: old_col.data_type,
                    to: new_col.data_type,
                });
            }
        }
    }
    Ok(())
}

/// Work out the column-level migration plan between two schemas, by
/// stable column id rather than declaration order or name.
pub fn plan_migration(old: &Schema, new: &Schema) -> Vec<ColumnMigration> {
    let mut plan = Vec::new();
    for new_col in &new.columns {
        match old.column_by_id(new_col.id) {
            None => plan.push(ColumnMigration::Add(new_col.clone())),
            Some(old_col) if old_col.data_type != new_col.data_type || old_col.name != new_col.name => {
                plan.push(ColumnMigration::Widen {
                    old: old_col.clone(),
                    new: new_col.clone(),
                })
            }
            Some(_) => {}
        }
    }
    for old_col in &old.columns {
        if new.column_by_id(old_col.id).is_none() {
            plan.push(ColumnMigration::Drop(old_col.clone()));
        }
    }
    plan
}

/// Apply a migration plan's structural changes (`ADD COLUMN` / `DROP
/// COLUMN`) to an already-existing table. Column renames are handled as an
/// `ALTER TABLE ... RENAME COLUMN` so existing values survive; widened
/// value types need no DDL since SQLite columns are dynamically typed.
pub fn apply_migration_ddl(
    conn: &rusqlite::Connection,
    table_name: &str,
    plan: &[ColumnMigration],
) -> rusqlite::Result<()> {
    let table = quote_ident(table_name);
    for migration in plan {
        match migration {
            ColumnMigration::Add(col) => {
                let col_name = quote_ident(&col.name);
                let sql_type = sql_type_for(col.data_type);
                conn.execute(
                    &format!("ALTER TABLE {table} ADD COLUMN {col_name} {sql_type}"),
                    [],
                )?;
                if col.data_type == DataType::Geometry {
                    let srid_col = quote_ident(&geometry_srid_column(&col.name));
                    conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {srid_col} INTEGER"), [])?;
                }
            }
            ColumnMigration::Drop(col) => {
                let col_name = quote_ident(&col.name);
                conn.execute(&format!("ALTER TABLE {table} DROP COLUMN {col_name}"), [])?;
                if col.data_type == DataType::Geometry {
                    let srid_col = quote_ident(&geometry_srid_column(&col.name));
                    conn.execute(&format!("ALTER TABLE {table} DROP COLUMN {srid_col}"), [])?;
                }
            }
            ColumnMigration::Widen { old, new } => {
                if old.name != new.name {
                    let from = quote_ident(&old.name);
                    let to = quote_ident(&new.name);
                    conn.execute(&format!("ALTER TABLE {table} RENAME COLUMN {from} TO {to}"), [])?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_types::ColumnId;

    fn col(id: ColumnId, name: &str, data_type: DataType) -> ColumnSchema {
        ColumnSchema {
            id,
            name: name.to_string(),
            data_type,
            pk_index: None,
            geometry_srid: None,
        }
    }

    #[test]
    fn integer_to_float_is_widening() {
        assert!(is_widening(DataType::Integer, DataType::Float));
        assert!(!is_widening(DataType::Float, DataType::Integer));
    }

    #[test]
    fn narrowing_without_force_is_refused() {
        let id = ColumnId::new();
        let old = Schema::new(vec![col(id, "count", DataType::Text)]);
        let new = Schema::new(vec![col(id, "count", DataType::Integer)]);
        let dataset = DatasetPath::new("roads").unwrap();
        let err = check_narrowing(&dataset, &old, &new, false).unwrap_err();
        assert!(matches!(err, WorkcopyError::NarrowingRefused { .. }));
    }

    #[test]
    fn narrowing_with_force_is_allowed() {
        let id = ColumnId::new();
        let old = Schema::new(vec![col(id, "count", DataType::Text)]);
        let new = Schema::new(vec![col(id, "count", DataType::Integer)]);
        let dataset = DatasetPath::new("roads").unwrap();
        assert!(check_narrowing(&dataset, &old, &new, true).is_ok());
    }

    #[test]
    fn plan_detects_added_and_dropped_columns() {
        let kept = ColumnId::new();
        let dropped = ColumnId::new();
        let added = ColumnId::new();
        let old = Schema::new(vec![
            col(kept, "name", DataType::Text),
            col(dropped, "old_field", DataType::Integer),
        ]);
        let new = Schema::new(vec![
            col(kept, "name", DataType::Text),
            col(added, "new_field", DataType::Boolean),
        ]);
        let plan = plan_migration(&old, &new);
        assert!(plan.iter().any(|m| matches!(m, ColumnMigration::Add(c) if c.id == added)));
        assert!(plan.iter().any(|m| matches!(m, ColumnMigration::Drop(c) if c.id == dropped)));
    }
}
