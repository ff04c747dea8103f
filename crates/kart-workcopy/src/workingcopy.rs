use std::collections::BTreeMap;
use std::path::Path;

use kart_dataset::{decode_1pk_from_filename, decode_feature, encode_feature, DataType, DatasetPart, Feature, Schema, Value};
use kart_store::{EntryMode, ObjectId, ObjectStore};
use kart_types::{DatasetKind, DatasetPath};
use rusqlite::{Connection, OptionalExtension, ToSql};

use crate::ddl::{self, table_name_for, track_table_name};
use crate::discover::{discover_datasets, DiscoveredDataset};
use crate::error::{WorkcopyError, WorkcopyResult};
use crate::migrate;
use crate::sql::{geometry_srid_column, quote_ident, sql_to_value, value_to_sql};
use crate::treebuild;

/// A SQLite-backed materialisation of a single commit tree: one data table
/// per table dataset (plus a track table of dirty primary keys kept current
/// by triggers), and a lightweight filename-to-oid mirror for tile datasets,
/// which are edited file-at-a-time through LFS rather than through SQL
/// (§4.5).
pub struct WorkingCopy {
    conn: Connection,
}

impl WorkingCopy {
    /// Create a fresh working copy database and materialise `tree_id` into
    /// it. Fails if `db_path` already exists.
    pub fn create(db_path: impl AsRef<Path>, store: &dyn ObjectStore, tree_id: ObjectId) -> WorkcopyResult<Self> {
        let conn = Connection::open(db_path)?;
        let wc = Self { conn };
        wc.ensure_state_table()?;
        wc.materialise_all(store, tree_id)?;
        wc.set_checked_out_tree(tree_id)?;
        Ok(wc)
    }

    /// Open an already-materialised working copy database.
    pub fn open(db_path: impl AsRef<Path>) -> WorkcopyResult<Self> {
        let conn = Connection::open(db_path)?;
        Ok(Self { conn })
    }

    fn ensure_state_table(&self) -> WorkcopyResult<()> {
        self.conn
            .execute_batch("CREATE TABLE IF NOT EXISTS kart_state (key TEXT PRIMARY KEY, value TEXT NOT NULL)")?;
        Ok(())
    }

    /// The tree this working copy currently believes it's checked out to.
    pub fn checked_out_tree(&self) -> WorkcopyResult<Option<ObjectId>> {
        let hex: Option<String> = self
            .conn
            .query_row("SELECT value FROM kart_state WHERE key = 'tree'", [], |row| row.get(0))
            .optional()?;
        match hex {
            None => Ok(None),
            Some(h) => ObjectId::from_hex(&h).map(Some).map_err(|e| WorkcopyError::CorruptState(e.to_string())),
        }
    }

    fn set_checked_out_tree(&self, tree_id: ObjectId) -> WorkcopyResult<()> {
        self.conn.execute(
            "INSERT INTO kart_state (key, value) VALUES ('tree', ?1) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [tree_id.to_hex()],
        )?;
        Ok(())
    }

    /// Whether any dataset has rows that haven't been committed yet.
    pub fn is_dirty(&self) -> WorkcopyResult<bool> {
        for table in self.track_table_names()? {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", quote_ident(&table)), [], |r| r.get(0))?;
            if n > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn first_dirty_dataset(&self) -> WorkcopyResult<Option<DatasetPath>> {
        for table in self.track_table_names()? {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", quote_ident(&table)), [], |r| r.get(0))?;
            if n > 0 {
                let data_table = table.strip_suffix("__track").unwrap_or(&table);
                let dataset_str = data_table.replace("__", "/");
                return Ok(DatasetPath::new(dataset_str).ok());
            }
        }
        Ok(None)
    }

    /// Discard uncommitted edits and re-materialise `new_tree` from scratch.
    /// Refuses to proceed over dirty rows, or over a narrowing schema
    /// change, unless `force` is set (§4.5, §7).
    pub fn reset(&mut self, store: &dyn ObjectStore, new_tree: ObjectId, force: bool) -> WorkcopyResult<()> {
        if !force && self.is_dirty()? {
            let dataset = self
                .first_dirty_dataset()?
                .unwrap_or_else(|| DatasetPath::new("working-copy").expect("valid literal path"));
            return Err(WorkcopyError::DirtyWorkingCopy { dataset });
        }

        if let Some(old_tree) = self.checked_out_tree()? {
            let old_datasets = discover_datasets(store, old_tree)?;
            let new_datasets = discover_datasets(store, new_tree)?;
            for (path, new_dataset) in &new_datasets {
                if new_dataset.kind != DatasetKind::Table {
                    continue;
                }
                if let Some(old_dataset) = old_datasets.get(path) {
                    if old_dataset.kind == DatasetKind::Table {
                        let old_schema = read_schema(store, old_dataset)?;
                        let new_schema = read_schema(store, new_dataset)?;
                        migrate::check_narrowing(path, &old_schema, &new_schema, force)?;
                    }
                }
            }
        }

        self.drop_all_dataset_tables()?;
        self.materialise_all(store, new_tree)?;
        self.set_checked_out_tree(new_tree)?;
        Ok(())
    }

    /// Write every dirty row back into the object store as a new tree,
    /// leaving every unchanged blob (including all dataset meta) untouched.
    /// Clears dirty tracking on success; the caller is responsible for
    /// wrapping the returned tree id in a commit.
    pub fn write_tree(&self, store: &dyn ObjectStore) -> WorkcopyResult<ObjectId> {
        let tree_id = self.pending_tree(store)?;
        self.clear_all_track_tables()?;
        self.set_checked_out_tree(tree_id)?;
        Ok(tree_id)
    }

    /// Diff this working copy's uncommitted edits against an arbitrary
    /// tree, by diffing the tree it *would* produce if committed right now
    /// against `other_tree` (§4.4/§4.5 integration).
    pub fn diff_to_tree(
        &self,
        store: &dyn ObjectStore,
        other_tree: ObjectId,
        filter: &kart_diff::KeyFilter,
    ) -> WorkcopyResult<kart_diff::RepoDiff> {
        let pending = self.pending_tree(store)?;
        Ok(kart_diff::diff_trees(store, Some(other_tree), pending, filter)?)
    }

    fn pending_tree(&self, store: &dyn ObjectStore) -> WorkcopyResult<ObjectId> {
        let Some(tree_id) = self.checked_out_tree()? else {
            return Err(WorkcopyError::CorruptState("no tree checked out".into()));
        };
        let changes = self.pending_changes(store)?;
        if changes.is_empty() {
            return Ok(tree_id);
        }
        let mut flat = treebuild::flatten_tree(store, Some(tree_id))?;
        for (path, value) in changes {
            match value {
                Some(id) => {
                    flat.insert(path, (id, EntryMode::Blob));
                }
                None => {
                    flat.remove(&path);
                }
            }
        }
        Ok(treebuild::build_tree(store, &flat)?)
    }

    /// Every feature blob path whose row has been inserted/updated/deleted
    /// since the last reset or commit, re-encoded against the current
    /// table contents. `None` means the row was deleted.
    fn pending_changes(&self, store: &dyn ObjectStore) -> WorkcopyResult<BTreeMap<String, Option<ObjectId>>> {
        let mut changes = BTreeMap::new();
        let Some(tree_id) = self.checked_out_tree()? else {
            return Ok(changes);
        };
        let datasets = discover_datasets(store, tree_id)?;
        for (dataset_path, dataset) in &datasets {
            if dataset.kind != DatasetKind::Table {
                continue;
            }
            let table = table_name_for(dataset_path);
            let track = track_table_name(&table);
            if !self.table_exists(&track)? {
                continue;
            }
            let schema = read_schema(store, dataset)?;
            let pk_cols = schema.pk_columns();
            for pk_values in self.read_track_rows(&track, &pk_cols)? {
                let full_path = format!(
                    "{}/{}",
                    dataset_path.marker_path(dataset.kind, dataset.version),
                    kart_dataset::encode_1pk_to_path(&schema, &pk_values)
                );
                match self.read_row(&table, &schema, &pk_values)? {
                    Some(feature) => {
                        let bytes = encode_feature(&schema, &feature)?;
                        changes.insert(full_path, Some(store.write_blob(&bytes)?));
                    }
                    None => {
                        changes.insert(full_path, None);
                    }
                }
            }
        }
        Ok(changes)
    }

    /// Verify every row in every data table re-encodes to exactly the blob
    /// it was materialised from, i.e. this working copy hasn't drifted from
    /// what `checked_out_tree` says it should contain.
    pub fn assert_db_tree_match(&self, store: &dyn ObjectStore) -> WorkcopyResult<()> {
        let Some(tree_id) = self.checked_out_tree()? else {
            return Ok(());
        };
        let datasets = discover_datasets(store, tree_id)?;
        let mut mismatches = Vec::new();
        for (dataset_path, dataset) in &datasets {
            if dataset.kind != DatasetKind::Table {
                continue;
            }
            let table = table_name_for(dataset_path);
            if !self.table_exists(&table)? {
                mismatches.push(dataset_path.to_string());
                continue;
            }
            let schema = read_schema(store, dataset)?;
            for blob in &dataset.blobs {
                let DatasetPart::Feature { filename } = &blob.part else {
                    continue;
                };
                let pk_values = decode_1pk_from_filename(&schema, filename)?;
                let expected = store
                    .read_blob(&blob.id)?
                    .ok_or_else(|| WorkcopyError::Store(kart_store::StoreError::NotFound(blob.id)))?;
                match self.read_row(&table, &schema, &pk_values)? {
                    None => mismatches.push(blob.full_path.clone()),
                    Some(feature) => {
                        let actual = encode_feature(&schema, &feature)?;
                        if actual != expected {
                            mismatches.push(blob.full_path.clone());
                        }
                    }
                }
            }
        }
        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(WorkcopyError::TreeMismatch(mismatches))
        }
    }

    fn materialise_all(&self, store: &dyn ObjectStore, tree_id: ObjectId) -> WorkcopyResult<()> {
        let datasets = discover_datasets(store, tree_id)?;
        for (path, dataset) in &datasets {
            match dataset.kind {
                DatasetKind::Table => self.materialise_table_dataset(store, path, dataset)?,
                DatasetKind::PointCloud | DatasetKind::Raster => self.materialise_tile_mirror(path, dataset)?,
            }
        }
        Ok(())
    }

    fn materialise_table_dataset(
        &self,
        store: &dyn ObjectStore,
        path: &DatasetPath,
        dataset: &DiscoveredDataset,
    ) -> WorkcopyResult<()> {
        let schema = read_schema(store, dataset)?;
        let table = table_name_for(path);
        self.conn.execute_batch(&ddl::create_table_sql(&table, &schema))?;
        self.conn.execute_batch(&ddl::create_track_table_sql(&table, &schema))?;
        for trigger_sql in ddl::create_triggers_sql(&table, &schema) {
            self.conn.execute_batch(&trigger_sql)?;
        }
        for blob in &dataset.blobs {
            let DatasetPart::Feature { filename } = &blob.part else {
                continue;
            };
            let pk_values = decode_1pk_from_filename(&schema, filename)?;
            let bytes = store
                .read_blob(&blob.id)?
                .ok_or_else(|| WorkcopyError::Store(kart_store::StoreError::NotFound(blob.id)))?;
            let feature = decode_feature(&schema, &bytes)?;
            self.insert_row(&table, &schema, &pk_values, &feature)?;
        }
        // loading the checkout itself isn't a user edit -- the triggers just
        // fired for every row we inserted above, so clear what they recorded.
        self.conn
            .execute(&format!("DELETE FROM {}", quote_ident(&track_table_name(&table))), [])?;
        Ok(())
    }

    fn materialise_tile_mirror(&self, path: &DatasetPath, dataset: &DiscoveredDataset) -> WorkcopyResult<()> {
        let table = table_name_for(path);
        self.conn.execute_batch(&ddl::create_tile_mirror_sql(&table))?;
        for blob in &dataset.blobs {
            let DatasetPart::Tile { filename } = &blob.part else {
                continue;
            };
            self.conn.execute(
                &format!(
                    "INSERT INTO {} (\"filename\", \"oid\") VALUES (?1, ?2)",
                    quote_ident(&table)
                ),
                rusqlite::params![filename, blob.id.to_hex()],
            )?;
        }
        Ok(())
    }

    fn insert_row(&self, table: &str, schema: &Schema, pk_values: &[Value], feature: &Feature) -> WorkcopyResult<()> {
        let mut columns = Vec::new();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();

        for (col, value) in schema.pk_columns().into_iter().zip(pk_values) {
            columns.push(quote_ident(&col.name));
            values.push(value_to_sql(value));
            if col.data_type == DataType::Geometry {
                columns.push(quote_ident(&geometry_srid_column(&col.name)));
                values.push(geometry_srid_sql(value));
            }
        }
        for col in schema.value_columns_in_encoding_order() {
            let value = feature.get(&col.id).cloned().unwrap_or(Value::Null);
            columns.push(quote_ident(&col.name));
            if col.data_type == DataType::Geometry {
                columns.push(quote_ident(&geometry_srid_column(&col.name)));
                let srid = geometry_srid_sql(&value);
                values.push(value_to_sql(&value));
                values.push(srid);
            } else {
                values.push(value_to_sql(&value));
            }
        }

        let placeholders: Vec<&str> = values.iter().map(|_| "?").collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
        self.conn.execute(&sql, params.as_slice())?;
        Ok(())
    }

    fn read_row(&self, table: &str, schema: &Schema, pk_values: &[Value]) -> WorkcopyResult<Option<Feature>> {
        let pk_cols = schema.pk_columns();
        let where_clause: Vec<String> = pk_cols.iter().map(|c| format!("{} = ?", quote_ident(&c.name))).collect();
        let value_cols = schema.value_columns_in_encoding_order();

        let mut select_list = Vec::new();
        for col in &value_cols {
            select_list.push(quote_ident(&col.name));
            if col.data_type == DataType::Geometry {
                select_list.push(quote_ident(&geometry_srid_column(&col.name)));
            }
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            if select_list.is_empty() {
                "1".to_string()
            } else {
                select_list.join(", ")
            },
            quote_ident(table),
            where_clause.join(" AND ")
        );

        let params: Vec<rusqlite::types::Value> = pk_values.iter().map(value_to_sql).collect();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(param_refs.as_slice())?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let mut feature = Feature::new();
        let mut idx = 0;
        for col in &value_cols {
            let raw = row.get_ref(idx)?;
            if col.data_type == DataType::Geometry {
                let srid: Option<i64> = row.get(idx + 1)?;
                feature.insert(col.id, sql_to_value(raw, col.data_type, srid.map(|s| s as i32)));
                idx += 2;
            } else {
                feature.insert(col.id, sql_to_value(raw, col.data_type, None));
                idx += 1;
            }
        }
        Ok(Some(feature))
    }

    fn read_track_rows(&self, track_table: &str, pk_cols: &[&kart_dataset::ColumnSchema]) -> WorkcopyResult<Vec<Vec<Value>>> {
        let select_list: Vec<String> = pk_cols.iter().map(|c| quote_ident(&c.name)).collect();
        let sql = format!("SELECT {} FROM {}", select_list.join(", "), quote_ident(track_table));
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(pk_cols.len());
            for (i, col) in pk_cols.iter().enumerate() {
                values.push(sql_to_value(row.get_ref(i)?, col.data_type, None));
            }
            out.push(values);
        }
        Ok(out)
    }

    fn table_exists(&self, name: &str) -> WorkcopyResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    fn track_table_names(&self) -> WorkcopyResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE '%\\_\\_track' ESCAPE '\\'")?;
        let names = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut out = Vec::new();
        for name in names {
            out.push(name?);
        }
        Ok(out)
    }

    fn drop_all_dataset_tables(&self) -> WorkcopyResult<()> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name != 'kart_state'")?;
        let names: Vec<String> = stmt.query_map([], |r| r.get(0))?.collect::<rusqlite::Result<_>>()?;
        for name in names {
            self.conn.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(&name)), [])?;
        }
        Ok(())
    }

    fn clear_all_track_tables(&self) -> WorkcopyResult<()> {
        for table in self.track_table_names()? {
            self.conn.execute(&format!("DELETE FROM {}", quote_ident(&table)), [])?;
        }
        Ok(())
    }
}

fn geometry_srid_sql(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Geometry { srid, .. } => rusqlite::types::Value::Integer(*srid as i64),
        _ => rusqlite::types::Value::Null,
    }
}

fn read_schema(store: &dyn ObjectStore, dataset: &DiscoveredDataset) -> WorkcopyResult<Schema> {
    let blob = dataset
        .blobs
        .iter()
        .find(|b| matches!(&b.part, DatasetPart::Meta { item_name } if item_name == "schema.json"))
        .ok_or_else(|| WorkcopyError::CorruptState("dataset has no schema.json meta item".into()))?;
    let bytes = store
        .read_blob(&blob.id)?
        .ok_or_else(|| WorkcopyError::Store(kart_store::StoreError::NotFound(blob.id)))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_dataset::ColumnSchema;
    use kart_store::{EntryMode as Mode, GitObjectStore};
    use kart_types::ColumnId;
    use tempfile::tempdir;

    fn make_schema() -> (Schema, ColumnId, ColumnId) {
        let pk_id = ColumnId::new();
        let name_id = ColumnId::new();
        let schema = Schema::new(vec![
            ColumnSchema {
                id: pk_id,
                name: "fid".into(),
                data_type: DataType::Integer,
                pk_index: Some(0),
                geometry_srid: None,
            },
            ColumnSchema {
                id: name_id,
                name: "name".into(),
                data_type: DataType::Text,
                pk_index: None,
                geometry_srid: None,
            },
        ]);
        (schema, pk_id, name_id)
    }

    fn build_tree_with_one_feature(
        store: &GitObjectStore,
        schema: &Schema,
        name_id: ColumnId,
        pk: i64,
        name: &str,
    ) -> ObjectId {
        let schema_bytes = serde_json::to_vec(schema).unwrap();
        let schema_blob = store.write_blob(&schema_bytes).unwrap();

        let mut feature = Feature::new();
        feature.insert(name_id, Value::Text(name.to_string()));
        let feature_bytes = encode_feature(schema, &feature).unwrap();
        let feature_blob = store.write_blob(&feature_bytes).unwrap();
        let feature_path = kart_dataset::encode_1pk_to_path(schema, &[Value::Integer(pk)]);

        let mut editor = store.tree_editor(None);
        editor.insert("roads/.table-dataset.v3/meta/schema.json", schema_blob, Mode::Blob);
        editor.insert(
            &format!("roads/.table-dataset.v3/{feature_path}"),
            feature_blob,
            Mode::Blob,
        );
        editor.flush().unwrap()
    }

    #[test]
    fn create_materialises_a_row_that_can_be_read_back() {
        let dir = tempdir().unwrap();
        let store = GitObjectStore::init_bare(dir.path().join("repo")).unwrap();
        let (schema, _pk_id, name_id) = make_schema();
        let tree = build_tree_with_one_feature(&store, &schema, name_id, 1, "Main St");

        let wc = WorkingCopy::create(dir.path().join("wc.db"), &store, tree).unwrap();
        assert_eq!(wc.checked_out_tree().unwrap(), Some(tree));
        assert!(!wc.is_dirty().unwrap());

        let row = wc.read_row("roads", &schema, &[Value::Integer(1)]).unwrap().unwrap();
        assert_eq!(row.get(&name_id), Some(&Value::Text("Main St".to_string())));
    }

    #[test]
    fn editing_a_row_marks_it_dirty_and_write_tree_produces_a_new_blob() {
        let dir = tempdir().unwrap();
        let store = GitObjectStore::init_bare(dir.path().join("repo")).unwrap();
        let (schema, _pk_id, name_id) = make_schema();
        let tree = build_tree_with_one_feature(&store, &schema, name_id, 1, "Main St");

        let wc = WorkingCopy::create(dir.path().join("wc.db"), &store, tree).unwrap();
        wc.conn
            .execute("UPDATE \"roads\" SET \"name\" = 'Elm St' WHERE \"fid\" = 1", [])
            .unwrap();
        assert!(wc.is_dirty().unwrap());

        let new_tree = wc.write_tree(&store).unwrap();
        assert_ne!(new_tree, tree);
        assert!(!wc.is_dirty().unwrap());
        assert_eq!(wc.checked_out_tree().unwrap(), Some(new_tree));

        let feature_path = kart_dataset::encode_1pk_to_path(&schema, &[Value::Integer(1)]);
        let full_path = format!("roads/.table-dataset.v3/{feature_path}");
        let blob_id = treebuild::flatten_tree(&store, Some(new_tree)).unwrap()[&full_path].0;
        let bytes = store.read_blob(&blob_id).unwrap().unwrap();
        let decoded = decode_feature(&schema, &bytes).unwrap();
        assert_eq!(decoded.get(&name_id), Some(&Value::Text("Elm St".to_string())));
    }

    #[test]
    fn assert_db_tree_match_detects_manual_drift() {
        let dir = tempdir().unwrap();
        let store = GitObjectStore::init_bare(dir.path().join("repo")).unwrap();
        let (schema, _pk_id, name_id) = make_schema();
        let tree = build_tree_with_one_feature(&store, &schema, name_id, 1, "Main St");

        let wc = WorkingCopy::create(dir.path().join("wc.db"), &store, tree).unwrap();
        assert!(wc.assert_db_tree_match(&store).is_ok());

        // bypass triggers entirely: direct DELETE with tracking cleared, so
        // this row disappears without being recorded as a dirty edit.
        wc.conn.execute("DELETE FROM \"roads\" WHERE \"fid\" = 1", []).unwrap();
        wc.conn.execute("DELETE FROM \"roads__track\"", []).unwrap();

        let err = wc.assert_db_tree_match(&store).unwrap_err();
        assert!(matches!(err, WorkcopyError::TreeMismatch(_)));
    }

    #[test]
    fn reset_refuses_to_discard_dirty_rows_without_force() {
        let dir = tempdir().unwrap();
        let store = GitObjectStore::init_bare(dir.path().join("repo")).unwrap();
        let (schema, _pk_id, name_id) = make_schema();
        let tree = build_tree_with_one_feature(&store, &schema, name_id, 1, "Main St");

        let mut wc = WorkingCopy::create(dir.path().join("wc.db"), &store, tree).unwrap();
        wc.conn
            .execute("UPDATE \"roads\" SET \"name\" = 'Elm St' WHERE \"fid\" = 1", [])
            .unwrap();

        let err = wc.reset(&store, tree, false).unwrap_err();
        assert!(matches!(err, WorkcopyError::DirtyWorkingCopy { .. }));

        wc.reset(&store, tree, true).unwrap();
        assert!(!wc.is_dirty().unwrap());
    }
}
