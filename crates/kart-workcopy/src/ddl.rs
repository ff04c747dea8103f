use kart_dataset::{DataType, Schema};
use kart_types::DatasetPath;

use crate::sql::{geometry_srid_column, quote_ident, sql_type_for};

/// The SQLite table name a dataset's data table is materialised under.
/// Slashes aren't legal in an unquoted-safe identifier convention here, so
/// nested dataset paths are flattened with a double underscore.
pub fn table_name_for(dataset: &DatasetPath) -> String {
    dataset.as_str().replace('/', "__")
}

/// The sibling table that mirrors a data table's primary-key columns only,
/// kept dirty by triggers so a reset/commit never has to diff the whole
/// table to find edited rows.
pub fn track_table_name(table_name: &str) -> String {
    format!("{table_name}__track")
}

/// `CREATE TABLE` for a table dataset's data table: one column per schema
/// column (plus a `__srid` sidecar per geometry column) and a composite
/// primary key over the schema's pk columns, in pk order.
pub fn create_table_sql(table_name: &str, schema: &Schema) -> String {
    let table = quote_ident(table_name);
    let mut columns = Vec::new();
    for col in &schema.columns {
        columns.push(format!("{} {}", quote_ident(&col.name), sql_type_for(col.data_type)));
        if col.data_type == DataType::Geometry {
            columns.push(format!("{} INTEGER", quote_ident(&geometry_srid_column(&col.name))));
        }
    }
    let pk_cols: Vec<String> = schema.pk_columns().iter().map(|c| quote_ident(&c.name)).collect();
    columns.push(format!("PRIMARY KEY ({})", pk_cols.join(", ")));
    format!("CREATE TABLE {table} (\n  {}\n)", columns.join(",\n  "))
}

/// `CREATE TABLE` for a data table's track table: just the pk columns.
pub fn create_track_table_sql(table_name: &str, schema: &Schema) -> String {
    let track = quote_ident(&track_table_name(table_name));
    let pk_cols = schema.pk_columns();
    let mut columns: Vec<String> = pk_cols
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), sql_type_for(c.data_type)))
        .collect();
    let pk_names: Vec<String> = pk_cols.iter().map(|c| quote_ident(&c.name)).collect();
    columns.push(format!("PRIMARY KEY ({})", pk_names.join(", ")));
    format!("CREATE TABLE {track} (\n  {}\n)", columns.join(",\n  "))
}

/// The three `AFTER INSERT/UPDATE/DELETE` triggers that keep a track table
/// populated with the pk of every row touched since it was last cleared.
pub fn create_triggers_sql(table_name: &str, schema: &Schema) -> Vec<String> {
    let table = quote_ident(table_name);
    let track = quote_ident(&track_table_name(table_name));
    let pk_cols = schema.pk_columns();
    let pk_names: Vec<String> = pk_cols.iter().map(|c| quote_ident(&c.name)).collect();
    let insert_cols = pk_names.join(", ");

    let new_values: Vec<String> = pk_names.iter().map(|n| format!("NEW.{n}")).collect();
    let old_values: Vec<String> = pk_names.iter().map(|n| format!("OLD.{n}")).collect();

    vec![
        format!(
            "CREATE TRIGGER {}_ai AFTER INSERT ON {table} BEGIN\n  INSERT OR REPLACE INTO {track} ({insert_cols}) VALUES ({});\nEND",
            table_name,
            new_values.join(", ")
        ),
        format!(
            "CREATE TRIGGER {}_au AFTER UPDATE ON {table} BEGIN\n  INSERT OR REPLACE INTO {track} ({insert_cols}) VALUES ({});\n  INSERT OR REPLACE INTO {track} ({insert_cols}) VALUES ({});\nEND",
            table_name,
            new_values.join(", "),
            old_values.join(", ")
        ),
        format!(
            "CREATE TRIGGER {}_ad AFTER DELETE ON {table} BEGIN\n  INSERT OR REPLACE INTO {track} ({insert_cols}) VALUES ({});\nEND",
            table_name,
            old_values.join(", ")
        ),
    ]
}

/// `CREATE TABLE` for a tile/point-cloud/raster dataset's lightweight
/// mirror: filename to blob id, no per-row triggers since those datasets
/// are edited file-at-a-time through LFS rather than through SQL.
pub fn create_tile_mirror_sql(table_name: &str) -> String {
    let table = quote_ident(table_name);
    format!("CREATE TABLE {table} (\n  \"filename\" TEXT PRIMARY KEY,\n  \"oid\" TEXT NOT NULL\n)")
}
