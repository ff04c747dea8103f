use kart_dataset::{DataType, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};

/// Quote an identifier for use in generated SQL, doubling any embedded
/// double quotes the way SQLite expects.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The SQLite column affinity used to store a given Kart column type.
/// SQLite is dynamically typed -- this only sets the declared affinity,
/// it doesn't restrict what can actually be stored -- so the real type
/// enforcement stays in `kart-dataset`'s feature codec.
pub fn sql_type_for(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Null => "BLOB",
        DataType::Boolean => "INTEGER",
        DataType::Integer => "INTEGER",
        DataType::Float => "REAL",
        DataType::Text => "TEXT",
        DataType::Blob => "BLOB",
        DataType::Geometry => "BLOB",
    }
}

/// Convert a decoded Kart [`Value`] into the rusqlite value it's bound as.
/// Geometry is split across two bound parameters (`wkb`, then `srid`); see
/// [`geometry_srid_column`].
pub fn value_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Integer(n) => SqlValue::Integer(*n),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
        Value::Geometry { wkb, .. } => SqlValue::Blob(wkb.clone()),
    }
}

/// Read a stored column back into a [`Value`], given the declared Kart type
/// and (for geometry columns) the SRID read from the column's sidecar.
pub fn sql_to_value(raw: ValueRef<'_>, data_type: DataType, srid: Option<i32>) -> Value {
    if matches!(raw, ValueRef::Null) {
        return Value::Null;
    }
    match data_type {
        DataType::Boolean => Value::Bool(raw.as_i64().unwrap_or(0) != 0),
        DataType::Integer => Value::Integer(raw.as_i64().unwrap_or_default()),
        DataType::Float => Value::Float(raw.as_f64().unwrap_or_default()),
        DataType::Text => Value::Text(raw.as_str().unwrap_or_default().to_string()),
        DataType::Blob => Value::Blob(raw.as_blob().unwrap_or_default().to_vec()),
        DataType::Geometry => Value::Geometry {
            srid: srid.unwrap_or(0),
            wkb: raw.as_blob().unwrap_or_default().to_vec(),
        },
        DataType::Null => Value::Null,
    }
}

/// The name of the extra sidecar column a geometry column gets, carrying
/// its SRID (SQLite has no native geometry type to keep this in-band).
pub fn geometry_srid_column(column_name: &str) -> String {
    format!("{column_name}__srid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_escapes_embedded_quotes() {
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn geometry_roundtrips_through_sql_value_and_back() {
        let value = Value::Geometry {
            srid: 4326,
            wkb: vec![1, 2, 3],
        };
        let sql = value_to_sql(&value);
        let SqlValue::Blob(bytes) = sql else {
            panic!("expected blob")
        };
        let restored = sql_to_value(ValueRef::Blob(&bytes), DataType::Geometry, Some(4326));
        assert_eq!(restored, value);
    }
}
