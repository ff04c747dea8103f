use std::collections::BTreeMap;

use kart_types::ColumnId;

use crate::error::{DatasetError, DatasetResult};
use crate::schema::Schema;
use crate::value::{DataType, Value};

/// A decoded feature: every non-pk column's value, keyed by stable column
/// id. Primary-key values are carried alongside separately (see
/// [`crate::path::decode_1pk_from_filename`]) since they live in the blob's
/// path, not its payload.
pub type Feature = BTreeMap<ColumnId, Value>;

/// Encode a feature's non-pk columns into the compact binary payload
/// described in §3.3/§4.2: a null bitmap followed by tagged, length-prefixed
/// values in schema-UUID order. The primary key is never written here.
///
/// Fails with [`DatasetError::SchemaMismatch`] if a required (non-nullable
/// in practice: every column is nullable, but present) column's value has a
/// type that disagrees with the schema.
pub fn encode_feature(schema: &Schema, feature: &Feature) -> DatasetResult<Vec<u8>> {
    let columns = schema.value_columns_in_encoding_order();

    let mut bitmap = vec![0u8; columns.len().div_ceil(8)];
    for (i, col) in columns.iter().enumerate() {
        let is_null = feature.get(&col.id).map(Value::is_null).unwrap_or(true);
        if is_null {
            bitmap[i / 8] |= 1 << (i % 8);
        }
    }

    let mut out = Vec::new();
    out.extend_from_slice(&(columns.len() as u32).to_le_bytes());
    out.extend_from_slice(&bitmap);

    for col in &columns {
        let value = feature.get(&col.id).unwrap_or(&Value::Null);
        if value.is_null() {
            continue;
        }
        if !col.data_type.accepts(value) {
            return Err(DatasetError::SchemaMismatch(format!(
                "column {} ({}) expected {:?}, got {:?}",
                col.name,
                col.id,
                col.data_type,
                value.type_tag()
            )));
        }
        write_value(&mut out, value);
    }

    Ok(out)
}

/// Inverse of [`encode_feature`]: given the schema and the payload bytes,
/// reconstructs the column-id-keyed feature map (still without pk values).
pub fn decode_feature(schema: &Schema, bytes: &[u8]) -> DatasetResult<Feature> {
    let columns = schema.value_columns_in_encoding_order();

    if bytes.len() < 4 {
        return Err(corrupt("feature payload shorter than header"));
    }
    let declared_count = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
    if declared_count != columns.len() {
        return Err(DatasetError::SchemaMismatch(format!(
            "payload declares {declared_count} columns, schema has {}",
            columns.len()
        )));
    }

    let bitmap_len = columns.len().div_ceil(8);
    let bitmap_start = 4;
    let bitmap_end = bitmap_start + bitmap_len;
    if bytes.len() < bitmap_end {
        return Err(corrupt("feature payload truncated in null bitmap"));
    }
    let bitmap = &bytes[bitmap_start..bitmap_end];

    let mut cursor = bitmap_end;
    let mut out = Feature::new();
    for (i, col) in columns.iter().enumerate() {
        let is_null = bitmap[i / 8] & (1 << (i % 8)) != 0;
        if is_null {
            out.insert(col.id, Value::Null);
            continue;
        }
        let (value, consumed) = read_value(&bytes[cursor..])?;
        if !col.data_type.accepts(&value) {
            return Err(DatasetError::SchemaMismatch(format!(
                "column {} ({}) expected {:?}, got {:?}",
                col.name,
                col.id,
                col.data_type,
                value.type_tag()
            )));
        }
        out.insert(col.id, value);
        cursor += consumed;
    }

    Ok(out)
}

fn corrupt(reason: &str) -> DatasetError {
    DatasetError::CorruptBlob {
        part: "feature",
        path: String::new(),
        reason: reason.to_string(),
    }
}

pub(crate) fn write_value(out: &mut Vec<u8>, value: &Value) {
    out.push(value.type_tag().wire_tag());
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push(*b as u8),
        Value::Integer(n) => out.extend_from_slice(&n.to_le_bytes()),
        Value::Float(f) => out.extend_from_slice(&f.to_le_bytes()),
        Value::Text(s) => {
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        Value::Blob(b) => {
            out.extend_from_slice(&(b.len() as u32).to_le_bytes());
            out.extend_from_slice(b);
        }
        Value::Geometry { srid, wkb } => {
            out.extend_from_slice(&srid.to_le_bytes());
            out.extend_from_slice(&(wkb.len() as u32).to_le_bytes());
            out.extend_from_slice(wkb);
        }
    }
}

pub(crate) fn read_value(bytes: &[u8]) -> DatasetResult<(Value, usize)> {
    if bytes.is_empty() {
        return Err(corrupt("expected a value tag, found end of payload"));
    }
    let tag = DataType::from_wire_tag(bytes[0]).ok_or_else(|| corrupt("unknown value tag"))?;
    let rest = &bytes[1..];
    match tag {
        DataType::Null => Ok((Value::Null, 1)),
        DataType::Boolean => {
            let b = *rest.first().ok_or_else(|| corrupt("truncated bool"))? != 0;
            Ok((Value::Bool(b), 2))
        }
        DataType::Integer => {
            let n = i64::from_le_bytes(
                rest.get(0..8)
                    .ok_or_else(|| corrupt("truncated integer"))?
                    .try_into()
                    .unwrap(),
            );
            Ok((Value::Integer(n), 9))
        }
        DataType::Float => {
            let f = f64::from_le_bytes(
                rest.get(0..8)
                    .ok_or_else(|| corrupt("truncated float"))?
                    .try_into()
                    .unwrap(),
            );
            Ok((Value::Float(f), 9))
        }
        DataType::Text => {
            let len = u32::from_le_bytes(
                rest.get(0..4)
                    .ok_or_else(|| corrupt("truncated text length"))?
                    .try_into()
                    .unwrap(),
            ) as usize;
            let data = rest
                .get(4..4 + len)
                .ok_or_else(|| corrupt("truncated text payload"))?;
            let s = String::from_utf8(data.to_vec())
                .map_err(|_| corrupt("text column is not valid UTF-8"))?;
            Ok((Value::Text(s), 1 + 4 + len))
        }
        DataType::Blob => {
            let len = u32::from_le_bytes(
                rest.get(0..4)
                    .ok_or_else(|| corrupt("truncated blob length"))?
                    .try_into()
                    .unwrap(),
            ) as usize;
            let data = rest
                .get(4..4 + len)
                .ok_or_else(|| corrupt("truncated blob payload"))?;
            Ok((Value::Blob(data.to_vec()), 1 + 4 + len))
        }
        DataType::Geometry => {
            let srid = i32::from_le_bytes(
                rest.get(0..4)
                    .ok_or_else(|| corrupt("truncated geometry srid"))?
                    .try_into()
                    .unwrap(),
            );
            let len = u32::from_le_bytes(
                rest.get(4..8)
                    .ok_or_else(|| corrupt("truncated geometry length"))?
                    .try_into()
                    .unwrap(),
            ) as usize;
            let wkb = rest
                .get(8..8 + len)
                .ok_or_else(|| corrupt("truncated geometry payload"))?;
            Ok((
                Value::Geometry {
                    srid,
                    wkb: wkb.to_vec(),
                },
                1 + 8 + len,
            ))
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::schema::ColumnSchema;
    use proptest::prelude::*;

    /// A `Value` matching one chosen `DataType`, used so the generated
    /// feature always satisfies `DataType::accepts` and `encode_feature`
    /// never hits `SchemaMismatch`. Floats exclude NaN, since NaN != NaN
    /// would make the round-trip equality assertion meaningless.
    fn value_for(data_type: DataType) -> BoxedStrategy<Value> {
        match data_type {
            DataType::Null => Just(Value::Null).boxed(),
            DataType::Boolean => any::<bool>().prop_map(Value::Bool).boxed(),
            DataType::Integer => any::<i64>().prop_map(Value::Integer).boxed(),
            DataType::Float => (-1e30f64..1e30).prop_map(Value::Float).boxed(),
            DataType::Text => ".{0,32}".prop_map(Value::Text).boxed(),
            DataType::Blob => proptest::collection::vec(any::<u8>(), 0..32)
                .prop_map(Value::Blob)
                .boxed(),
            DataType::Geometry => (any::<i32>(), proptest::collection::vec(any::<u8>(), 0..32))
                .prop_map(|(srid, wkb)| Value::Geometry { srid, wkb })
                .boxed(),
        }
    }

    fn data_type() -> impl Strategy<Value = DataType> {
        prop_oneof![
            Just(DataType::Boolean),
            Just(DataType::Integer),
            Just(DataType::Float),
            Just(DataType::Text),
            Just(DataType::Blob),
            Just(DataType::Geometry),
        ]
    }

    /// A schema of 1-6 non-pk columns with distinct random `DataType`s, plus
    /// a fully populated feature (no column left out), and a 50/50 nullable
    /// variant of the same feature with every column set to `Null` instead.
    fn schema_and_feature() -> impl Strategy<Value = (Schema, Feature)> {
        proptest::collection::vec((data_type(), any::<bool>()), 1..6).prop_map(|specs| {
            let mut schema_cols = Vec::new();
            let mut feature = Feature::new();
            for (i, (dt, is_null)) in specs.into_iter().enumerate() {
                let id = ColumnId::new();
                schema_cols.push(ColumnSchema {
                    id,
                    name: format!("col{i}"),
                    data_type: dt,
                    pk_index: None,
                    geometry_srid: None,
                });
                let value = if is_null {
                    Value::Null
                } else {
                    // Deterministic-enough sample value per type; the
                    // dedicated `value_for` strategy below exercises the
                    // full value space, this one just needs *a* valid value
                    // so the schema/feature pairing itself can vary.
                    match dt {
                        DataType::Boolean => Value::Bool(true),
                        DataType::Integer => Value::Integer(7),
                        DataType::Float => Value::Float(1.5),
                        DataType::Text => Value::Text("x".into()),
                        DataType::Blob => Value::Blob(vec![1, 2, 3]),
                        DataType::Geometry => Value::Geometry {
                            srid: 4326,
                            wkb: vec![9],
                        },
                        DataType::Null => Value::Null,
                    }
                };
                feature.insert(id, value);
            }
            (Schema::new(schema_cols), feature)
        })
    }

    proptest! {
        /// Codec round-trip (§8 property 1): for any schema and any feature
        /// whose values match that schema, `decode(encode(r)) == r`.
        #[test]
        fn decode_encode_is_identity((schema, feature) in schema_and_feature()) {
            let bytes = encode_feature(&schema, &feature).unwrap();
            let decoded = decode_feature(&schema, &bytes).unwrap();
            prop_assert_eq!(decoded, feature);
        }

        /// The same property exercised per-type with a wide value space,
        /// rather than one fixed sample value per column.
        #[test]
        fn single_column_value_roundtrips((dt, value) in data_type().prop_flat_map(|dt| (Just(dt), value_for(dt)))) {
            let id = ColumnId::new();
            let schema = Schema::new(vec![ColumnSchema {
                id,
                name: "v".into(),
                data_type: dt,
                pk_index: None,
                geometry_srid: None,
            }]);
            let mut feature = Feature::new();
            feature.insert(id, value.clone());
            let bytes = encode_feature(&schema, &feature).unwrap();
            let decoded = decode_feature(&schema, &bytes).unwrap();
            prop_assert_eq!(decoded.get(&id), Some(&value));
        }

        /// Re-encoding the same feature twice is deterministic (encoding
        /// order is schema-id order, not dependent on any hidden state).
        #[test]
        fn encoding_is_deterministic((schema, feature) in schema_and_feature()) {
            let bytes_a = encode_feature(&schema, &feature).unwrap();
            let bytes_b = encode_feature(&schema, &feature).unwrap();
            prop_assert_eq!(bytes_a, bytes_b);
        }
    }
}
