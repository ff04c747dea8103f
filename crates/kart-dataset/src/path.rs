use base64::Engine;
use kart_crypto::FanOutHasher;
use kart_types::{DatasetKind, DatasetPath};

use crate::error::{DatasetError, DatasetResult};
use crate::feature::{read_value, write_value};
use crate::schema::Schema;
use crate::value::Value;

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Encode a (possibly multi-column) primary key into the bytes that are
/// hashed for fan-out and base64-encoded into the filename. Columns are
/// concatenated in schema pk order (§3.3).
fn pk_to_bytes(schema: &Schema, pk_values: &[Value]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in pk_values {
        write_value(&mut out, value);
    }
    out
}

/// `feature/<f1>/<f2>/<b64(pk)>`, relative to the dataset's marker
/// directory. `f1`/`f2` are the first two 2-hex-char slices of
/// `sha1(pk_bytes)`; the filename is the filename-safe base64 of the same
/// pk bytes, so the path is invertible (§3.3, testable property 2).
pub fn encode_1pk_to_path(schema: &Schema, pk_values: &[Value]) -> String {
    let pk_bytes = pk_to_bytes(schema, pk_values);
    let hash_hex = FanOutHasher::PRIMARY_KEY.digest_hex(&pk_bytes);
    let filename = B64.encode(&pk_bytes);
    format!("feature/{}/{}/{}", &hash_hex[0..2], &hash_hex[2..4], filename)
}

/// Inverse of [`encode_1pk_to_path`]'s filename component: decode the
/// trailing path segment back into primary-key values, using the schema's
/// pk column types to know how many bytes each value consumes.
pub fn decode_1pk_from_filename(schema: &Schema, filename: &str) -> DatasetResult<Vec<Value>> {
    let bytes = B64
        .decode(filename)
        .map_err(|e| DatasetError::CorruptBlob {
            part: "feature",
            path: filename.to_string(),
            reason: format!("primary key is not valid base64: {e}"),
        })?;

    let pk_cols = schema.pk_columns();
    let mut values = Vec::with_capacity(pk_cols.len());
    let mut cursor = 0;
    for _ in &pk_cols {
        let (value, consumed) = read_value(&bytes[cursor..]).map_err(|_| DatasetError::CorruptBlob {
            part: "feature",
            path: filename.to_string(),
            reason: "primary key bytes don't match schema pk column types".to_string(),
        })?;
        values.push(value);
        cursor += consumed;
    }
    if cursor != bytes.len() {
        return Err(DatasetError::CorruptBlob {
            part: "feature",
            path: filename.to_string(),
            reason: "trailing bytes after decoding primary key".to_string(),
        });
    }
    Ok(values)
}

/// `tile/<h1>/<name>`: a single-level hex fan-out over a digest of the
/// tile's filename stem (§3.4, §4.2 `tile_path_for`).
pub fn tile_path_for(filename: &str) -> String {
    let hash_hex = FanOutHasher::TILE_NAME.digest_hex(filename.as_bytes());
    format!("tile/{}/{}", &hash_hex[0..2], filename)
}

/// The part of a dataset a blob path falls under, once the marker directory
/// has been stripped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetPart {
    Meta { item_name: String },
    Feature { filename: String },
    Tile { filename: String },
}

/// Split a full blob path (as found walking a commit tree) at its dataset
/// marker directory, returning the owning dataset's path, its kind and
/// format version, and which part of the dataset the remaining path names.
///
/// Returns `None` if `full_path` doesn't contain a recognised marker
/// directory segment at all (i.e. it isn't a Kart dataset blob).
pub fn decode_path(full_path: &str) -> DatasetResult<Option<(DatasetPath, DatasetKind, u32, DatasetPart)>> {
    let segments: Vec<&str> = full_path.split('/').collect();
    let marker_index = segments
        .iter()
        .position(|s| DatasetKind::parse_marker(s).is_some());

    let Some(marker_index) = marker_index else {
        return Ok(None);
    };
    let (kind, version) = DatasetKind::parse_marker(segments[marker_index]).unwrap();

    let dataset_path_str = segments[..marker_index].join("/");
    let dataset_path = DatasetPath::new(dataset_path_str)?;

    let rest = &segments[marker_index + 1..];
    let part = match rest {
        ["meta", item_name @ ..] if !item_name.is_empty() => DatasetPart::Meta {
            item_name: item_name.join("/"),
        },
        ["feature", _f1, _f2, filename] => DatasetPart::Feature {
            filename: filename.to_string(),
        },
        ["tile", _h1, filename] => DatasetPart::Tile {
            filename: filename.to_string(),
        },
        _ => return Err(DatasetError::UnrecognisedPath(full_path.to_string())),
    };

    Ok(Some((dataset_path, kind, version, part)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSchema;
    use crate::value::DataType;
    use kart_types::ColumnId;

    fn single_int_pk_schema() -> Schema {
        Schema::new(vec![ColumnSchema {
            id: ColumnId::new(),
            name: "fid".to_string(),
            data_type: DataType::Integer,
            pk_index: Some(0),
            geometry_srid: None,
        }])
    }

    #[test]
    fn pk_path_roundtrip() {
        let schema = single_int_pk_schema();
        let pk = vec![Value::Integer(9999)];
        let path = encode_1pk_to_path(&schema, &pk);
        assert!(path.starts_with("feature/"));

        let filename = path.rsplit('/').next().unwrap();
        let decoded = decode_1pk_from_filename(&schema, filename).unwrap();
        assert_eq!(decoded, pk);
    }

    #[test]
    fn fanout_is_deterministic_pure_function_of_pk() {
        let schema = single_int_pk_schema();
        let a = encode_1pk_to_path(&schema, &[Value::Integer(1)]);
        let b = encode_1pk_to_path(&schema, &[Value::Integer(1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn tile_path_has_single_fanout_level() {
        let path = tile_path_for("tile_0_0.tif");
        let parts: Vec<&str> = path.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "tile");
        assert_eq!(parts[2], "tile_0_0.tif");
    }

    #[test]
    fn decode_path_splits_feature_blob() {
        let full = "surveys/points/.table-dataset.v3/feature/ab/cd/xyz==";
        let (dataset_path, kind, version, part) = decode_path(full).unwrap().unwrap();
        assert_eq!(dataset_path.as_str(), "surveys/points");
        assert_eq!(kind, DatasetKind::Table);
        assert_eq!(version, 3);
        assert_eq!(
            part,
            DatasetPart::Feature {
                filename: "xyz==".to_string()
            }
        );
    }

    #[test]
    fn decode_path_splits_meta_item() {
        let full = "roads/.table-dataset.v3/meta/schema.json";
        let (_, _, _, part) = decode_path(full).unwrap().unwrap();
        assert_eq!(
            part,
            DatasetPart::Meta {
                item_name: "schema.json".to_string()
            }
        );
    }

    #[test]
    fn decode_path_returns_none_for_unrelated_path() {
        assert!(decode_path("some/ordinary/file.txt").unwrap().is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::schema::ColumnSchema;
    use crate::value::DataType;
    use kart_types::ColumnId;
    use proptest::prelude::*;

    /// A schema with `n` integer pk columns, in declaration order 0..n
    /// (matching `pk_index`).
    fn multi_int_pk(n: usize) -> Schema {
        let columns = (0..n)
            .map(|i| ColumnSchema {
                id: ColumnId::new(),
                name: format!("pk{i}"),
                data_type: DataType::Integer,
                pk_index: Some(i as u32),
                geometry_srid: None,
            })
            .collect();
        Schema::new(columns)
    }

    fn pk_values(n: usize) -> impl Strategy<Value = Vec<Value>> {
        proptest::collection::vec(any::<i64>().prop_map(Value::Integer), n..=n)
    }

    proptest! {
        /// Path-key consistency (§8 property 2): for any single-column
        /// integer primary key, decoding the filename segment of its
        /// encoded path recovers exactly that key.
        #[test]
        fn single_column_pk_path_roundtrips(pk in any::<i64>()) {
            let schema = multi_int_pk(1);
            let pk_values = vec![Value::Integer(pk)];
            let path = encode_1pk_to_path(&schema, &pk_values);
            let filename = path.rsplit('/').next().unwrap();
            let decoded = decode_1pk_from_filename(&schema, filename).unwrap();
            prop_assert_eq!(decoded, pk_values);
        }

        /// The same property for multi-column primary keys (§3.3: "the
        /// concatenation order is the schema order of pk columns").
        #[test]
        fn multi_column_pk_path_roundtrips(values in pk_values(3)) {
            let schema = multi_int_pk(3);
            let path = encode_1pk_to_path(&schema, &values);
            let filename = path.rsplit('/').next().unwrap();
            let decoded = decode_1pk_from_filename(&schema, filename).unwrap();
            prop_assert_eq!(decoded, values);
        }

        /// Fan-out determinism (§8 property 3): `encode_1pk_to_path` is a
        /// pure function of the pk value and the schema -- calling it twice
        /// on the same inputs always yields the same path.
        #[test]
        fn pk_path_is_a_pure_function_of_pk_and_schema(pk in any::<i64>()) {
            let schema = multi_int_pk(1);
            let pk_values = vec![Value::Integer(pk)];
            let a = encode_1pk_to_path(&schema, &pk_values);
            let b = encode_1pk_to_path(&schema, &pk_values);
            prop_assert_eq!(a, b);
        }

        /// Same determinism property for the tile fan-out path.
        #[test]
        fn tile_path_is_a_pure_function_of_filename(name in "[a-zA-Z0-9_.-]{1,32}") {
            let a = tile_path_for(&name);
            let b = tile_path_for(&name);
            prop_assert_eq!(a, b);
        }

        /// `decode_path` recovers the exact feature filename segment that
        /// `encode_1pk_to_path` produced, round-tripping through a full
        /// dataset blob path rather than just the bare filename.
        #[test]
        fn decode_path_recovers_encoded_feature_filename(pk in any::<i64>()) {
            let schema = multi_int_pk(1);
            let pk_values = vec![Value::Integer(pk)];
            let rel_path = encode_1pk_to_path(&schema, &pk_values);
            let full_path = format!("roads/.table-dataset.v3/{rel_path}");
            let (_, _, _, part) = decode_path(&full_path).unwrap().unwrap();
            let expected_filename = rel_path.rsplit('/').next().unwrap().to_string();
            prop_assert_eq!(part, DatasetPart::Feature { filename: expected_filename });
        }
    }
}
