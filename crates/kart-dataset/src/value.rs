/// A single column value, as stored in a feature blob.
///
/// `Value` covers exactly the primitive types the binary feature encoding
/// understands (§3.3/§4.2); richer GPKG/OGR types are mapped onto these by
/// the (out-of-core) import drivers before they ever reach this crate.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    /// SRID-tagged well-known-binary geometry. SRID 0 means "unknown".
    Geometry { srid: i32, wkb: Vec<u8> },
}

impl Value {
    pub fn type_tag(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Boolean,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Text(_) => DataType::Text,
            Value::Blob(_) => DataType::Blob,
            Value::Geometry { .. } => DataType::Geometry,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// The declared type of a schema column. A record's value must either match
/// its column's `DataType` or be `Value::Null` -- `DatasetError::SchemaMismatch`
/// otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Null,
    Boolean,
    Integer,
    Float,
    Text,
    Blob,
    Geometry,
}

impl DataType {
    /// The tag byte this type is encoded with in a feature blob.
    pub(crate) fn wire_tag(self) -> u8 {
        match self {
            DataType::Null => 0,
            DataType::Boolean => 1,
            DataType::Integer => 2,
            DataType::Float => 3,
            DataType::Text => 4,
            DataType::Blob => 5,
            DataType::Geometry => 6,
        }
    }

    pub(crate) fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(DataType::Null),
            1 => Some(DataType::Boolean),
            2 => Some(DataType::Integer),
            3 => Some(DataType::Float),
            4 => Some(DataType::Text),
            5 => Some(DataType::Blob),
            6 => Some(DataType::Geometry),
            _ => None,
        }
    }

    /// Whether a value of this type is compatible with a column declared
    /// with `self` (used for the schema-mismatch check).
    pub fn accepts(self, value: &Value) -> bool {
        value.is_null() || value.type_tag() == self
    }
}
