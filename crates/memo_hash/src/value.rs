//! Canonical structural representation of hashed values.

/// A value lowered into the form the digest is computed over.
///
/// Produced by [`to_value`](crate::to_value). Integers of every width
/// collapse into [`Value::Int`] so that `1u8` and `1i64` hash alike; floats
/// are kept apart from integers.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `()`, `None`, or a unit struct without fields.
    Unit,
    /// A boolean.
    Bool(bool),
    /// Any integer that fits into `i128`.
    Int(i128),
    /// A `u128` too large for `i128`.
    UInt(u128),
    /// A floating point number.
    Float(f64),
    /// A string or character.
    Str(String),
    /// A raw byte string.
    Bytes(Vec<u8>),
    /// An ordered sequence (vectors, slices, tuples).
    Seq(Vec<Value>),
    /// An unordered collection; element order does not affect the digest.
    Set(Vec<Value>),
    /// Key/value entries; entry order does not affect the digest.
    Map(Vec<(Value, Value)>),
    /// A named struct with its visible fields.
    Object {
        /// The struct's type name.
        name: String,
        /// Visible (non-underscore) fields in declaration order.
        fields: Vec<(String, Value)>,
    },
    /// An enum variant with its payload.
    Variant {
        /// The enum's type name.
        name: String,
        /// The variant name.
        variant: String,
        /// The variant payload, [`Value::Unit`] for unit variants.
        payload: Box<Value>,
    },
    /// A numeric buffer.
    Array {
        /// Element type name, e.g. `"f64"`.
        dtype: String,
        /// Dimensions, outermost first.
        shape: Vec<u64>,
        /// Raw little-endian element bytes.
        data: Vec<u8>,
    },
    /// A normalized code fingerprint.
    Code(String),
    /// A digest supplied by a [`UniqueHashable`](crate::UniqueHashable) type.
    Digest(String),
}

impl Value {
    /// Returns the string content of a [`Value::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` for string keys and field names hidden by convention.
    pub fn is_private_key(&self) -> bool {
        matches!(self, Value::Str(s) if s.starts_with('_'))
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Seq(_) => "sequence",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Object { .. } => "object",
            Value::Variant { .. } => "variant",
            Value::Array { .. } => "array",
            Value::Code(_) => "code",
            Value::Digest(_) => "digest",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_keys() {
        assert!(Value::from("_hidden").is_private_key());
        assert!(!Value::from("visible").is_private_key());
        assert!(!Value::Int(1).is_private_key());
    }

    #[test]
    fn as_str_only_for_strings() {
        assert_eq!(Value::from("a").as_str(), Some("a"));
        assert_eq!(Value::Bool(true).as_str(), None);
    }

    #[test]
    fn kind_names() {
        assert_eq!(Value::UInt(u128::MAX).kind(), "integer");
        assert_eq!(Value::Set(vec![]).kind(), "set");
    }
}
