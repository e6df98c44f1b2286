//! A `serde::Serializer` that lowers any value into a [`Value`] tree.
//!
//! Struct fields and string map keys starting with `_` are dropped here,
//! before they ever reach the digest. Special forms (digests, sets, arrays,
//! code) arrive as newtype structs carrying reserved names.

use serde::ser::{self, Serialize};

use crate::error::HashError;
use crate::value::Value;

/// Maximum nesting depth accepted by [`to_value`].
///
/// Owned Rust data cannot form reference cycles through `Serialize`, but
/// `Rc`/`RefCell` graphs and pathological recursion can; those fail with
/// [`HashError::DepthExceeded`] instead of overflowing the stack.
pub const MAX_DEPTH: usize = 256;

pub(crate) const DIGEST_TOKEN: &str = "$memo::private::Digest";
pub(crate) const SET_TOKEN: &str = "$memo::private::Set";
pub(crate) const ARRAY_TOKEN: &str = "$memo::private::Array";
pub(crate) const CODE_TOKEN: &str = "$memo::private::Code";

/// Lowers a serializable value into its canonical [`Value`] form.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, HashError> {
    value.serialize(ValueSerializer { depth: 0 })
}

#[derive(Clone, Copy)]
struct ValueSerializer {
    depth: usize,
}

impl ValueSerializer {
    fn child(self) -> Result<Self, HashError> {
        let depth = self.depth + 1;
        if depth > MAX_DEPTH {
            return Err(HashError::DepthExceeded { limit: MAX_DEPTH });
        }
        Ok(Self { depth })
    }
}

fn expect_str(what: &'static str, value: Value) -> Result<String, HashError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(HashError::Malformed {
            what,
            reason: format!("expected string, found {}", other.kind()),
        }),
    }
}

fn lower_array(value: Value) -> Result<Value, HashError> {
    let malformed = |reason: &str| HashError::Malformed {
        what: "array",
        reason: reason.to_string(),
    };
    let Value::Seq(parts) = value else {
        return Err(malformed("expected (dtype, shape, data)"));
    };
    let [dtype, shape, data]: [Value; 3] = parts
        .try_into()
        .map_err(|_| malformed("expected three parts"))?;
    let dtype = expect_str("array", dtype)?;
    let Value::Seq(dims) = shape else {
        return Err(malformed("shape is not a sequence"));
    };
    let shape = dims
        .into_iter()
        .map(|d| match d {
            Value::Int(n) => u64::try_from(n).map_err(|_| malformed("negative dimension")),
            _ => Err(malformed("dimension is not an integer")),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let Value::Bytes(data) = data else {
        return Err(malformed("data is not a byte buffer"));
    };
    Ok(Value::Array { dtype, shape, data })
}

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = HashError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantSeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = ObjectBuilder;
    type SerializeStructVariant = VariantObjectBuilder;

    fn serialize_bool(self, v: bool) -> Result<Value, HashError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, HashError> {
        Ok(Value::Int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, HashError> {
        Ok(Value::Int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, HashError> {
        Ok(Value::Int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, HashError> {
        Ok(Value::Int(v.into()))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, HashError> {
        Ok(Value::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, HashError> {
        Ok(Value::Int(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, HashError> {
        Ok(Value::Int(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, HashError> {
        Ok(Value::Int(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, HashError> {
        Ok(Value::Int(v.into()))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, HashError> {
        Ok(i128::try_from(v).map_or(Value::UInt(v), Value::Int))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, HashError> {
        Ok(Value::Float(v.into()))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, HashError> {
        Ok(Value::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<Value, HashError> {
        Ok(Value::Str(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, HashError> {
        Ok(Value::Str(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, HashError> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value, HashError> {
        Ok(Value::Unit)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, HashError> {
        value.serialize(self.child()?)
    }

    fn serialize_unit(self) -> Result<Value, HashError> {
        Ok(Value::Unit)
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Value, HashError> {
        Ok(Value::Object {
            name: name.to_string(),
            fields: Vec::new(),
        })
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, HashError> {
        Ok(Value::Variant {
            name: name.to_string(),
            variant: variant.to_string(),
            payload: Box::new(Value::Unit),
        })
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Value, HashError> {
        match name {
            DIGEST_TOKEN => Ok(Value::Digest(expect_str(
                "digest",
                value.serialize(self.child()?)?,
            )?)),
            CODE_TOKEN => Ok(Value::Code(expect_str(
                "code",
                value.serialize(self.child()?)?,
            )?)),
            SET_TOKEN => match value.serialize(self.child()?)? {
                Value::Seq(items) => Ok(Value::Set(items)),
                other => Err(HashError::Malformed {
                    what: "set",
                    reason: format!("expected sequence, found {}", other.kind()),
                }),
            },
            ARRAY_TOKEN => lower_array(value.serialize(self.child()?)?),
            _ => value.serialize(self.child()?),
        }
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, HashError> {
        Ok(Value::Variant {
            name: name.to_string(),
            variant: variant.to_string(),
            payload: Box::new(value.serialize(self.child()?)?),
        })
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, HashError> {
        Ok(SeqBuilder {
            ser: self.child()?,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, HashError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, HashError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantSeqBuilder, HashError> {
        Ok(VariantSeqBuilder {
            name,
            variant,
            inner: self.serialize_seq(Some(len))?,
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapBuilder, HashError> {
        Ok(MapBuilder {
            ser: self.child()?,
            entries: Vec::with_capacity(len.unwrap_or(0)),
            pending_key: None,
        })
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> Result<ObjectBuilder, HashError> {
        Ok(ObjectBuilder {
            ser: self.child()?,
            name,
            fields: Vec::with_capacity(len),
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantObjectBuilder, HashError> {
        Ok(VariantObjectBuilder {
            variant,
            inner: self.serialize_struct(name, len)?,
        })
    }
}

#[doc(hidden)]
pub struct SeqBuilder {
    ser: ValueSerializer,
    items: Vec<Value>,
}

impl SeqBuilder {
    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), HashError> {
        self.items.push(value.serialize(self.ser)?);
        Ok(())
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Value;
    type Error = HashError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), HashError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, HashError> {
        Ok(Value::Seq(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Value;
    type Error = HashError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), HashError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, HashError> {
        Ok(Value::Seq(self.items))
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Value;
    type Error = HashError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), HashError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, HashError> {
        Ok(Value::Seq(self.items))
    }
}

#[doc(hidden)]
pub struct VariantSeqBuilder {
    name: &'static str,
    variant: &'static str,
    inner: SeqBuilder,
}

impl ser::SerializeTupleVariant for VariantSeqBuilder {
    type Ok = Value;
    type Error = HashError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), HashError> {
        self.inner.push(value)
    }

    fn end(self) -> Result<Value, HashError> {
        Ok(Value::Variant {
            name: self.name.to_string(),
            variant: self.variant.to_string(),
            payload: Box::new(Value::Seq(self.inner.items)),
        })
    }
}

#[doc(hidden)]
pub struct MapBuilder {
    ser: ValueSerializer,
    entries: Vec<(Value, Value)>,
    pending_key: Option<Value>,
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = HashError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), HashError> {
        self.pending_key = Some(key.serialize(self.ser)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), HashError> {
        let key = self.pending_key.take().ok_or_else(|| HashError::Malformed {
            what: "map",
            reason: "value serialized before its key".to_string(),
        })?;
        if key.is_private_key() {
            return Ok(());
        }
        let value = value.serialize(self.ser)?;
        self.entries.push((key, value));
        Ok(())
    }

    fn end(self) -> Result<Value, HashError> {
        Ok(Value::Map(self.entries))
    }
}

#[doc(hidden)]
pub struct ObjectBuilder {
    ser: ValueSerializer,
    name: &'static str,
    fields: Vec<(String, Value)>,
}

impl ObjectBuilder {
    fn push<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<(), HashError> {
        if key.starts_with('_') {
            return Ok(());
        }
        self.fields.push((key.to_string(), value.serialize(self.ser)?));
        Ok(())
    }

    fn into_value(self) -> Value {
        Value::Object {
            name: self.name.to_string(),
            fields: self.fields,
        }
    }
}

impl ser::SerializeStruct for ObjectBuilder {
    type Ok = Value;
    type Error = HashError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), HashError> {
        self.push(key, value)
    }

    fn end(self) -> Result<Value, HashError> {
        Ok(self.into_value())
    }
}

#[doc(hidden)]
pub struct VariantObjectBuilder {
    variant: &'static str,
    inner: ObjectBuilder,
}

impl ser::SerializeStructVariant for VariantObjectBuilder {
    type Ok = Value;
    type Error = HashError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), HashError> {
        self.inner.push(key, value)
    }

    fn end(self) -> Result<Value, HashError> {
        let name = self.inner.name.to_string();
        Ok(Value::Variant {
            name,
            variant: self.variant.to_string(),
            payload: Box::new(self.inner.into_value()),
        })
    }
}
