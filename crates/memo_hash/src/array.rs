//! Numeric buffers hashed by dtype, shape, and raw element bytes.

use serde::{Serialize, Serializer};

use crate::error::HashError;
use crate::ser::ARRAY_TOKEN;

/// A scalar type that can live in an [`NdArray`].
pub trait Element: Copy {
    /// Stable element type name folded into the digest.
    const DTYPE: &'static str;

    /// Appends the little-endian encoding of `self`.
    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: &'static str = $name;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_element! {
    f32 => "f32",
    f64 => "f64",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
}

impl Element for bool {
    const DTYPE: &'static str = "bool";

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }
}

/// A borrowed, row-major numeric array.
///
/// Two arrays hash equal only when dtype, shape, and every element's bytes
/// agree; a `[2, 3]` array and a `[3, 2]` array over the same data differ.
#[derive(Debug, Clone)]
pub struct NdArray<'a, E> {
    shape: Vec<usize>,
    data: &'a [E],
}

impl<'a, E: Element> NdArray<'a, E> {
    /// Creates an array view, checking that `shape` covers `data` exactly.
    pub fn new(shape: &[usize], data: &'a [E]) -> Result<Self, HashError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(HashError::ShapeMismatch {
                shape: shape.to_vec(),
                len: data.len(),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    /// A one-dimensional view over `data`.
    pub fn vector(data: &'a [E]) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// The array's dimensions.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn raw_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(std::mem::size_of_val(self.data));
        for &e in self.data {
            e.write_le(&mut out);
        }
        out
    }
}

struct RawBytes(Vec<u8>);

impl Serialize for RawBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<E: Element> Serialize for NdArray<'_, E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let shape: Vec<u64> = self.shape.iter().map(|&d| d as u64).collect();
        serializer.serialize_newtype_struct(
            ARRAY_TOKEN,
            &(E::DTYPE, shape, RawBytes(self.raw_bytes())),
        )
    }
}
