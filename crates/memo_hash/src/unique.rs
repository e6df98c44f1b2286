//! Opt-in special forms: custom digests and unordered collections.

use serde::ser::Error as _;
use serde::{Serialize, Serializer};

use crate::digest::MAX_HASH_LENGTH;
use crate::error::HashError;
use crate::ser::{DIGEST_TOKEN, SET_TOKEN};

/// A type that supplies its own digest instead of being walked field by field.
///
/// Implement this for types whose cache identity differs from their
/// structure: configuration objects that should hash equal when built in
/// different ways, or types carrying bookkeeping that must not affect keys.
pub trait UniqueHashable {
    /// Returns a stable identifier of at most `length` characters.
    fn unique_hash(&self, length: usize) -> Result<String, HashError>;
}

impl<T: UniqueHashable + ?Sized> UniqueHashable for &T {
    fn unique_hash(&self, length: usize) -> Result<String, HashError> {
        (**self).unique_hash(length)
    }
}

/// Wraps a [`UniqueHashable`] value so the hasher uses its own digest.
///
/// ```
/// use memo_hash::{unique_hash48, HashError, Unique, UniqueHashable};
///
/// struct Settings { seed: u64, label: String }
///
/// impl UniqueHashable for Settings {
///     fn unique_hash(&self, _length: usize) -> Result<String, HashError> {
///         Ok(format!("seed={}", self.seed))
///     }
/// }
///
/// let a = Settings { seed: 7, label: "a".into() };
/// let b = Settings { seed: 7, label: "b".into() };
/// assert_eq!(unique_hash48(&Unique(&a)).unwrap(), unique_hash48(&Unique(&b)).unwrap());
/// ```
pub struct Unique<'a, T: ?Sized>(pub &'a T);

impl<T: UniqueHashable + ?Sized> Serialize for Unique<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let digest = self.0.unique_hash(MAX_HASH_LENGTH).map_err(S::Error::custom)?;
        serializer.serialize_newtype_struct(DIGEST_TOKEN, &digest)
    }
}

/// `serialize_with` adapter for fields whose type is [`UniqueHashable`].
///
/// Use as `#[serde(serialize_with = "memo_hash::serialize_unique")]`.
pub fn serialize_unique<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: UniqueHashable + ?Sized,
    S: Serializer,
{
    Unique(value).serialize(serializer)
}

/// Marks a collection as a set: element order does not affect the digest.
pub struct Unordered<'a, C: ?Sized>(pub &'a C);

struct Elements<'a, C: ?Sized>(&'a C);

impl<'a, C: ?Sized> Serialize for Elements<'a, C>
where
    &'a C: IntoIterator,
    <&'a C as IntoIterator>::Item: Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0)
    }
}

impl<'a, C: ?Sized> Serialize for Unordered<'a, C>
where
    &'a C: IntoIterator,
    <&'a C as IntoIterator>::Item: Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(SET_TOKEN, &Elements(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::unique_hash48;
    use crate::ser::to_value;
    use crate::value::Value;
    use std::collections::HashSet;

    struct Tolerance(f64);

    impl UniqueHashable for Tolerance {
        fn unique_hash(&self, _length: usize) -> Result<String, HashError> {
            Ok(format!("tol:{:.3}", self.0))
        }
    }

    struct Broken;

    impl UniqueHashable for Broken {
        fn unique_hash(&self, _length: usize) -> Result<String, HashError> {
            Err(HashError::Custom("not ready".to_string()))
        }
    }

    #[derive(Serialize)]
    struct Job {
        name: String,
        #[serde(serialize_with = "serialize_unique")]
        tolerance: Tolerance,
    }

    #[test]
    fn unique_uses_custom_digest() {
        assert_eq!(
            to_value(&Unique(&Tolerance(0.1))).unwrap(),
            Value::Digest("tol:0.100".to_string())
        );
    }

    #[test]
    fn equivalent_custom_values_hash_alike() {
        let a = Job {
            name: "fit".into(),
            tolerance: Tolerance(0.1),
        };
        let b = Job {
            name: "fit".into(),
            tolerance: Tolerance(0.1000001),
        };
        assert_eq!(unique_hash48(&a).unwrap(), unique_hash48(&b).unwrap());
    }

    #[test]
    fn unique_digest_differs_from_plain_string() {
        assert_ne!(
            unique_hash48(&Unique(&Tolerance(0.1))).unwrap(),
            unique_hash48(&"tol:0.100").unwrap()
        );
    }

    #[test]
    fn failing_custom_digest_propagates() {
        let err = unique_hash48(&Unique(&Broken)).unwrap_err();
        assert!(err.to_string().contains("not ready"));
    }

    #[test]
    fn unordered_ignores_order() {
        let a = vec![3, 1, 2];
        let b = vec![1, 2, 3];
        assert_eq!(
            unique_hash48(&Unordered(&a)).unwrap(),
            unique_hash48(&Unordered(&b)).unwrap()
        );
        assert_ne!(
            unique_hash48(&Unordered(&a)).unwrap(),
            unique_hash48(&a).unwrap()
        );
    }

    #[test]
    fn unordered_hash_set() {
        let a: HashSet<&str> = ["x", "y", "z"].into_iter().collect();
        let b: HashSet<&str> = ["z", "x", "y"].into_iter().collect();
        assert_eq!(
            unique_hash48(&Unordered(&a)).unwrap(),
            unique_hash48(&Unordered(&b)).unwrap()
        );
    }
}
