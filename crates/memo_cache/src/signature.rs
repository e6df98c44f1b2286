//! Binding call arguments to parameter names.
//!
//! Arguments are lowered to [`Value`]s as they are collected, so a call
//! made positionally and the same call made by keyword bind to identical
//! [`BoundArgs`] and therefore to the same cache key. A lowering failure
//! stays with its argument and only surfaces if that argument is hashed;
//! arguments that are excluded from the key may fail, or have no
//! hashable form at all.

use std::collections::BTreeMap;

use memo_hash::{to_value, HashError, Value};
use serde::Serialize;

use crate::context::Context;
use crate::error::CacheError;

#[derive(Debug, Clone)]
enum Lowered {
    Value(Value),
    Failed(HashError),
    Opaque,
    Context(Context),
}

/// A bound argument: its hashable form, if any, and its Rust type name.
#[derive(Debug, Clone)]
pub struct BoundValue {
    lowered: Lowered,
    type_name: &'static str,
}

impl BoundValue {
    fn lower<T: Serialize + ?Sized>(value: &T) -> Self {
        let lowered = match to_value(value) {
            Ok(v) => Lowered::Value(v),
            Err(e) => Lowered::Failed(e),
        };
        Self {
            lowered,
            type_name: std::any::type_name::<T>(),
        }
    }

    fn opaque<T: ?Sized>(_: &T) -> Self {
        Self {
            lowered: Lowered::Opaque,
            type_name: std::any::type_name::<T>(),
        }
    }

    fn context(ctx: &Context) -> Self {
        Self {
            lowered: Lowered::Context(ctx.clone()),
            type_name: std::any::type_name::<Context>(),
        }
    }

    /// The canonical value hashed into the cache key.
    ///
    /// Fails if lowering the argument failed, or if it was passed as an
    /// opaque or context argument.
    pub fn value(&self) -> Result<&Value, CacheError> {
        match &self.lowered {
            Lowered::Value(v) => Ok(v),
            Lowered::Failed(e) => Err(e.clone().into()),
            Lowered::Opaque | Lowered::Context(_) => Err(HashError::Malformed {
                what: "argument",
                reason: format!("`{}` has no hashable form", self.type_name),
            }
            .into()),
        }
    }

    /// The reporting context, for arguments passed with [`CallArgs::context`].
    pub fn as_context(&self) -> Option<&Context> {
        match &self.lowered {
            Lowered::Context(ctx) => Some(ctx),
            _ => None,
        }
    }

    /// `std::any::type_name` of the argument, used for type exclusions.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the argument's type is `type_name` or ends in `::type_name`.
    pub fn is_type(&self, type_name: &str) -> bool {
        self.type_name == type_name
            || self
                .type_name
                .strip_suffix(type_name)
                .is_some_and(|rest| rest.ends_with("::"))
    }
}

/// Arguments of one call, collected positionally and by keyword.
///
/// ```
/// use memo_cache::{CallArgs, Context};
///
/// let pool = std::sync::Mutex::new(Vec::<u8>::new());
/// let args = CallArgs::new()
///     .arg(&2)
///     .kwarg("y", &3)
///     .opaque_kwarg("pool", &pool)
///     .context("verbose", &Context::quiet());
/// ```
#[derive(Debug, Default)]
pub struct CallArgs {
    positional: Vec<BoundValue>,
    keyword: Vec<(String, BoundValue)>,
}

impl CallArgs {
    /// An empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.positional.push(BoundValue::lower(value));
        self
    }

    /// Appends a keyword argument.
    pub fn kwarg<T: Serialize + ?Sized>(mut self, name: &str, value: &T) -> Self {
        self.keyword
            .push((name.to_string(), BoundValue::lower(value)));
        self
    }

    /// Appends a positional argument that cannot be hashed. Its parameter
    /// must be excluded from the cache key.
    pub fn opaque<T: ?Sized>(mut self, value: &T) -> Self {
        self.positional.push(BoundValue::opaque(value));
        self
    }

    /// Appends a keyword argument that cannot be hashed. Its parameter
    /// must be excluded from the cache key.
    pub fn opaque_kwarg<T: ?Sized>(mut self, name: &str, value: &T) -> Self {
        self.keyword
            .push((name.to_string(), BoundValue::opaque(value)));
        self
    }

    /// Passes the function's own reporting context as keyword `name`.
    ///
    /// See [`CachedFunction::auto_verbose`](crate::CachedFunction::auto_verbose).
    pub fn context(mut self, name: &str, ctx: &Context) -> Self {
        self.keyword
            .push((name.to_string(), BoundValue::context(ctx)));
        self
    }
}

#[derive(Debug, Clone)]
struct Param {
    name: String,
    default: Option<BoundValue>,
}

/// The parameter list of a cached function.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    /// A signature with the given parameter names, in order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: names
                .into_iter()
                .map(|n| Param {
                    name: n.into(),
                    default: None,
                })
                .collect(),
        }
    }

    /// Gives parameter `name` a default value used when a call omits it.
    pub fn with_default<T: Serialize + ?Sized>(
        mut self,
        name: &str,
        value: &T,
    ) -> Result<Self, CacheError> {
        let default = BoundValue::lower(value);
        default.value()?;
        let param = self
            .params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| CacheError::Binding(format!("no parameter named '{name}'")))?;
        param.default = Some(default);
        Ok(self)
    }

    /// Gives parameter `name` a context default, appending the parameter
    /// if the signature does not have it yet.
    pub fn with_context_default(mut self, name: &str, ctx: Context) -> Self {
        let default = Some(BoundValue::context(&ctx));
        match self.params.iter_mut().find(|p| p.name == name) {
            Some(param) => param.default = default,
            None => self.params.push(Param {
                name: name.to_string(),
                default,
            }),
        }
        self
    }

    /// Parameter names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    /// Binds `args` to parameter names, filling in defaults.
    pub fn bind(&self, args: CallArgs) -> Result<BoundArgs, CacheError> {
        if args.positional.len() > self.params.len() {
            return Err(CacheError::Binding(format!(
                "takes {} arguments but {} were given",
                self.params.len(),
                args.positional.len()
            )));
        }
        let mut values = BTreeMap::new();
        for (param, value) in self.params.iter().zip(args.positional) {
            values.insert(param.name.clone(), value);
        }
        for (name, value) in args.keyword {
            if !self.params.iter().any(|p| p.name == name) {
                return Err(CacheError::Binding(format!(
                    "unexpected keyword argument '{name}'"
                )));
            }
            if values.contains_key(&name) {
                return Err(CacheError::Binding(format!(
                    "multiple values for argument '{name}'"
                )));
            }
            values.insert(name, value);
        }
        let mut missing = Vec::new();
        for param in &self.params {
            if values.contains_key(&param.name) {
                continue;
            }
            match &param.default {
                Some(d) => {
                    values.insert(param.name.clone(), d.clone());
                }
                None => missing.push(format!("'{}'", param.name)),
            }
        }
        if !missing.is_empty() {
            return Err(CacheError::Binding(format!(
                "missing required arguments: {}",
                missing.join(", ")
            )));
        }
        Ok(BoundArgs { values })
    }
}

/// Arguments bound to parameter names, sorted by name.
#[derive(Debug, Clone, Default)]
pub struct BoundArgs {
    values: BTreeMap<String, BoundValue>,
}

impl BoundArgs {
    /// The argument bound to `name`.
    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.values.get(name)
    }

    /// All bound arguments, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of bound arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no arguments are bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
