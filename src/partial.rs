//! The configuration tree and dotted-path navigation.
//!
//! A [`Partial`] is a mapping from string keys to [`Value`]s, where a value
//! may itself be a nested `Partial`. Paths address nodes by joining keys with
//! a separator (`.` by default):
//!
//! | Path | Resolves to |
//! |------|-------------|
//! | `""` | the whole tree |
//! | `"database"` | the `database` sub-tree |
//! | `"database.url"` | the `url` leaf inside `database` |
//! | `".database..url."` | same as above: empty segments are skipped |
//!
//! Resolution fails with [`ConfigError::PathNotFound`] when a segment is
//! missing or when it would have to descend into a non-tree value.
//!
//! Typed reads live on the [`ConfigRead`] trait so the same accessors work on
//! a bare tree and on the aggregated [`Manager`](crate::Manager) view.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::error::{ConfigError, Result};
use crate::value::Value;

/// Separator used when none is configured.
pub const DEFAULT_SEPARATOR: &str = ".";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Partial(BTreeMap<String, Value>);

/// Split a path into its non-empty segments.
pub(crate) fn segments<'a>(path: &'a str, separator: &'a str) -> Vec<&'a str> {
    if separator.is_empty() {
        return if path.is_empty() { vec![] } else { vec![path] };
    }
    path.split(separator).filter(|s| !s.is_empty()).collect()
}

impl Partial {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Direct child lookup, no path splitting.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert a direct child, returning the previous value under that key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub(crate) fn entries_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.0
    }

    pub(crate) fn into_entries(self) -> BTreeMap<String, Value> {
        self.0
    }

    /// Resolve `path` using an explicit separator.
    ///
    /// The empty path resolves to a copy of the whole tree; any other path
    /// borrows the node in place.
    pub fn resolve(&self, path: &str, separator: &str) -> Result<Cow<'_, Value>> {
        let segments = segments(path, separator);
        let Some((first, rest)) = segments.split_first() else {
            return Ok(Cow::Owned(Value::Partial(self.clone())));
        };

        let not_found = || ConfigError::PathNotFound(path.to_string());
        let mut current = self.0.get(*first).ok_or_else(not_found)?;
        for segment in rest {
            current = match current {
                Value::Partial(child) => child.0.get(*segment).ok_or_else(not_found)?,
                _ => return Err(not_found()),
            };
        }
        Ok(Cow::Borrowed(current))
    }

    /// Write `value` at `path`, creating intermediate trees as needed.
    ///
    /// An intermediate segment holding a non-tree value is replaced by a fresh
    /// tree. Writing a tree at the empty path replaces the whole receiver;
    /// writing anything else there is ignored.
    pub fn set(&mut self, path: &str, separator: &str, value: impl Into<Value>) {
        let value = value.into();
        let segments = segments(path, separator);
        let Some((leaf, parents)) = segments.split_last() else {
            if let Value::Partial(root) = value {
                *self = root;
            }
            return;
        };

        let mut current = self;
        for segment in parents {
            current = current.child_mut(segment);
        }
        current.0.insert(leaf.to_string(), value);
    }

    fn child_mut(&mut self, key: &str) -> &mut Partial {
        let slot = self.0.entry(key.to_string()).or_default();
        if !slot.is_partial() {
            *slot = Value::Partial(Partial::new());
        }
        match slot {
            Value::Partial(child) => child,
            _ => unreachable!("slot was just replaced with a partial"),
        }
    }

    /// Every leaf as a `(path, value)` pair, in key order.
    ///
    /// Lists are leaves; empty sub-trees produce no entries.
    pub fn flatten(&self, separator: &str) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        self.flatten_into("", separator, &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, separator: &str, out: &mut Vec<(String, Value)>) {
        for (key, value) in &self.0 {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}{separator}{key}")
            };
            match value {
                Value::Partial(child) => child.flatten_into(&path, separator, out),
                leaf => out.push((path, leaf.clone())),
            }
        }
    }

    /// Deserialize the tree into a typed struct.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T> {
        let json = serde_json::to_value(self).map_err(|e| ConfigError::decode("partial", e))?;
        serde_json::from_value(json).map_err(|e| ConfigError::decode("partial", e))
    }
}

impl From<BTreeMap<String, Value>> for Partial {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self(entries)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Partial {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// -- Typed reads -------------------------------------------------------------

/// Read access shared by [`Partial`] and [`Manager`](crate::Manager).
///
/// `get` is the only required method. The typed accessors resolve the path
/// and then check the dynamic type, failing with
/// [`ConfigError::Conversion`] on mismatch. The `_or` variants substitute the
/// default only when the path does not resolve; a value of the wrong type is
/// still an error.
pub trait ConfigRead {
    fn get(&self, path: &str) -> Result<Value>;

    fn has(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    fn get_or(&self, path: &str, default: Value) -> Result<Value> {
        or_default(self.get(path), path, default, |_, v| Ok(v))
    }

    fn bool(&self, path: &str) -> Result<bool> {
        to_bool(path, self.get(path)?)
    }

    fn bool_or(&self, path: &str, default: bool) -> Result<bool> {
        or_default(self.get(path), path, default, to_bool)
    }

    fn int(&self, path: &str) -> Result<i64> {
        to_int(path, self.get(path)?)
    }

    fn int_or(&self, path: &str, default: i64) -> Result<i64> {
        or_default(self.get(path), path, default, to_int)
    }

    fn float(&self, path: &str) -> Result<f64> {
        to_float(path, self.get(path)?)
    }

    fn float_or(&self, path: &str, default: f64) -> Result<f64> {
        or_default(self.get(path), path, default, to_float)
    }

    fn string(&self, path: &str) -> Result<String> {
        to_string(path, self.get(path)?)
    }

    fn string_or(&self, path: &str, default: &str) -> Result<String> {
        or_default(self.get(path), path, default.to_string(), to_string)
    }

    fn list(&self, path: &str) -> Result<Vec<Value>> {
        to_list(path, self.get(path)?)
    }

    fn list_or(&self, path: &str, default: Vec<Value>) -> Result<Vec<Value>> {
        or_default(self.get(path), path, default, to_list)
    }

    fn partial(&self, path: &str) -> Result<Partial> {
        to_partial(path, self.get(path)?)
    }

    fn partial_or(&self, path: &str, default: Partial) -> Result<Partial> {
        or_default(self.get(path), path, default, to_partial)
    }
}

/// Paths use [`DEFAULT_SEPARATOR`]; call [`Partial::resolve`] for any other.
impl ConfigRead for Partial {
    fn get(&self, path: &str) -> Result<Value> {
        self.resolve(path, DEFAULT_SEPARATOR).map(Cow::into_owned)
    }
}

fn or_default<T>(
    found: Result<Value>,
    path: &str,
    default: T,
    convert: fn(&str, Value) -> Result<T>,
) -> Result<T> {
    match found {
        Ok(value) => convert(path, value),
        Err(ConfigError::PathNotFound(_)) => Ok(default),
        Err(e) => Err(e),
    }
}

fn mismatch(path: &str, expected: &'static str, found: &Value) -> ConfigError {
    ConfigError::Conversion {
        path: path.to_string(),
        expected,
        found: found.type_name(),
    }
}

pub(crate) fn to_bool(path: &str, value: Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(mismatch(path, "bool", &other)),
    }
}

pub(crate) fn to_int(path: &str, value: Value) -> Result<i64> {
    match value {
        Value::Int(i) => Ok(i),
        Value::Float(f) if fits_i64(f) => Ok(f as i64),
        other => Err(mismatch(path, "int", &other)),
    }
}

/// Integral and within `i64` range; `as` would saturate otherwise.
pub(crate) fn fits_i64(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

pub(crate) fn to_float(path: &str, value: Value) -> Result<f64> {
    match value {
        Value::Float(f) => Ok(f),
        Value::Int(i) => Ok(i as f64),
        other => Err(mismatch(path, "float", &other)),
    }
}

pub(crate) fn to_string(path: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(mismatch(path, "string", &other)),
    }
}

pub(crate) fn to_list(path: &str, value: Value) -> Result<Vec<Value>> {
    match value {
        Value::List(l) => Ok(l),
        other => Err(mismatch(path, "list", &other)),
    }
}

pub(crate) fn to_partial(path: &str, value: Value) -> Result<Partial> {
    match value {
        Value::Partial(p) => Ok(p),
        other => Err(mismatch(path, "partial", &other)),
    }
}
