//! # Attribute values
//!
//! A template host hands over evaluated tag arguments as loosely-typed [`Value`]s.
//! Before serialization these are classified, once, into the closed set of
//! shapes that the serializer understands:
//!
//! - **`AttrItem`**: one element of the attribute list - a bare flag, a list of
//!   bare flags, or a keyed map - e.g. `checked`, `["a", "b"]`, `{class: ...}`
//! - **`AttrValue`**: the value of a key in a map - a scalar, a list of scalars,
//!   a safe string, or a flag map - e.g. `"x"`, `["a", "b"]`, `{a: true}`
//! - **`Scalar`**: anything that can be printed as a single token
//!
//! Shapes that make no sense as attributes (a map inside a flattened list, a list
//! inside a list value) are rejected here, so the serializer never has to inspect
//! types.

use indexmap::IndexMap;
use std::fmt;

use crate::error::AttrError;
use crate::escape::{Escaper, SafeString};

/// Dynamic value produced by evaluating a tag argument
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Undefined and null values
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Safe(SafeString),
    List(Vec<Value>),
    /// Keys keep their insertion order
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn safe(html: impl Into<String>) -> Value {
        Value::Safe(SafeString::new(html))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `null`, `false`, zero, NaN and the empty string are falsy.
    /// Lists and maps are truthy even when empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Safe(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) => true,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Safe(_) => "safe string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Look up a key of a map, or an index of a list
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            Value::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Safe(s) => f.write_str(s.as_str()),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
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

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<SafeString> for Value {
    fn from(s: SafeString) -> Self {
        Value::Safe(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A value that prints as a single attribute token
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Safe(SafeString),
}

impl Scalar {
    /// Escaped text of the scalar. Safe strings pass through, nullish becomes empty.
    pub fn escaped(&self, escaper: &dyn Escaper) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Safe(safe) => safe.as_str().to_string(),
            Scalar::Text(text) => escaper.escape(text),
            other => escaper.escape(&other.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Safe(s) => f.write_str(s.as_str()),
        }
    }
}

impl TryFrom<&Value> for Scalar {
    type Error = AttrError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Scalar::Null),
            Value::Bool(b) => Ok(Scalar::Bool(*b)),
            Value::Int(i) => Ok(Scalar::Int(*i)),
            Value::Float(x) => Ok(Scalar::Float(*x)),
            Value::Str(s) => Ok(Scalar::Text(s.clone())),
            Value::Safe(s) => Ok(Scalar::Safe(s.clone())),
            Value::List(_) | Value::Map(_) => Err(AttrError::InvalidArgument(format!(
                "expected a string or number, got {}",
                value.kind_name()
            ))),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Scalar::Float(x)
    }
}

impl From<SafeString> for Scalar {
    fn from(s: SafeString) -> Self {
        Scalar::Safe(s)
    }
}

/// Value of one key in an attribute map
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// `key="value"`, nullish becomes `key=""`
    Scalar(Scalar),
    /// `key="a b"`, deduplicated
    List(Vec<Scalar>),
    /// `key="value"` with the value left unescaped
    Safe(SafeString),
    /// `key="a c"` for the keys whose flag is set
    Flags(IndexMap<String, bool>),
}

impl From<Scalar> for AttrValue {
    fn from(scalar: Scalar) -> Self {
        AttrValue::Scalar(scalar)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Scalar(Scalar::from(s))
    }
}

impl From<SafeString> for AttrValue {
    fn from(s: SafeString) -> Self {
        AttrValue::Safe(s)
    }
}

pub type AttrMap = IndexMap<String, AttrValue>;

/// One element of an attribute list
#[derive(Debug, Clone, PartialEq)]
pub enum AttrItem {
    /// Valueless attribute, e.g. `checked`
    Flag(Scalar),
    /// Several valueless attributes, e.g. `["checked", "readonly"]`
    Flags(Vec<Scalar>),
    /// Keyed attributes, e.g. `{class: ["a", "b"], id: "x"}`
    Map(AttrMap),
}

impl AttrItem {
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> AttrItem
    where
        K: Into<String>,
        V: Into<AttrValue>,
    {
        AttrItem::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl From<&str> for AttrItem {
    fn from(s: &str) -> Self {
        AttrItem::Flag(Scalar::from(s))
    }
}

/// Classify an evaluated attribute list. Fails unless `value` is a list.
pub fn attrs_from_value(value: &Value) -> Result<Vec<AttrItem>, AttrError> {
    match value {
        Value::List(items) => attrs_from_values(items),
        other => Err(AttrError::not_a_sequence(other)),
    }
}

/// Classify each element of an evaluated attribute list
pub fn attrs_from_values(values: &[Value]) -> Result<Vec<AttrItem>, AttrError> {
    let mut items = Vec::with_capacity(values.len());
    for value in values {
        match value {
            // Neither an undefined variable nor a boolean names an attribute
            Value::Null | Value::Bool(_) => {
                log::trace!("Skipping {} in attribute list", value.kind_name());
            }
            Value::List(entries) => items.push(AttrItem::Flags(scalars_from_list(entries)?)),
            Value::Map(map) => items.push(AttrItem::Map(attr_map_from(map)?)),
            scalar => items.push(AttrItem::Flag(Scalar::try_from(scalar)?)),
        }
    }
    Ok(items)
}

fn attr_map_from(map: &IndexMap<String, Value>) -> Result<AttrMap, AttrError> {
    let mut attrs = AttrMap::with_capacity(map.len());
    for (key, value) in map {
        let value = match value {
            Value::List(entries) => AttrValue::List(scalars_from_list(entries)?),
            Value::Safe(safe) => AttrValue::Safe(safe.clone()),
            Value::Map(flags) => AttrValue::Flags(
                flags
                    .iter()
                    .map(|(flag, on)| (flag.clone(), on.is_truthy()))
                    .collect(),
            ),
            scalar => AttrValue::Scalar(Scalar::try_from(scalar)?),
        };
        attrs.insert(key.clone(), value);
    }
    Ok(attrs)
}

// Lists are flattened one level only. Null entries are dropped.
fn scalars_from_list(entries: &[Value]) -> Result<Vec<Scalar>, AttrError> {
    entries
        .iter()
        .filter(|entry| !entry.is_null())
        .map(|entry| {
            Scalar::try_from(entry).map_err(|_| {
                AttrError::InvalidArgument(format!(
                    "nested {} is not allowed inside an attribute list",
                    entry.kind_name()
                ))
            })
        })
        .collect()
}
