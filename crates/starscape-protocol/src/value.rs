#![forbid(unsafe_code)]

//! The value domain exchanged with the server.
//!
//! Two representations exist:
//!
//! - [`WireValue`] is what the transport produces and consumes. Remote
//!   objects appear as bare [`ObjectId`]s.
//! - [`Value`] is what the rest of the client sees. Remote objects appear
//!   as [`RemoteObject`] handles resolved by the
//!   [`Connection`](crate::Connection).
//!
//! "Not yet received" is never encoded as a value: caches hold
//! `Option<Value>`, so `None` (unknown) and `Some(Value::Null)` stay
//! distinguishable.

use std::fmt;

use crate::object::RemoteObject;

/// Server-assigned identity of a remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Create an id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Transport-level value. Object references are plain ids.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WireValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Object(ObjectId),
    List(Vec<WireValue>),
}

impl From<bool> for WireValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for WireValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for WireValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<&str> for WireValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for WireValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<ObjectId> for WireValue {
    fn from(v: ObjectId) -> Self {
        Self::Object(v)
    }
}

impl<T: Into<WireValue>> From<Vec<T>> for WireValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// Client-level value.
///
/// Equality is structural, except that remote objects compare by handle
/// identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Object(RemoteObject),
    List(Vec<Value>),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&RemoteObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Object(_) => "object",
            Self::List(_) => "list",
        }
    }

    /// Lower to the transport representation.
    #[must_use]
    pub fn to_wire(&self) -> WireValue {
        match self {
            Self::Null => WireValue::Null,
            Self::Bool(b) => WireValue::Bool(*b),
            Self::Number(n) => WireValue::Number(*n),
            Self::Text(s) => WireValue::Text(s.clone()),
            Self::Object(o) => WireValue::Object(o.id()),
            Self::List(items) => WireValue::List(items.iter().map(Value::to_wire).collect()),
        }
    }

    /// Hashable key with the same equality as `Value`, except that `NaN`
    /// keys compare equal to each other.
    #[must_use]
    pub fn key(&self) -> ValueKey {
        match self {
            Self::Null => ValueKey::Null,
            Self::Bool(b) => ValueKey::Bool(*b),
            // -0.0 == 0.0, so both must hash alike.
            Self::Number(n) if *n == 0.0 => ValueKey::Number(0.0f64.to_bits()),
            Self::Number(n) => ValueKey::Number(n.to_bits()),
            Self::Text(s) => ValueKey::Text(s.clone()),
            Self::Object(o) => ValueKey::Object(o.id()),
            Self::List(items) => ValueKey::List(items.iter().map(Value::key).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Object(o) => write!(f, "{}", o.id()),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Hashable identity of a [`Value`], used to match list items across
/// updates.
///
/// Objects are keyed by id; the connection hands out one handle per id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Number(u64),
    Text(String),
    Object(ObjectId),
    List(Vec<ValueKey>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<RemoteObject> for Value {
    fn from(v: RemoteObject) -> Self {
        Self::Object(v)
    }
}

impl From<&RemoteObject> for Value {
    fn from(v: &RemoteObject) -> Self {
        Self::Object(v.clone())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
