#![forbid(unsafe_code)]

//! Declared shapes of property values.
//!
//! Every property lookup names the shape it expects ("nullable number",
//! "list of object", ...). Incoming values are checked against it at the
//! object boundary; a mismatch is a protocol error.

use std::fmt;

use crate::value::Value;

/// A closed description of the values a property may hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Anything, including null.
    Any,
    Null,
    Bool,
    Number,
    Text,
    /// A reference to a remote object.
    Object,
    /// Null or the inner shape.
    Nullable(Box<Shape>),
    /// A list whose every item matches the inner shape.
    ListOf(Box<Shape>),
}

impl Shape {
    #[must_use]
    pub fn nullable(inner: Shape) -> Self {
        Self::Nullable(Box::new(inner))
    }

    #[must_use]
    pub fn list_of(item: Shape) -> Self {
        Self::ListOf(Box::new(item))
    }

    /// Whether `value` conforms to this shape.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _)
            | (Self::Null, Value::Null)
            | (Self::Bool, Value::Bool(_))
            | (Self::Number, Value::Number(_))
            | (Self::Text, Value::Text(_))
            | (Self::Object, Value::Object(_)) => true,
            (Self::Nullable(_), Value::Null) => true,
            (Self::Nullable(inner), v) => inner.matches(v),
            (Self::ListOf(item), Value::List(items)) => items.iter().all(|v| item.matches(v)),
            _ => false,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Null => write!(f, "null"),
            Self::Bool => write!(f, "boolean"),
            Self::Number => write!(f, "number"),
            Self::Text => write!(f, "text"),
            Self::Object => write!(f, "object"),
            Self::Nullable(inner) => write!(f, "nullable {inner}"),
            Self::ListOf(item) => write!(f, "list of {item}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_shapes() {
        assert!(Shape::Number.matches(&Value::from(5)));
        assert!(!Shape::Number.matches(&Value::Null));
        assert!(Shape::Text.matches(&Value::from("x")));
        assert!(!Shape::Bool.matches(&Value::from("true")));
        assert!(Shape::Any.matches(&Value::Null));
    }

    #[test]
    fn nullable_accepts_null_and_inner() {
        let shape = Shape::nullable(Shape::Number);
        assert!(shape.matches(&Value::Null));
        assert!(shape.matches(&Value::from(1.5)));
        assert!(!shape.matches(&Value::from("1.5")));
    }

    #[test]
    fn list_checks_every_item() {
        let shape = Shape::list_of(Shape::Text);
        assert!(shape.matches(&Value::from(Vec::<Value>::new())));
        assert!(shape.matches(&Value::from(vec!["a", "b"])));
        assert!(!shape.matches(&Value::from(vec![Value::from("a"), Value::from(1)])));
        assert!(!shape.matches(&Value::from("a")));
    }

    #[test]
    fn display_reads_naturally() {
        assert_eq!(Shape::nullable(Shape::Number).to_string(), "nullable number");
        assert_eq!(Shape::list_of(Shape::Object).to_string(), "list of object");
    }
}
