#![forbid(unsafe_code)]

use starscape_core::LifetimeError;
use thiserror::Error;

use crate::shape::Shape;
use crate::value::ObjectId;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned to the caller. Always fatal to the calling operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A lifetime, object or connection was used after disposal.
    #[error(transparent)]
    Lifetime(#[from] LifetimeError),

    /// A local write does not conform to the property's declared shape.
    #[error("property `{property}` of {object} expects {expected}, got {found}")]
    ShapeMismatch {
        object: ObjectId,
        property: String,
        expected: Shape,
        found: String,
    },
}

/// Non-fatal protocol violations.
///
/// These are never returned; they are handed to the connection's
/// [`ErrorReporter`](crate::ErrorReporter) and processing continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// A membership list contained the same item twice.
    #[error("membership list `{property}` of {object} contains duplicate item {item}")]
    DuplicateItem {
        object: ObjectId,
        property: String,
        item: String,
    },

    /// A membership list received something other than a list.
    #[error("membership list `{property}` of {object} received non-list value {value}")]
    NotAList {
        object: ObjectId,
        property: String,
        value: String,
    },

    /// A server push does not conform to the property's declared shape.
    #[error("property `{property}` of {object} expects {expected}, server sent {found}")]
    ShapeMismatch {
        object: ObjectId,
        property: String,
        expected: Shape,
        found: String,
    },

    /// An enumerated property held a discriminant the client does not know.
    #[error("property `{property}` of {object} has unknown variant {value}")]
    UnknownVariant {
        object: ObjectId,
        property: String,
        value: String,
    },
}
