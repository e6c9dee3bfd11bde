#![forbid(unsafe_code)]

use thiserror::Error;

use crate::lifetime::LifetimeId;

pub type Result<T> = std::result::Result<T, LifetimeError>;

/// Error returned when a lifetime is used incorrectly.
///
/// Both variants are programming errors: callers are expected to propagate
/// them rather than recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifetimeError {
    /// The lifetime (or the object it scopes) has already been disposed.
    #[error("{0} used after disposal")]
    Disposed(LifetimeId),

    /// The two lifetimes live in different arenas and cannot be linked.
    #[error("cannot link lifetimes from different arenas")]
    ForeignArena,
}
