#![forbid(unsafe_code)]

//! Core: the lifetime tree that scopes every subscription and remote handle.

pub mod error;
pub mod lifetime;
#[cfg(feature = "logging")]
pub mod logging;

pub use error::{LifetimeError, Result};
pub use lifetime::{Lifetime, LifetimeId};
