#![forbid(unsafe_code)]

//! Protocol: client-side proxies for objects hosted on a Starscape server.
//!
//! - [`Connection`] owns the transport and routes server pushes.
//! - [`RemoteObject`] is a server-identified handle owning one
//!   [`RemoteProperty`] per property name ever requested.
//! - [`RemoteProperty`] caches a value, deduplicates get requests and
//!   applies optimistic local writes.
//! - [`MembershipSet`] turns a list-valued property into per-item lifetimes.

pub mod config;
pub mod connection;
pub mod error;
pub mod event;
mod link;
pub mod object;
pub mod property;
pub mod report;
pub mod set;
pub mod shape;
pub mod transport;
pub mod value;

pub use config::ConnectionConfig;
pub use connection::Connection;
pub use error::{Error, ProtocolError, Result};
pub use event::{RemoteAction, RemoteEvent};
pub use object::RemoteObject;
pub use property::{Getter, RemoteProperty};
pub use report::{ErrorReporter, TracingReporter};
pub use set::MembershipSet;
pub use shape::Shape;
pub use transport::{Inbound, Transport};
pub use value::{ObjectId, Value, ValueKey, WireValue};
