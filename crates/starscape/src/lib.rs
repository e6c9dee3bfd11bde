#![forbid(unsafe_code)]

//! Starscape client public facade crate.
//!
//! Re-exports the lifetime tree, the reactive primitives and the remote
//! object layer under one name.

pub use starscape_core::{Lifetime, LifetimeError, LifetimeId};
pub use starscape_protocol::{
    Connection, ConnectionConfig, Error, ErrorReporter, Getter, Inbound, MembershipSet, ObjectId,
    ProtocolError, RemoteAction, RemoteEvent, RemoteObject, RemoteProperty, Result, Shape,
    TracingReporter, Transport, Value, WireValue,
};
pub use starscape_runtime::{Conduit, Delivery, LocalProperty, Subscriber, SubscriptionHooks};

#[cfg(feature = "logging")]
pub use starscape_core::logging;

pub mod prelude {
    pub use starscape_core as core;
    pub use starscape_protocol as protocol;
    pub use starscape_runtime as runtime;

    pub use crate::{
        Connection, ConnectionConfig, Lifetime, LocalProperty, MembershipSet, ObjectId,
        RemoteObject, RemoteProperty, Shape, Transport, Value,
    };
}
