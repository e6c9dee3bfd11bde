#![forbid(unsafe_code)]

//! The boundary with the transport collaborator.
//!
//! Outbound: the client calls [`Transport`] methods, which are
//! fire-and-forget. Inbound: the transport turns whatever it receives into
//! [`Inbound`] messages and hands them to
//! [`Connection::dispatch`](crate::Connection::dispatch) (or calls the
//! matching `Connection` method directly).
//!
//! The encoding on the wire, reconnection and timeouts are the transport's
//! business. A transport that loses its link reports it with
//! [`Connection::connection_lost`](crate::Connection::connection_lost) so the
//! reactive graph unwinds.

use crate::value::{ObjectId, WireValue};

/// Outbound requests to the server.
///
/// Implementations may deliver replies synchronously from inside these
/// calls; the client holds no borrows while calling out.
pub trait Transport {
    /// Request a one-off reply with the property's current value.
    fn get_property(&self, object: ObjectId, name: &str);
    /// Write a property.
    fn set_property(&self, object: ObjectId, name: &str, value: &WireValue);
    /// Start receiving pushes for a property or event.
    fn subscribe_to(&self, object: ObjectId, name: &str);
    /// Stop receiving pushes for a property or event.
    fn unsubscribe_from(&self, object: ObjectId, name: &str);
    /// Invoke a remote action.
    fn fire_action(&self, object: ObjectId, name: &str, args: &WireValue);
}

/// Messages the transport pushes into the client.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Inbound {
    /// A subscribed property changed.
    Update {
        object: ObjectId,
        name: String,
        value: WireValue,
    },
    /// Reply to a get request.
    GetReply {
        object: ObjectId,
        name: String,
        value: WireValue,
    },
    /// A subscribed event fired.
    Event {
        object: ObjectId,
        name: String,
        value: WireValue,
    },
    /// The object no longer exists on the server.
    Destroyed { object: ObjectId },
}
