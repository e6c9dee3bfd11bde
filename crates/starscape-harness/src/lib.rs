#![forbid(unsafe_code)]

//! Test harness for the Starscape client.
//!
//! [`RecordingTransport`] stands in for the network: every outbound request
//! is recorded as an [`Outbound`] and nothing is ever answered on its own.
//! Tests play the server by pushing through the [`Connection`] directly.
//! [`CollectingReporter`] keeps every reported protocol violation.
//!
//! [`Harness`] wires both to a connection under a fresh root lifetime:
//!
//! ```rust
//! use starscape_harness::{Harness, Outbound};
//! use starscape_protocol::{ObjectId, Shape, WireValue};
//!
//! let h = Harness::new();
//! let root = h.connection.root().unwrap();
//! let count = root.property("count", Shape::Number).unwrap();
//! let getter = count.getter(&h.root).unwrap();
//! assert_eq!(
//!     h.transport.take(),
//!     vec![Outbound::Subscribe { object: ObjectId(1), name: "count".into() }]
//! );
//!
//! h.update(ObjectId(1), "count", WireValue::from(3));
//! assert_eq!(getter.get().unwrap().and_then(|v| v.as_number()), Some(3.0));
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use starscape_core::Lifetime;
use starscape_protocol::{
    Connection, ConnectionConfig, ErrorReporter, ObjectId, ProtocolError, Transport, WireValue,
};
use tracing::trace;

/// One request the client sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Get {
        object: ObjectId,
        name: String,
    },
    Set {
        object: ObjectId,
        name: String,
        value: WireValue,
    },
    Subscribe {
        object: ObjectId,
        name: String,
    },
    Unsubscribe {
        object: ObjectId,
        name: String,
    },
    Action {
        object: ObjectId,
        name: String,
        args: WireValue,
    },
}

impl Outbound {
    /// The property, event or action the request is about.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Get { name, .. }
            | Self::Set { name, .. }
            | Self::Subscribe { name, .. }
            | Self::Unsubscribe { name, .. }
            | Self::Action { name, .. } => name,
        }
    }

    #[must_use]
    pub fn object(&self) -> ObjectId {
        match self {
            Self::Get { object, .. }
            | Self::Set { object, .. }
            | Self::Subscribe { object, .. }
            | Self::Unsubscribe { object, .. }
            | Self::Action { object, .. } => *object,
        }
    }
}

/// A [`Transport`] that records requests in send order.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: RefCell<Vec<Outbound>>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Outbound> {
        self.sent.borrow().clone()
    }

    /// Everything recorded so far, clearing the record.
    pub fn take(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    pub fn clear(&self) {
        self.sent.borrow_mut().clear();
    }

    /// Number of get requests recorded for `name`.
    #[must_use]
    pub fn gets(&self, name: &str) -> usize {
        self.count(|m| matches!(m, Outbound::Get { .. }) && m.name() == name)
    }

    /// Number of subscribe requests recorded for `name`.
    #[must_use]
    pub fn subscribes(&self, name: &str) -> usize {
        self.count(|m| matches!(m, Outbound::Subscribe { .. }) && m.name() == name)
    }

    /// Number of unsubscribe requests recorded for `name`.
    #[must_use]
    pub fn unsubscribes(&self, name: &str) -> usize {
        self.count(|m| matches!(m, Outbound::Unsubscribe { .. }) && m.name() == name)
    }

    fn count(&self, pred: impl Fn(&Outbound) -> bool) -> usize {
        self.sent.borrow().iter().filter(|m| pred(m)).count()
    }

    fn record(&self, message: Outbound) {
        trace!(?message, "recorded");
        self.sent.borrow_mut().push(message);
    }
}

impl Transport for RecordingTransport {
    fn get_property(&self, object: ObjectId, name: &str) {
        self.record(Outbound::Get {
            object,
            name: name.to_owned(),
        });
    }

    fn set_property(&self, object: ObjectId, name: &str, value: &WireValue) {
        self.record(Outbound::Set {
            object,
            name: name.to_owned(),
            value: value.clone(),
        });
    }

    fn subscribe_to(&self, object: ObjectId, name: &str) {
        self.record(Outbound::Subscribe {
            object,
            name: name.to_owned(),
        });
    }

    fn unsubscribe_from(&self, object: ObjectId, name: &str) {
        self.record(Outbound::Unsubscribe {
            object,
            name: name.to_owned(),
        });
    }

    fn fire_action(&self, object: ObjectId, name: &str, args: &WireValue) {
        self.record(Outbound::Action {
            object,
            name: name.to_owned(),
            args: args.clone(),
        });
    }
}

/// An [`ErrorReporter`] that keeps what it is given.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    errors: RefCell<Vec<ProtocolError>>,
}

impl CollectingReporter {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use]
    pub fn errors(&self) -> Vec<ProtocolError> {
        self.errors.borrow().clone()
    }

    pub fn take(&self) -> Vec<ProtocolError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.borrow().is_empty()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, error: &ProtocolError) {
        self.errors.borrow_mut().push(error.clone());
    }
}

/// A connection wired to recording fixtures.
pub struct Harness {
    /// Root lifetime the connection lives under.
    pub root: Lifetime,
    pub transport: Rc<RecordingTransport>,
    pub reporter: Rc<CollectingReporter>,
    pub connection: Connection,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Harness with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig::default())
    }

    /// Harness whose connection uses `config`.
    #[must_use]
    pub fn with_config(config: ConnectionConfig) -> Self {
        let root = Lifetime::root();
        let transport = RecordingTransport::new();
        let reporter = CollectingReporter::new();
        let connection = Connection::with_reporter(
            &root,
            transport.clone(),
            config,
            reporter.clone(),
        )
        .expect("fresh root lifetime is alive");
        Self {
            root,
            transport,
            reporter,
            connection,
        }
    }

    /// Play the server: push a property update.
    pub fn update(&self, object: ObjectId, name: &str, value: impl Into<WireValue>) {
        self.connection.update_property(object, name, &value.into());
    }

    /// Play the server: answer a get request.
    pub fn reply(&self, object: ObjectId, name: &str, value: impl Into<WireValue>) {
        self.connection.reply_to_get(object, name, &value.into());
    }

    /// Play the server: fire an event.
    pub fn event(&self, object: ObjectId, name: &str, value: impl Into<WireValue>) {
        self.connection.dispatch_event(object, name, &value.into());
    }
}
