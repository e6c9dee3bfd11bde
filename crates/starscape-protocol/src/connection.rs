#![forbid(unsafe_code)]

//! The connection: object registry and inbound routing.
//!
//! A [`Connection`] owns the transport and a lifetime that every remote
//! object lives under. It hands out exactly one [`RemoteObject`] per
//! [`ObjectId`] (so object equality is identity), resolves object ids inside
//! pushed values into handles, and routes the push side of the protocol:
//!
//! | push | effect |
//! |------|--------|
//! | [`update_property`](Connection::update_property) | property cache + subscribers |
//! | [`reply_to_get`](Connection::reply_to_get) | clears the pending get, then as above |
//! | [`dispatch_event`](Connection::dispatch_event) | event subscribers |
//! | [`object_destroyed`](Connection::object_destroyed) | disposes the object's lifetime |
//! | [`connection_lost`](Connection::connection_lost) | disposes every object |
//!
//! Pushes naming objects the client never heard of are dropped; the server
//! only pushes for what the client subscribed to or requested.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use starscape_core::Lifetime;
use tracing::{debug, info, trace};

use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::link::Link;
use crate::object::RemoteObject;
use crate::report::{ErrorReporter, TracingReporter};
use crate::transport::{Inbound, Transport};
use crate::value::{ObjectId, Value, WireValue};

struct ConnectionInner {
    transport: Rc<dyn Transport>,
    link: Rc<Link>,
    lifetime: Lifetime,
    config: ConnectionConfig,
    objects: RefCell<AHashMap<ObjectId, RemoteObject>>,
}

/// Client side of one server connection.
#[derive(Clone)]
pub struct Connection {
    inner: Rc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.inner.config)
            .field("connected", &self.is_connected())
            .field("objects", &self.object_count())
            .finish()
    }
}

impl Connection {
    /// Create a connection living under `parent`, reporting protocol
    /// violations through `tracing`.
    pub fn new(
        parent: &Lifetime,
        transport: Rc<dyn Transport>,
        config: ConnectionConfig,
    ) -> Result<Self> {
        Self::with_reporter(parent, transport, config, Rc::new(TracingReporter))
    }

    /// Create a connection with an explicit error reporter.
    pub fn with_reporter(
        parent: &Lifetime,
        transport: Rc<dyn Transport>,
        config: ConnectionConfig,
        reporter: Rc<dyn ErrorReporter>,
    ) -> Result<Self> {
        let lifetime = parent.new_child()?;
        let link = Rc::new(Link::new(&transport, reporter, config.strict_shapes));
        lifetime.add_callback(|| info!("connection closed"))?;
        Ok(Self {
            inner: Rc::new(ConnectionInner {
                transport,
                link,
                lifetime,
                config,
                objects: RefCell::new(AHashMap::new()),
            }),
        })
    }

    /// Lifetime that ends when the connection is lost.
    #[must_use]
    pub fn lifetime(&self) -> &Lifetime {
        &self.inner.lifetime
    }

    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// The transport this connection sends through.
    #[must_use]
    pub fn transport(&self) -> &Rc<dyn Transport> {
        &self.inner.transport
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.lifetime.is_alive()
    }

    /// Number of live objects in the registry.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.inner.objects.borrow().len()
    }

    /// The handle for `id`, created on first use.
    pub fn object(&self, id: ObjectId) -> Result<RemoteObject> {
        if let Some(existing) = self.lookup(id) {
            return Ok(existing);
        }
        let object = RemoteObject::new(id, &self.inner.lifetime, &self.inner.link)?;
        let weak = Rc::downgrade(&self.inner);
        object.lifetime().add_callback(move || {
            if let Some(inner) = weak.upgrade() {
                let evicted = inner.objects.borrow_mut().remove(&id);
                debug!(object = %id, "object evicted");
                drop(evicted);
            }
        })?;
        debug!(object = %id, "object created");
        self.inner.objects.borrow_mut().insert(id, object.clone());
        Ok(object)
    }

    /// The server's root object.
    pub fn root(&self) -> Result<RemoteObject> {
        self.object(self.inner.config.root_object)
    }

    /// The existing handle for `id`, if any.
    #[must_use]
    pub fn lookup(&self, id: ObjectId) -> Option<RemoteObject> {
        self.inner.objects.borrow().get(&id).cloned()
    }

    /// Lift a transport value, resolving object ids into handles.
    pub fn resolve(&self, value: &WireValue) -> Result<Value> {
        Ok(match value {
            WireValue::Null => Value::Null,
            WireValue::Bool(b) => Value::Bool(*b),
            WireValue::Number(n) => Value::Number(*n),
            WireValue::Text(s) => Value::Text(s.clone()),
            WireValue::Object(id) => Value::Object(self.object(*id)?),
            WireValue::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.resolve(item))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    /// Push: a subscribed property changed.
    pub fn update_property(&self, object: ObjectId, name: &str, value: &WireValue) {
        if let Some((target, value)) = self.route(object, name, value) {
            target.handle_update(name, value);
        }
    }

    /// Push: reply to a get request.
    pub fn reply_to_get(&self, object: ObjectId, name: &str, value: &WireValue) {
        if let Some((target, value)) = self.route(object, name, value) {
            target.handle_get_reply(name, value);
        }
    }

    /// Push: a subscribed event fired.
    pub fn dispatch_event(&self, object: ObjectId, name: &str, value: &WireValue) {
        if let Some((target, value)) = self.route(object, name, value) {
            target.handle_event(name, value);
        }
    }

    /// Push: the object no longer exists.
    pub fn object_destroyed(&self, object: ObjectId) {
        match self.lookup(object) {
            Some(target) => {
                debug!(%object, "object destroyed");
                target.lifetime().dispose();
            }
            None => trace!(%object, "destroy for unknown object ignored"),
        }
    }

    /// The transport lost its link. Every object is disposed and the
    /// connection becomes unusable.
    pub fn connection_lost(&self) {
        self.inner.lifetime.dispose();
    }

    /// Route one inbound message.
    pub fn dispatch(&self, message: Inbound) {
        match message {
            Inbound::Update {
                object,
                name,
                value,
            } => self.update_property(object, &name, &value),
            Inbound::GetReply {
                object,
                name,
                value,
            } => self.reply_to_get(object, &name, &value),
            Inbound::Event {
                object,
                name,
                value,
            } => self.dispatch_event(object, &name, &value),
            Inbound::Destroyed { object } => self.object_destroyed(object),
        }
    }

    fn route(&self, object: ObjectId, name: &str, value: &WireValue) -> Option<(RemoteObject, Value)> {
        trace!(%object, name, ?value, "inbound");
        let Some(target) = self.lookup(object) else {
            debug!(%object, name, "push for unknown object dropped");
            return None;
        };
        match self.resolve(value) {
            Ok(value) => Some((target, value)),
            Err(error) => {
                debug!(%object, name, %error, "push after disconnect dropped");
                None
            }
        }
    }
}
