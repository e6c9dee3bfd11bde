#![forbid(unsafe_code)]

//! Remote events (server-pushed streams) and actions (fire-and-forget calls).

use std::fmt;
use std::rc::Rc;

use starscape_core::Lifetime;
use starscape_runtime::{Conduit, Subscriber};
use tracing::trace;

use crate::error::Result;
use crate::link::{Binding, Link};
use crate::value::{ObjectId, Value};

struct EventInner {
    binding: Rc<Binding>,
    conduit: Conduit<Value>,
}

/// A stream of payloads the server pushes for one named event.
///
/// Payloads are not cached. The server subscription is held while at least
/// one subscriber is registered.
#[derive(Clone)]
pub struct RemoteEvent {
    inner: Rc<EventInner>,
}

impl fmt::Debug for RemoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteEvent")
            .field("object", &self.inner.binding.object)
            .field("name", &self.inner.binding.name)
            .field("subscribers", &self.inner.conduit.subscriber_count())
            .finish()
    }
}

impl RemoteEvent {
    pub(crate) fn new(
        object: ObjectId,
        name: &str,
        lifetime: &Lifetime,
        link: &Rc<Link>,
    ) -> Result<Self> {
        let binding = Rc::new(Binding::new(object, name, lifetime, link, false));
        let inner = Rc::new(EventInner {
            conduit: Conduit::with_hooks(binding.clone()),
            binding,
        });
        let weak = Rc::downgrade(&inner);
        lifetime.add_callback(move || {
            if let Some(inner) = weak.upgrade() {
                inner.binding.reset();
                inner.conduit.dispose();
            }
        })?;
        Ok(Self { inner })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.binding.name
    }

    /// Whether the server subscription is held.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner.binding.is_subscribed()
    }

    /// Invoke `callback` with every payload for as long as `lifetime` lives.
    pub fn subscribe(
        &self,
        lifetime: &Lifetime,
        callback: impl Fn(&Value) + 'static,
    ) -> Result<Subscriber<Value>> {
        self.inner.binding.lifetime.verify_alive()?;
        Ok(self.inner.conduit.subscribe(lifetime, callback)?)
    }

    /// Deliver a pushed payload. Generally called by the owning object.
    pub fn handle_event(&self, value: Value) {
        trace!(object = %self.inner.binding.object, name = self.name(), %value, "event");
        self.inner.conduit.send_updates(&value);
    }
}

/// A named remote invocation on an object.
#[derive(Clone)]
pub struct RemoteAction {
    object: ObjectId,
    name: String,
    lifetime: Lifetime,
    link: Rc<Link>,
}

impl fmt::Debug for RemoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAction")
            .field("object", &self.object)
            .field("name", &self.name)
            .finish()
    }
}

impl RemoteAction {
    pub(crate) fn new(object: ObjectId, name: &str, lifetime: &Lifetime, link: &Rc<Link>) -> Self {
        Self {
            object,
            name: name.to_owned(),
            lifetime: lifetime.clone(),
            link: Rc::clone(link),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send the invocation. Fails if the object has been destroyed.
    pub fn fire(&self, args: impl Into<Value>) -> Result<()> {
        self.lifetime.verify_alive()?;
        let args = args.into().to_wire();
        self.link.send("action", self.object, &self.name, |t| {
            t.fire_action(self.object, &self.name, &args);
        });
        Ok(())
    }
}
