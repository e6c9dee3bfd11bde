#![forbid(unsafe_code)]

//! Remote properties: named, cached values on a remote object.
//!
//! # Design
//!
//! A [`RemoteProperty`] is a [`Conduit<Value>`] whose hooks talk to the
//! server. The first continuous subscriber subscribes on the server; when
//! the last one leaves, the property unsubscribes and forgets its cached
//! value, so a later subscription always starts from unknown.
//!
//! Get requests are deduplicated: while one is in flight, further
//! [`get_then`](RemoteProperty::get_then) calls only add one-shot
//! subscribers that the single reply will serve.
//!
//! Local writes are optimistic: [`set`](RemoteProperty::set) notifies
//! subscribers immediately and the next server push for the property wins,
//! whatever it contains. A transport that echoes the write back before
//! `set_property` returns does not notify subscribers a second time.
//!
//! # Invariants
//!
//! 1. At most one get request is outstanding per property.
//! 2. The cache is only written while subscribed on the server.
//! 3. Pushes reach pending one-shot subscribers even when not subscribed.
//! 4. After the owning object is destroyed, reads fail with the disposal
//!    error and callbacks never fire.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use starscape_core::{Lifetime, LifetimeError};
use starscape_runtime::{Conduit, Delivery, Subscriber};
use tracing::trace;

use crate::error::{Error, ProtocolError, Result};
use crate::link::{Binding, Link};
use crate::shape::Shape;
use crate::value::{ObjectId, Value};

struct PropertyInner {
    binding: Rc<Binding>,
    shape: Shape,
    conduit: Conduit<Value>,
    pending_get: Cell<bool>,
    /// Value of a local write while it is being handed to the transport.
    in_flight: RefCell<Option<Value>>,
}

/// A named piece of data on a remote object.
///
/// Obtained from [`RemoteObject::property`](crate::RemoteObject::property);
/// repeated lookups of the same name return handles to the same property.
#[derive(Clone)]
pub struct RemoteProperty {
    inner: Rc<PropertyInner>,
}

impl fmt::Debug for RemoteProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteProperty")
            .field("object", &self.inner.binding.object)
            .field("name", &self.inner.binding.name)
            .field("shape", &self.inner.shape)
            .field("subscribed", &self.is_subscribed())
            .field("pending_get", &self.has_pending_get())
            .finish()
    }
}

impl RemoteProperty {
    /// Create a property of the object living for `lifetime`.
    ///
    /// The property disposes itself when `lifetime` ends.
    pub(crate) fn new(
        object: ObjectId,
        name: &str,
        shape: Shape,
        lifetime: &Lifetime,
        link: &Rc<Link>,
    ) -> Result<Self> {
        let binding = Rc::new(Binding::new(object, name, lifetime, link, true));
        let inner = Rc::new(PropertyInner {
            conduit: Conduit::with_hooks(binding.clone()),
            binding,
            shape,
            pending_get: Cell::new(false),
            in_flight: RefCell::new(None),
        });
        let weak = Rc::downgrade(&inner);
        lifetime.add_callback(move || {
            if let Some(inner) = weak.upgrade() {
                RemoteProperty { inner }.dispose();
            }
        })?;
        Ok(Self { inner })
    }

    /// Property name on the server.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.binding.name
    }

    /// Id of the object this property belongs to.
    #[must_use]
    pub fn object_id(&self) -> ObjectId {
        self.inner.binding.object
    }

    /// Shape declared by the first lookup of this property.
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.inner.shape
    }

    /// Lifetime of the owning object.
    #[must_use]
    pub fn lifetime(&self) -> &Lifetime {
        &self.inner.binding.lifetime
    }

    /// Whether at least one continuous subscriber keeps the value hot.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner.binding.is_subscribed()
    }

    /// Whether a get request has been sent and not yet answered.
    #[must_use]
    pub fn has_pending_get(&self) -> bool {
        self.inner.pending_get.get()
    }

    /// Number of registered subscribers (continuous and one-shot).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.conduit.subscriber_count()
    }

    /// The cached value: `Ok(None)` while unknown.
    ///
    /// Always unknown while unsubscribed. Prefer a [`Getter`], which keeps
    /// the property subscribed.
    pub fn cached_value(&self) -> Result<Option<Value>> {
        self.verify_alive()?;
        Ok(self.inner.conduit.value())
    }

    /// Write the property.
    ///
    /// A no-op if `value` equals the cached value. Otherwise the write is
    /// sent and applied locally at once, without waiting for the server.
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        self.verify_alive()?;
        let value = value.into();
        if !self.inner.shape.matches(&value) {
            return Err(Error::ShapeMismatch {
                object: self.object_id(),
                property: self.name().to_owned(),
                expected: self.inner.shape.clone(),
                found: value.to_string(),
            });
        }
        if self.inner.conduit.with(|cached| cached == Some(&value)) {
            return Ok(());
        }
        let wire = value.to_wire();
        let outer = self.inner.in_flight.replace(Some(value.clone()));
        let binding = &self.inner.binding;
        binding.link.send("set", binding.object, &binding.name, |t| {
            t.set_property(binding.object, &binding.name, &wire);
        });
        self.inner.in_flight.replace(outer);
        self.handle_update(value);
        Ok(())
    }

    /// Invoke `callback` with the current value, fetching it if needed.
    ///
    /// With a cached value the callback runs synchronously and nothing is
    /// sent. Otherwise the callback waits for the next value to arrive; at
    /// most one get request is in flight per property. If `lifetime` or the
    /// object ends first, the callback is never invoked.
    pub fn get_then(
        &self,
        lifetime: &Lifetime,
        callback: impl FnOnce(&Value) + 'static,
    ) -> Result<()> {
        self.verify_alive()?;
        lifetime.verify_alive()?;
        if let Some(value) = self.inner.conduit.value() {
            callback(&value);
            return Ok(());
        }

        let slot = RefCell::new(Some(callback));
        self.inner
            .conduit
            .add_subscriber(lifetime, Delivery::Once, move |value| {
                let callback = slot.borrow_mut().take();
                if let Some(callback) = callback {
                    callback(value);
                }
            })?;

        if !self.inner.pending_get.replace(true) {
            let binding = &self.inner.binding;
            binding.link.send("get", binding.object, &binding.name, |t| {
                t.get_property(binding.object, &binding.name);
            });
        }
        Ok(())
    }

    /// Fetch a text property once and parse it into an enumeration.
    ///
    /// A value that is not text or does not parse is reported as
    /// [`ProtocolError::UnknownVariant`] and `callback` is not invoked.
    pub fn variant_then<E: FromStr + 'static>(
        &self,
        lifetime: &Lifetime,
        callback: impl FnOnce(E) + 'static,
    ) -> Result<()> {
        let binding = Rc::clone(&self.inner.binding);
        self.get_then(lifetime, move |value| {
            match value.as_str().and_then(|s| s.parse::<E>().ok()) {
                Some(variant) => callback(variant),
                None => binding.link.report(&ProtocolError::UnknownVariant {
                    object: binding.object,
                    property: binding.name.clone(),
                    value: value.to_string(),
                }),
            }
        })
    }

    /// Keep the property subscribed for `lifetime` and return an accessor
    /// for its cached value.
    ///
    /// The accessor reads unknown until the first value arrives.
    pub fn getter(&self, lifetime: &Lifetime) -> Result<Getter> {
        self.verify_alive()?;
        self.inner.conduit.subscribe(lifetime, |_| {})?;
        Ok(Getter {
            property: self.clone(),
            lifetime: lifetime.clone(),
        })
    }

    /// Invoke `callback` with every value for as long as `lifetime` lives.
    ///
    /// A value already cached is delivered to the new subscriber right away.
    pub fn subscribe(
        &self,
        lifetime: &Lifetime,
        callback: impl Fn(&Value) + 'static,
    ) -> Result<Subscriber<Value>> {
        self.verify_alive()?;
        let callback = Rc::new(callback);
        let deliver = Rc::clone(&callback);
        let subscriber = self
            .inner
            .conduit
            .subscribe(lifetime, move |value| deliver(value))?;
        if let Some(value) = self.inner.conduit.value() {
            callback(&value);
        }
        Ok(subscriber)
    }

    /// Apply a value pushed by the server (or written locally).
    ///
    /// Generally called by the owning object.
    pub fn handle_update(&self, value: Value) {
        if self.inner.in_flight.borrow().as_ref() == Some(&value) {
            trace!(object = %self.object_id(), name = self.name(), "echo of local write ignored");
            return;
        }
        trace!(object = %self.object_id(), name = self.name(), %value, "property update");
        if self.is_subscribed() {
            self.inner.conduit.store(value.clone());
        }
        // One-shot get subscribers must be served even when unsubscribed.
        self.inner.conduit.send_updates(&value);
    }

    /// Apply the reply to a get request.
    ///
    /// Generally called by the owning object.
    pub fn handle_get_reply(&self, value: Value) {
        self.inner.pending_get.set(false);
        self.handle_update(value);
    }

    /// Tear down the subscriber registry. Called when the object is gone.
    pub fn dispose(&self) {
        self.inner.binding.reset();
        self.inner.pending_get.set(false);
        self.inner.conduit.dispose();
    }

    /// Whether two handles refer to the same property.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn report(&self, error: &ProtocolError) {
        self.inner.binding.link.report(error);
    }

    fn verify_alive(&self) -> std::result::Result<(), LifetimeError> {
        self.inner.binding.lifetime.verify_alive()
    }
}

/// Accessor returned by [`RemoteProperty::getter`].
///
/// Holds the property subscribed until its lifetime ends.
#[derive(Debug, Clone)]
pub struct Getter {
    property: RemoteProperty,
    lifetime: Lifetime,
}

impl Getter {
    /// The cached value, `Ok(None)` until the first value arrives.
    ///
    /// Fails with the disposal error once the getter's lifetime or the
    /// object has ended.
    pub fn get(&self) -> Result<Option<Value>> {
        self.lifetime.verify_alive()?;
        self.property.cached_value()
    }

    #[must_use]
    pub fn property(&self) -> &RemoteProperty {
        &self.property
    }
}
