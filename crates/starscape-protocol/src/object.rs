#![forbid(unsafe_code)]

//! Remote objects: server-identified handles owning their properties.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use starscape_core::Lifetime;
use tracing::debug;

use crate::error::{ProtocolError, Result};
use crate::event::{RemoteAction, RemoteEvent};
use crate::link::Link;
use crate::property::RemoteProperty;
use crate::shape::Shape;
use crate::value::{ObjectId, Value};

struct ObjectInner {
    id: ObjectId,
    lifetime: Lifetime,
    link: Rc<Link>,
    properties: RefCell<AHashMap<String, RemoteProperty>>,
    events: RefCell<AHashMap<String, RemoteEvent>>,
}

/// Client-side proxy for an object hosted on the server.
///
/// Handles are cheap clones and compare by identity. The object's
/// [`lifetime`](Self::lifetime) ends when the server reports it destroyed
/// or the connection is lost; everything scoped to it unwinds then.
#[derive(Clone)]
pub struct RemoteObject {
    inner: Rc<ObjectInner>,
}

impl PartialEq for RemoteObject {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteObject")
            .field("id", &self.inner.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl RemoteObject {
    /// Create the handle for `id`, living as a child of `parent`.
    pub(crate) fn new(id: ObjectId, parent: &Lifetime, link: &Rc<Link>) -> Result<Self> {
        let lifetime = parent.new_child()?;
        let inner = Rc::new(ObjectInner {
            id,
            lifetime: lifetime.clone(),
            link: Rc::clone(link),
            properties: RefCell::new(AHashMap::new()),
            events: RefCell::new(AHashMap::new()),
        });
        // Registered first, so it runs after every property has disposed.
        let weak = Rc::downgrade(&inner);
        lifetime.add_callback(move || {
            if let Some(inner) = weak.upgrade() {
                let properties = std::mem::take(&mut *inner.properties.borrow_mut());
                let events = std::mem::take(&mut *inner.events.borrow_mut());
                debug!(object = %inner.id, properties = properties.len(), "object released");
                drop((properties, events));
            }
        })?;
        Ok(Self { inner })
    }

    /// Server-side id of the object.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Lifetime that ends when the object is destroyed.
    #[must_use]
    pub fn lifetime(&self) -> &Lifetime {
        &self.inner.lifetime
    }

    /// Whether the object has not been destroyed yet.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.lifetime.is_alive()
    }

    /// The property called `name`, created on first access.
    ///
    /// `shape` is fixed by the first lookup; later lookups return the same
    /// property regardless of the shape they pass.
    pub fn property(&self, name: &str, shape: Shape) -> Result<RemoteProperty> {
        self.inner.lifetime.verify_alive()?;
        if let Some(existing) = self.inner.properties.borrow().get(name) {
            if *existing.shape() != shape {
                debug!(object = %self.inner.id, name, declared = %existing.shape(), requested = %shape, "shape differs from first lookup");
            }
            return Ok(existing.clone());
        }
        let property = RemoteProperty::new(
            self.inner.id,
            name,
            shape,
            &self.inner.lifetime,
            &self.inner.link,
        )?;
        debug!(object = %self.inner.id, name, shape = %property.shape(), "property created");
        self.inner
            .properties
            .borrow_mut()
            .insert(name.to_owned(), property.clone());
        Ok(property)
    }

    /// The event stream called `name`, created on first access.
    pub fn event(&self, name: &str) -> Result<RemoteEvent> {
        self.inner.lifetime.verify_alive()?;
        if let Some(existing) = self.inner.events.borrow().get(name) {
            return Ok(existing.clone());
        }
        let event = RemoteEvent::new(self.inner.id, name, &self.inner.lifetime, &self.inner.link)?;
        self.inner
            .events
            .borrow_mut()
            .insert(name.to_owned(), event.clone());
        Ok(event)
    }

    /// The action called `name`.
    #[must_use]
    pub fn action(&self, name: &str) -> RemoteAction {
        RemoteAction::new(self.inner.id, name, &self.inner.lifetime, &self.inner.link)
    }

    /// Route a pushed property value.
    ///
    /// Values for properties nobody has looked up are dropped.
    pub fn handle_update(&self, name: &str, value: Value) {
        if let Some(property) = self.checked(name, &value) {
            property.handle_update(value);
        }
    }

    /// Route the reply to a get request.
    pub fn handle_get_reply(&self, name: &str, value: Value) {
        if let Some(property) = self.checked(name, &value) {
            property.handle_get_reply(value);
        }
    }

    /// Route a pushed event payload.
    pub fn handle_event(&self, name: &str, value: Value) {
        let event = self.inner.events.borrow().get(name).cloned();
        match event {
            Some(event) => event.handle_event(value),
            None => debug!(object = %self.inner.id, name, "event without subscribers dropped"),
        }
    }

    /// Whether two handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn checked(&self, name: &str, value: &Value) -> Option<RemoteProperty> {
        let property = self.inner.properties.borrow().get(name).cloned();
        let Some(property) = property else {
            debug!(object = %self.inner.id, name, "push for unknown property dropped");
            return None;
        };
        if !property.shape().matches(value) {
            self.inner.link.report(&ProtocolError::ShapeMismatch {
                object: self.inner.id,
                property: name.to_owned(),
                expected: property.shape().clone(),
                found: value.to_string(),
            });
            if self.inner.link.strict_shapes {
                return None;
            }
        }
        Some(property)
    }
}
