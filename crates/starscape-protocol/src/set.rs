#![forbid(unsafe_code)]

//! Membership sets: a list-valued property seen as a set of members, each
//! with its own lifetime.
//!
//! # Design
//!
//! Every list the property delivers is diffed against the previous
//! membership, scanning left to right:
//!
//! - an item already present keeps its lifetime and triggers nothing;
//! - a repeated item within one list is reported as
//!   [`ProtocolError::DuplicateItem`] and only its first occurrence counts;
//! - a new item gets a child lifetime of the set and the caller's `on_add`
//!   callback. Object items also tie that lifetime to the object's own, so a
//!   destroyed object leaves the set even before the server says so.
//!
//! Items missing from the new list have their lifetimes disposed after the
//! scan. A non-list value is reported as [`ProtocolError::NotAList`] and the
//! membership is left untouched.
//!
//! While `on_add` runs, queries on the set still answer with the previous
//! membership. A list delivered while a diff is running (for example
//! because `on_add` wrote the property) is queued and diffed once the
//! running pass has committed; only the latest queued list is kept.
//!
//! The set is owned by its lifetime, not by the returned handle: dropping
//! every [`MembershipSet`] handle keeps it tracking until the lifetime ends.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use starscape_core::Lifetime;
use tracing::debug;

use crate::error::{ProtocolError, Result};
use crate::property::RemoteProperty;
use crate::value::{Value, ValueKey};

type OnAdd = Rc<dyn Fn(&Lifetime, &Value)>;

#[derive(Default)]
struct Membership {
    order: Vec<Value>,
    lifetimes: AHashMap<ValueKey, Lifetime>,
}

struct SetInner {
    property: RemoteProperty,
    lifetime: Lifetime,
    members: RefCell<Membership>,
    on_add: OnAdd,
    diffing: Cell<bool>,
    queued: RefCell<Option<Value>>,
}

/// Per-item view of a list-valued [`RemoteProperty`].
///
/// The set keeps the property subscribed until its lifetime ends: when the
/// `parent` passed to [`new`](Self::new) is disposed, when the property's
/// object is destroyed, or on [`dispose`](Self::dispose). Every member
/// lifetime ends with it.
#[derive(Clone)]
pub struct MembershipSet {
    inner: Rc<SetInner>,
}

impl fmt::Debug for MembershipSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MembershipSet")
            .field("property", &self.inner.property.name())
            .field("items", &self.inner.members.borrow().order)
            .field("alive", &self.inner.lifetime.is_alive())
            .finish()
    }
}

impl MembershipSet {
    /// Track `property`, calling `on_add(item_lifetime, item)` for every
    /// item that joins the list.
    ///
    /// A list already cached on the property is applied before this returns.
    pub fn new(
        property: &RemoteProperty,
        parent: &Lifetime,
        on_add: impl Fn(&Lifetime, &Value) + 'static,
    ) -> Result<Self> {
        let lifetime = parent.new_child()?;
        match Self::attach(property, &lifetime, Rc::new(on_add)) {
            Ok(set) => Ok(set),
            Err(error) => {
                lifetime.dispose();
                Err(error)
            }
        }
    }

    fn attach(property: &RemoteProperty, lifetime: &Lifetime, on_add: OnAdd) -> Result<Self> {
        property.lifetime().add_child(lifetime)?;
        let inner = Rc::new(SetInner {
            property: property.clone(),
            lifetime: lifetime.clone(),
            members: RefCell::new(Membership::default()),
            on_add,
            diffing: Cell::new(false),
            queued: RefCell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        lifetime.add_callback(move || {
            if let Some(inner) = weak.upgrade() {
                let members = std::mem::take(&mut *inner.members.borrow_mut());
                debug!(property = inner.property.name(), members = members.order.len(), "membership set closed");
                drop(members);
            }
        })?;

        // The subscription owns the set; it is released when `lifetime`
        // ends or the property is disposed.
        let owned = Rc::clone(&inner);
        property.subscribe(lifetime, move |value| owned.apply(value))?;
        Ok(Self { inner })
    }

    /// Lifetime scoping the whole set.
    #[must_use]
    pub fn lifetime(&self) -> &Lifetime {
        &self.inner.lifetime
    }

    #[must_use]
    pub fn property(&self) -> &RemoteProperty {
        &self.inner.property
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.members.borrow().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, item: &Value) -> bool {
        self.inner.members.borrow().lifetimes.contains_key(&item.key())
    }

    /// Lifetime of `item`'s current membership.
    #[must_use]
    pub fn lifetime_of(&self, item: &Value) -> Option<Lifetime> {
        self.inner.members.borrow().lifetimes.get(&item.key()).cloned()
    }

    /// Current members in list order, duplicates removed.
    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        self.inner.members.borrow().order.clone()
    }

    /// Stop tracking. Every member lifetime is disposed.
    pub fn dispose(&self) {
        self.inner.lifetime.dispose();
    }
}

impl SetInner {
    fn apply(&self, value: &Value) {
        if self.diffing.replace(true) {
            *self.queued.borrow_mut() = Some(value.clone());
            return;
        }
        let mut alive = self.diff(value);
        while alive {
            let Some(next) = self.queued.borrow_mut().take() else {
                break;
            };
            alive = self.diff(&next);
        }
        self.queued.borrow_mut().take();
        self.diffing.set(false);
    }

    /// One diff pass. Returns `false` if the set ended during the pass.
    fn diff(&self, value: &Value) -> bool {
        if !self.lifetime.is_alive() {
            return false;
        }
        let Some(list) = value.as_list() else {
            self.property.report(&ProtocolError::NotAList {
                object: self.property.object_id(),
                property: self.property.name().to_owned(),
                value: value.to_string(),
            });
            return true;
        };

        let previous = self.members.borrow().lifetimes.clone();
        let mut next = Membership::default();
        for item in list {
            let key = item.key();
            if next.lifetimes.contains_key(&key) {
                self.property.report(&ProtocolError::DuplicateItem {
                    object: self.property.object_id(),
                    property: self.property.name().to_owned(),
                    item: item.to_string(),
                });
                continue;
            }
            if let Some(existing) = previous.get(&key)
                && existing.is_alive()
            {
                next.lifetimes.insert(key, existing.clone());
                next.order.push(item.clone());
                continue;
            }

            let Ok(item_lifetime) = self.lifetime.new_child() else {
                return false;
            };
            if let Some(object) = item.as_object()
                && let Err(error) = object.lifetime().add_child(&item_lifetime)
            {
                debug!(property = self.property.name(), object = %object.id(), %error, "member not tied to object");
            }
            next.lifetimes.insert(key, item_lifetime.clone());
            next.order.push(item.clone());
            (self.on_add)(&item_lifetime, item);
            if !self.lifetime.is_alive() {
                return false;
            }
        }

        let removed: Vec<Lifetime> = previous
            .into_iter()
            .filter(|(key, _)| !next.lifetimes.contains_key(key))
            .map(|(_, lifetime)| lifetime)
            .collect();
        debug!(
            property = self.property.name(),
            members = next.order.len(),
            removed = removed.len(),
            "membership updated"
        );
        *self.members.borrow_mut() = next;
        for lifetime in removed {
            lifetime.dispose();
        }
        self.lifetime.is_alive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::connection::Connection;
    use crate::shape::Shape;
    use crate::transport::Transport;
    use crate::value::{ObjectId, WireValue};

    struct Silent;

    impl Transport for Silent {
        fn get_property(&self, _: ObjectId, _: &str) {}
        fn set_property(&self, _: ObjectId, _: &str, _: &WireValue) {}
        fn subscribe_to(&self, _: ObjectId, _: &str) {}
        fn unsubscribe_from(&self, _: ObjectId, _: &str) {}
        fn fire_action(&self, _: ObjectId, _: &str, _: &WireValue) {}
    }

    struct Fixture {
        connection: Connection,
        property: RemoteProperty,
        errors: Rc<RefCell<Vec<ProtocolError>>>,
    }

    fn fixture() -> Fixture {
        let root = Lifetime::root();
        let transport: Rc<dyn Transport> = Rc::new(Silent);
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errors);
        let connection = Connection::with_reporter(
            &root,
            transport,
            ConnectionConfig::default(),
            Rc::new(move |e: &ProtocolError| sink.borrow_mut().push(e.clone())),
        )
        .unwrap();
        let property = connection
            .root()
            .unwrap()
            .property("names", Shape::list_of(Shape::Text))
            .unwrap();
        Fixture {
            connection,
            property,
            errors,
        }
    }

    fn push(fx: &Fixture, items: &[&str]) {
        let wire = WireValue::List(items.iter().map(|s| WireValue::from(*s)).collect());
        fx.connection.update_property(ObjectId(1), "names", &wire);
    }

    #[test]
    fn adds_each_item_once_and_disposes_departures() {
        let fx = fixture();
        let added = Rc::new(RefCell::new(Vec::new()));
        let a = Rc::clone(&added);
        let set = MembershipSet::new(&fx.property, fx.connection.lifetime(), move |_, item| {
            a.borrow_mut().push(item.to_string());
        })
        .unwrap();

        push(&fx, &["a", "b", "c"]);
        let b_lifetime = set.lifetime_of(&Value::from("b")).unwrap();
        let a_lifetime = set.lifetime_of(&Value::from("a")).unwrap();

        push(&fx, &["b", "c", "d"]);
        assert_eq!(*added.borrow(), vec!["\"a\"", "\"b\"", "\"c\"", "\"d\""]);
        assert!(!a_lifetime.is_alive());
        assert_eq!(set.lifetime_of(&Value::from("b")), Some(b_lifetime));
        assert_eq!(set.items(), vec![Value::from("b"), Value::from("c"), Value::from("d")]);
    }

    #[test]
    fn duplicate_reported_and_skipped() {
        let fx = fixture();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let set = MembershipSet::new(&fx.property, fx.connection.lifetime(), move |_, _| {
            c.set(c.get() + 1);
        })
        .unwrap();
        push(&fx, &["a", "a"]);
        assert_eq!(count.get(), 1);
        assert_eq!(set.len(), 1);
        assert!(matches!(
            fx.errors.borrow().as_slice(),
            [ProtocolError::DuplicateItem { .. }]
        ));
    }

    #[test]
    fn on_add_sees_previous_membership() {
        let fx = fixture();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let slot: Rc<RefCell<Option<MembershipSet>>> = Rc::new(RefCell::new(None));
        let (s, sl) = (Rc::clone(&seen), Rc::clone(&slot));
        let set = MembershipSet::new(&fx.property, fx.connection.lifetime(), move |_, _| {
            if let Some(set) = sl.borrow().as_ref() {
                s.borrow_mut().push(set.len());
            }
        })
        .unwrap();
        *slot.borrow_mut() = Some(set.clone());
        push(&fx, &["a", "b"]);
        assert_eq!(*seen.borrow(), vec![0, 0]);
        assert_eq!(set.len(), 2);
        slot.borrow_mut().take();
    }

    #[test]
    fn dispose_ends_every_member() {
        let fx = fixture();
        let set = MembershipSet::new(&fx.property, fx.connection.lifetime(), |_, _| {}).unwrap();
        push(&fx, &["a", "b"]);
        let members: Vec<Lifetime> = set
            .items()
            .iter()
            .filter_map(|item| set.lifetime_of(item))
            .collect();
        set.dispose();
        assert!(members.iter().all(|lt| !lt.is_alive()));
        assert!(set.is_empty());
        assert!(!fx.property.is_subscribed());
    }
}
