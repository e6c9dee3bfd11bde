#![forbid(unsafe_code)]

//! Cached, subscribable values with lifetime-scoped subscribers.
//!
//! # Design
//!
//! [`Conduit<T>`] holds an optional cached value (`None` = unknown, never
//! received) and a registry of subscribers keyed by a monotonically
//! increasing [`SubscriberId`], so iteration order is registration order.
//!
//! Each registration installs a dispose callback on its owning
//! [`Lifetime`]. The callback holds only a `Weak` to the conduit, so the
//! conduit never needs to know about lifetime internals and a dropped
//! conduit leaves the callback inert.
//!
//! Specialized conduits (remote properties, remote events) observe the
//! continuous-subscriber count through [`SubscriptionHooks`] instead of
//! overriding add/delete.
//!
//! # Failure Modes
//!
//! - **Owning lifetime already disposed**: `add_subscriber` returns
//!   [`LifetimeError::Disposed`] and nothing is registered.
//! - **Callback panics**: the panic propagates out of `send_updates`;
//!   subscribers later in the order are not notified for that value.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use starscape_core::{Lifetime, LifetimeError};
use tracing::trace;

/// Identifier of one registration within a conduit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// How often a subscriber wants to hear about values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Every value until the owning lifetime ends.
    #[default]
    Continuous,
    /// The next value only; the subscriber removes itself before delivery.
    Once,
}

/// Observer of continuous-subscriber count transitions.
///
/// Both hooks run after the registry has been updated and with no borrow
/// held, so they may read or clear the conduit's cached value.
pub trait SubscriptionHooks<T> {
    /// The continuous-subscriber count went from 0 to 1.
    fn first_subscribed(&self, conduit: &Conduit<T>);
    /// The continuous-subscriber count went from 1 to 0.
    fn last_unsubscribed(&self, conduit: &Conduit<T>);
}

type Callback<T> = Rc<dyn Fn(&T)>;

struct Entry<T> {
    lifetime: Lifetime,
    delivery: Delivery,
    callback: Callback<T>,
}

struct State<T> {
    value: Option<T>,
    subscribers: BTreeMap<SubscriberId, Entry<T>>,
    next_id: u64,
    continuous: usize,
}

struct ConduitInner<T> {
    state: RefCell<State<T>>,
    hooks: Option<Rc<dyn SubscriptionHooks<T>>>,
}

/// A shared cached value with subscriber fan-out.
///
/// Cloning a `Conduit` creates a new handle to the **same** state.
pub struct Conduit<T> {
    inner: Rc<ConduitInner<T>>,
}

impl<T> Clone for Conduit<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Conduit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Conduit")
            .field("value", &state.value)
            .field("subscribers", &state.subscribers.len())
            .field("continuous", &state.continuous)
            .finish()
    }
}

impl<T: 'static> Default for Conduit<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Conduit<T> {
    /// Create a conduit whose value is unknown.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Create a conduit with a known initial value.
    #[must_use]
    pub fn with_value(value: T) -> Self {
        Self::build(Some(value), None)
    }

    /// Create a conduit that reports continuous-subscriber transitions.
    #[must_use]
    pub fn with_hooks(hooks: Rc<dyn SubscriptionHooks<T>>) -> Self {
        Self::build(None, Some(hooks))
    }

    fn build(value: Option<T>, hooks: Option<Rc<dyn SubscriptionHooks<T>>>) -> Self {
        Self {
            inner: Rc::new(ConduitInner {
                state: RefCell::new(State {
                    value,
                    subscribers: BTreeMap::new(),
                    next_id: 0,
                    continuous: 0,
                }),
                hooks,
            }),
        }
    }

    /// Register `callback`, owned by `lifetime`.
    ///
    /// The registration is removed automatically when `lifetime` is
    /// disposed (or, for [`Delivery::Once`], just before its first
    /// delivery). Nothing is delivered synchronously by this call.
    pub fn add_subscriber(
        &self,
        lifetime: &Lifetime,
        delivery: Delivery,
        callback: impl Fn(&T) + 'static,
    ) -> Result<Subscriber<T>, LifetimeError> {
        let id = {
            let mut state = self.inner.state.borrow_mut();
            state.next_id += 1;
            SubscriberId(state.next_id)
        };

        let weak = Rc::downgrade(&self.inner);
        lifetime.add_callback(move || {
            if let Some(inner) = weak.upgrade() {
                Conduit { inner }.delete_subscriber(id);
            }
        })?;

        let first = {
            let mut state = self.inner.state.borrow_mut();
            state.subscribers.insert(
                id,
                Entry {
                    lifetime: lifetime.clone(),
                    delivery,
                    callback: Rc::new(callback),
                },
            );
            if delivery == Delivery::Continuous {
                state.continuous += 1;
                state.continuous == 1
            } else {
                false
            }
        };
        trace!(subscriber = id.0, ?delivery, owner = %lifetime.id(), "subscriber added");

        if first && let Some(hooks) = &self.inner.hooks {
            hooks.first_subscribed(self);
        }
        Ok(Subscriber {
            conduit: Rc::downgrade(&self.inner),
            id,
        })
    }

    /// Register a continuous subscriber.
    pub fn subscribe(
        &self,
        lifetime: &Lifetime,
        callback: impl Fn(&T) + 'static,
    ) -> Result<Subscriber<T>, LifetimeError> {
        self.add_subscriber(lifetime, Delivery::Continuous, callback)
    }

    /// Remove a registration. Returns `false` if it was not registered.
    pub fn delete_subscriber(&self, id: SubscriberId) -> bool {
        // The entry is dropped outside the borrow: its callback may own
        // handles whose drop re-enters this conduit.
        let (entry, last) = {
            let mut state = self.inner.state.borrow_mut();
            let entry = state.subscribers.remove(&id);
            let last = match &entry {
                Some(e) if e.delivery == Delivery::Continuous => {
                    state.continuous -= 1;
                    state.continuous == 0
                }
                _ => false,
            };
            (entry, last)
        };
        let removed = entry.is_some();
        drop(entry);
        if removed {
            trace!(subscriber = id.0, "subscriber removed");
        }
        if last && let Some(hooks) = &self.inner.hooks {
            hooks.last_unsubscribed(self);
        }
        removed
    }

    /// Deliver `value` to every registered subscriber, in registration order.
    ///
    /// The registry is snapshotted first; subscribers added during delivery
    /// do not see this value, and subscribers removed during delivery are
    /// skipped.
    pub fn send_updates(&self, value: &T) {
        let order: Vec<SubscriberId> = self.inner.state.borrow().subscribers.keys().copied().collect();
        for id in order {
            let next = {
                let state = self.inner.state.borrow();
                state
                    .subscribers
                    .get(&id)
                    .map(|e| (e.lifetime.clone(), e.delivery, Rc::clone(&e.callback)))
            };
            let Some((lifetime, delivery, callback)) = next else {
                continue;
            };
            if !lifetime.is_alive() {
                continue;
            }
            if delivery == Delivery::Once {
                self.delete_subscriber(id);
            }
            callback(value);
        }
    }

    /// Access the cached value by reference (`None` = unknown).
    ///
    /// # Panics
    ///
    /// Panics if the closure re-enters this conduit mutably.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.inner.state.borrow().value.as_ref())
    }

    /// Replace the cached value without notifying anyone.
    pub fn store(&self, value: T) {
        self.inner.state.borrow_mut().value = Some(value);
    }

    /// Reset the cached value to unknown.
    pub fn clear(&self) {
        self.inner.state.borrow_mut().value = None;
    }

    /// Whether a value has been cached.
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.inner.state.borrow().value.is_some()
    }

    /// Number of registered subscribers (continuous and one-shot).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.borrow().subscribers.len()
    }

    /// Number of registered continuous subscribers.
    #[must_use]
    pub fn continuous_count(&self) -> usize {
        self.inner.state.borrow().continuous
    }

    /// Whether `id` is still registered.
    #[must_use]
    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.inner.state.borrow().subscribers.contains_key(&id)
    }

    /// Drop every registration and forget the cached value.
    ///
    /// Hooks are not invoked. Dispose callbacks already installed on owning
    /// lifetimes become no-ops.
    pub fn dispose(&self) {
        let dropped = {
            let mut state = self.inner.state.borrow_mut();
            state.value = None;
            state.continuous = 0;
            std::mem::take(&mut state.subscribers)
        };
        trace!(subscribers = dropped.len(), "conduit disposed");
        drop(dropped);
    }

    /// Whether two handles refer to the same conduit.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static> Conduit<T> {
    /// Clone of the cached value, or `None` if unknown.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.inner.state.borrow().value.clone()
    }
}

/// Handle to a registration returned by [`Conduit::add_subscriber`].
///
/// Dropping the handle does not detach; the owning lifetime does.
pub struct Subscriber<T> {
    conduit: Weak<ConduitInner<T>>,
    id: SubscriberId,
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id.0).finish()
    }
}

impl<T: 'static> Subscriber<T> {
    /// Identifier within the conduit.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Whether the registration is still active.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.conduit
            .upgrade()
            .is_some_and(|inner| Conduit { inner }.is_registered(self.id))
    }

    /// Remove the registration early. Returns `false` if already gone.
    pub fn detach(&self) -> bool {
        self.conduit
            .upgrade()
            .is_some_and(|inner| Conduit { inner }.delete_subscriber(self.id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
