#![forbid(unsafe_code)]

//! Locally-owned observable values.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use starscape_core::{Lifetime, LifetimeError};

use super::conduit::{Conduit, Subscriber};

/// A local value that can be subscribed to and set.
///
/// A conduit whose cache is always known: the value lives in the conduit
/// itself and only changes through [`set`](Self::set). It never talks to a
/// transport. Cloning a `LocalProperty` creates a new handle to the **same**
/// value.
///
/// # Invariants
///
/// 1. The conduit's cached value is the property's value.
/// 2. `version` increments exactly once per `set` that changes the value.
/// 3. Setting a value equal to the current one notifies nobody.
pub struct LocalProperty<T> {
    conduit: Conduit<T>,
    version: Rc<Cell<u64>>,
}

impl<T> Clone for LocalProperty<T> {
    fn clone(&self) -> Self {
        Self {
            conduit: self.conduit.clone(),
            version: Rc::clone(&self.version),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for LocalProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.conduit.with(|value| {
            f.debug_struct("LocalProperty")
                .field("value", &value)
                .field("version", &self.version.get())
                .finish()
        })
    }
}

impl<T: Clone + PartialEq + 'static> LocalProperty<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            conduit: Conduit::with_value(value),
            version: Rc::new(Cell::new(0)),
        }
    }

    /// Clone of the current value.
    ///
    /// # Panics
    ///
    /// Panics if the cache was cleared through [`conduit`](Self::conduit).
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Access the current value by reference.
    ///
    /// # Panics
    ///
    /// Panics if the cache was cleared through [`conduit`](Self::conduit).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.conduit
            .with(|value| f(value.expect("local property value is always known")))
    }

    /// Set the value, notifying subscribers only if it changed.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        if self.conduit.with(|current| current == Some(&value)) {
            return false;
        }
        self.conduit.store(value.clone());
        self.version.set(self.version.get() + 1);
        self.conduit.send_updates(&value);
        true
    }

    /// Subscribe to future changes for as long as `lifetime` lives.
    pub fn subscribe(
        &self,
        lifetime: &Lifetime,
        callback: impl Fn(&T) + 'static,
    ) -> Result<Subscriber<T>, LifetimeError> {
        self.conduit.subscribe(lifetime, callback)
    }

    /// Number of changes applied so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// The conduit holding the value and carrying change notifications.
    #[must_use]
    pub fn conduit(&self) -> &Conduit<T> {
        &self.conduit
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn set_notifies_on_change_only() {
        let lt = Lifetime::root();
        let prop = LocalProperty::new(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        prop.subscribe(&lt, move |v| s.borrow_mut().push(*v)).unwrap();

        assert!(!prop.set(1));
        assert!(prop.set(2));
        assert!(!prop.set(2));
        assert!(prop.set(3));

        assert_eq!(*seen.borrow(), vec![2, 3]);
        assert_eq!(prop.get(), 3);
        assert_eq!(prop.version(), 2);
    }

    #[test]
    fn subscriber_sees_new_value_in_get() {
        let lt = Lifetime::root();
        let prop = LocalProperty::new(String::from("a"));
        let observed = Rc::new(RefCell::new(String::new()));
        let p = prop.clone();
        let o = Rc::clone(&observed);
        prop.subscribe(&lt, move |_| *o.borrow_mut() = p.get()).unwrap();
        prop.set("b".into());
        assert_eq!(*observed.borrow(), "b");
    }

    #[test]
    fn disposed_subscriber_not_notified() {
        let root = Lifetime::root();
        let lt = root.new_child().unwrap();
        let prop = LocalProperty::new(0);
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        prop.subscribe(&lt, move |_| c.set(c.get() + 1)).unwrap();
        prop.set(1);
        lt.dispose();
        prop.set(2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn clone_shares_value() {
        let a = LocalProperty::new(10);
        let b = a.clone();
        a.set(11);
        assert_eq!(b.get(), 11);
        assert_eq!(b.with(|v| v * 2), 22);
    }

    #[test]
    fn option_values() {
        let prop: LocalProperty<Option<u32>> = LocalProperty::new(None);
        assert!(prop.set(Some(4)));
        assert!(!prop.set(Some(4)));
        assert!(prop.set(None));
    }

    #[test]
    fn conduit_holds_the_value() {
        let prop = LocalProperty::new(3);
        assert!(prop.conduit().is_known());
        assert_eq!(prop.conduit().value(), Some(3));
        prop.set(4);
        assert_eq!(prop.conduit().value(), Some(4));
        assert_eq!(prop.get(), 4);
    }
}
