#![forbid(unsafe_code)]

//! Reactive data bindings for Starscape.
//!
//! This module provides the subscription primitives the remote layer is
//! built on:
//!
//! - [`Conduit`]: A shared cached value plus an ordered registry of
//!   subscribers, with synchronous fan-out via [`Conduit::send_updates`].
//! - [`Subscriber`]: Handle to one registration. Registrations are owned by
//!   a [`Lifetime`](starscape_core::Lifetime) and detach automatically when
//!   it is disposed.
//! - [`LocalProperty`]: A conduit whose value only changes through local
//!   `set()` calls, notifying on actual change only.
//!
//! # Architecture
//!
//! `Conduit<T>` uses `Rc<..>` for single-threaded shared ownership.
//! Callbacks are `Rc<dyn Fn(&T)>` so delivery never holds a borrow of the
//! registry; a callback may subscribe, detach, or push a new value.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. A value is delivered only to subscribers that are still registered
//!    and whose lifetime is alive at the moment of delivery.
//! 3. A one-shot subscriber is removed before its callback runs, so it is
//!    delivered to at most once.
//! 4. Disposing the owning lifetime removes a subscriber exactly once.
//! 5. Setting a [`LocalProperty`] to an equal value is a no-op.

pub mod conduit;
pub mod local;

pub use conduit::{Conduit, Delivery, Subscriber, SubscriberId, SubscriptionHooks};
pub use local::LocalProperty;
