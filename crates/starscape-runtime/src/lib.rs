#![forbid(unsafe_code)]

//! Runtime: reactive conduits and local properties scoped by lifetimes.

pub mod reactive;

pub use reactive::{Conduit, Delivery, LocalProperty, Subscriber, SubscriberId, SubscriptionHooks};
