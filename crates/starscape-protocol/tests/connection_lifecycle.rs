#![forbid(unsafe_code)]

//! Object registry, events, actions and teardown.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use starscape_core::LifetimeError;
use starscape_harness::{Harness, Outbound};
use starscape_protocol::{ConnectionConfig, Error, Inbound, ObjectId, Shape, Value, WireValue};

const GOD: ObjectId = ObjectId(1);

// ── Registry ────────────────────────────────────────────────────────────

#[test]
fn one_handle_per_object_id() {
    let h = Harness::new();
    let a = h.connection.object(ObjectId(5)).unwrap();
    let b = h.connection.object(ObjectId(5)).unwrap();
    assert!(a.ptr_eq(&b));
    assert_eq!(a, b);

    let resolved = h
        .connection
        .resolve(&WireValue::List(vec![ObjectId(5).into(), ObjectId(6).into()]))
        .unwrap();
    let items = resolved.as_list().unwrap();
    assert_eq!(items[0].as_object(), Some(&a));
    assert_eq!(h.connection.object_count(), 2);
}

#[test]
fn root_object_follows_config() {
    let h = Harness::with_config(ConnectionConfig::default().with_root_object(ObjectId(7)));
    assert_eq!(h.connection.root().unwrap().id(), ObjectId(7));
}

#[test]
fn pushes_for_unknown_objects_are_dropped() {
    let h = Harness::new();
    h.update(ObjectId(40), "x", 1);
    h.reply(ObjectId(40), "x", 1);
    h.event(ObjectId(40), "x", 1);
    h.connection.object_destroyed(ObjectId(40));
    assert_eq!(h.connection.object_count(), 0);
    assert!(h.reporter.is_empty());
}

#[test]
fn dispatch_routes_inbound_messages() {
    let h = Harness::new();
    let prop = h.connection.root().unwrap().property("count", Shape::Number).unwrap();
    let getter = prop.getter(&h.root).unwrap();
    h.connection.dispatch(Inbound::Update {
        object: GOD,
        name: "count".into(),
        value: WireValue::Number(3.0),
    });
    assert_eq!(getter.get().unwrap(), Some(Value::from(3)));

    h.connection.dispatch(Inbound::Destroyed { object: GOD });
    assert!(getter.get().is_err());
}

// ── Destruction ─────────────────────────────────────────────────────────

#[test]
fn destroyed_object_unwinds_without_unsubscribing() {
    let h = Harness::new();
    let ship = h.connection.object(ObjectId(3)).unwrap();
    let prop = ship.property("position", Shape::Any).unwrap();
    let fired = Rc::new(Cell::new(0));
    let f = Rc::clone(&fired);
    prop.subscribe(&h.root, move |_| f.set(f.get() + 1)).unwrap();
    h.transport.clear();

    h.connection.object_destroyed(ObjectId(3));
    assert!(!ship.is_alive());
    assert!(h.connection.lookup(ObjectId(3)).is_none());
    assert!(h.transport.sent().is_empty());
    assert_eq!(prop.subscriber_count(), 0);

    let err = prop.set(1).unwrap_err();
    assert_eq!(err, Error::Lifetime(LifetimeError::Disposed(ship.lifetime().id())));
    assert!(ship.property("position", Shape::Any).is_err());
    assert!(ship.action("warp").fire(Value::Null).is_err());
    assert_eq!(fired.get(), 0);

    // A later handle for the same id is a fresh object.
    let again = h.connection.object(ObjectId(3)).unwrap();
    assert!(!again.ptr_eq(&ship));
    assert!(again.is_alive());
}

#[test]
fn connection_lost_unwinds_everything() {
    let h = Harness::new();
    let root = h.connection.root().unwrap();
    let other = h.connection.object(ObjectId(2)).unwrap();
    let getter = root.property("count", Shape::Number).unwrap().getter(&h.root).unwrap();
    let scoped = other.lifetime().new_child().unwrap();
    h.transport.clear();

    h.connection.connection_lost();
    assert!(!h.connection.is_connected());
    assert!(!root.is_alive());
    assert!(!other.is_alive());
    assert!(!scoped.is_alive());
    assert_eq!(h.connection.object_count(), 0);
    assert!(getter.get().is_err());
    assert!(h.transport.sent().is_empty());
    assert!(h.connection.object(ObjectId(9)).is_err());
    assert!(h.root.is_alive());
}

#[test]
fn disposing_the_parent_lifetime_closes_the_connection() {
    let h = Harness::new();
    let root = h.connection.root().unwrap();
    h.root.dispose();
    assert!(!h.connection.is_connected());
    assert!(!root.is_alive());
}

// ── Events ──────────────────────────────────────────────────────────────

#[test]
fn event_subscription_follows_subscribers() {
    let h = Harness::new();
    let god = h.connection.root().unwrap();
    let created = god.event("ship_created").unwrap();
    let lt = h.root.new_child().unwrap();
    let ships = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&ships);
    created
        .subscribe(&lt, move |v| {
            if let Some(ship) = v.as_object() {
                s.borrow_mut().push(ship.id());
            }
        })
        .unwrap();
    assert_eq!(
        h.transport.take(),
        vec![Outbound::Subscribe {
            object: GOD,
            name: "ship_created".into()
        }]
    );
    assert!(created.is_subscribed());

    h.event(GOD, "ship_created", ObjectId(12));
    h.event(GOD, "ship_created", ObjectId(13));
    assert_eq!(*ships.borrow(), vec![ObjectId(12), ObjectId(13)]);

    lt.dispose();
    assert_eq!(h.transport.unsubscribes("ship_created"), 1);
    h.event(GOD, "ship_created", ObjectId(14));
    assert_eq!(ships.borrow().len(), 2);
}

#[test]
fn event_lookup_is_shared() {
    let h = Harness::new();
    let god = h.connection.root().unwrap();
    let a = god.event("tick").unwrap();
    let b = god.event("tick").unwrap();
    a.subscribe(&h.root, |_| {}).unwrap();
    b.subscribe(&h.root, |_| {}).unwrap();
    assert_eq!(h.transport.subscribes("tick"), 1);
}

// ── Actions ─────────────────────────────────────────────────────────────

#[test]
fn action_fire_sends_arguments() {
    let h = Harness::new();
    let god = h.connection.root().unwrap();
    god.action("create_ship")
        .fire(Value::from(vec![Value::from("scout"), Value::from(2)]))
        .unwrap();
    assert_eq!(
        h.transport.take(),
        vec![Outbound::Action {
            object: GOD,
            name: "create_ship".into(),
            args: WireValue::List(vec![WireValue::from("scout"), WireValue::Number(2.0)]),
        }]
    );
}

#[test]
fn object_arguments_travel_as_ids() {
    let h = Harness::new();
    let god = h.connection.root().unwrap();
    let ship = h.connection.object(ObjectId(12)).unwrap();
    god.action("select").fire(&ship).unwrap();
    assert!(matches!(
        h.transport.take().as_slice(),
        [Outbound::Action { args: WireValue::Object(ObjectId(12)), .. }]
    ));
}
