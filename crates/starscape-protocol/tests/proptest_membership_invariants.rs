#![forbid(unsafe_code)]

//! Property-based invariant tests for membership set diffing.
//!
//! For any sequence of pushed lists (with repeats):
//!
//! 1. Members equal the distinct items of the latest list, in first-seen
//!    order.
//! 2. Each item is added exactly once per stretch of consecutive presence
//!    and removed exactly once when it leaves.
//! 3. A member keeps the same lifetime for as long as it stays.
//! 4. One duplicate error is reported per repeated entry.
//! 5. Disposing the set ends every remaining member.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use proptest::prelude::*;
use starscape_core::Lifetime;
use starscape_harness::Harness;
use starscape_protocol::{MembershipSet, ObjectId, ProtocolError, Shape, Value, WireValue};

// ── Helpers ─────────────────────────────────────────────────────────────

fn arb_lists() -> impl Strategy<Value = Vec<Vec<u8>>> {
    proptest::collection::vec(proptest::collection::vec(0u8..8, 0..10), 1..12)
}

fn distinct(list: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for &n in list {
        if !out.contains(&n) {
            out.push(n);
        }
    }
    out
}

#[derive(Default)]
struct Tally {
    adds: HashMap<u8, u32>,
    removes: HashMap<u8, u32>,
}

fn tracked(h: &Harness) -> (MembershipSet, Rc<RefCell<Tally>>) {
    let prop = h
        .connection
        .root()
        .unwrap()
        .property("ids", Shape::list_of(Shape::Number))
        .unwrap();
    let tally = Rc::new(RefCell::new(Tally::default()));
    let t = Rc::clone(&tally);
    let set = MembershipSet::new(&prop, &h.root, move |lt: &Lifetime, item: &Value| {
        let n = item.as_number().unwrap() as u8;
        *t.borrow_mut().adds.entry(n).or_default() += 1;
        let t = Rc::clone(&t);
        lt.add_callback(move || *t.borrow_mut().removes.entry(n).or_default() += 1)
            .unwrap();
    })
    .unwrap();
    (set, tally)
}

fn push(h: &Harness, list: &[u8]) {
    let wire = WireValue::List(list.iter().map(|&n| WireValue::Number(f64::from(n))).collect());
    h.update(ObjectId(1), "ids", wire);
}

// ═════════════════════════════════════════════════════════════════════════
// Diff against a naive model
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn membership_matches_model(lists in arb_lists()) {
        let h = Harness::new();
        let (set, tally) = tracked(&h);

        let mut present: Vec<u8> = Vec::new();
        let mut expected_adds: HashMap<u8, u32> = HashMap::new();
        let mut expected_removes: HashMap<u8, u32> = HashMap::new();
        let mut expected_dups = 0usize;
        let mut lifetimes: HashMap<u8, Lifetime> = HashMap::new();

        for list in &lists {
            push(&h, list);
            let next = distinct(list);
            expected_dups += list.len() - next.len();
            for n in &next {
                if !present.contains(n) {
                    *expected_adds.entry(*n).or_default() += 1;
                }
            }
            for n in &present {
                if !next.contains(n) {
                    *expected_removes.entry(*n).or_default() += 1;
                    lifetimes.remove(n);
                }
            }

            let items: Vec<u8> = set.items().iter().map(|v| v.as_number().unwrap() as u8).collect();
            prop_assert_eq!(&items, &next);

            for n in &next {
                let lt = set.lifetime_of(&Value::Number(f64::from(*n))).unwrap();
                prop_assert!(lt.is_alive());
                if let Some(previous) = lifetimes.get(n) {
                    prop_assert_eq!(previous, &lt);
                }
                lifetimes.insert(*n, lt);
            }
            present = next;
        }

        prop_assert_eq!(&tally.borrow().adds, &expected_adds);
        prop_assert_eq!(&tally.borrow().removes, &expected_removes);
        let dups = h
            .reporter
            .take()
            .iter()
            .filter(|e| matches!(e, ProtocolError::DuplicateItem { .. }))
            .count();
        prop_assert_eq!(dups, expected_dups);

        set.dispose();
        let t = tally.borrow();
        for (n, adds) in &t.adds {
            prop_assert_eq!(t.removes.get(n).copied().unwrap_or(0), *adds);
        }
        prop_assert!(lifetimes.values().all(|lt| !lt.is_alive()));
    }
}
