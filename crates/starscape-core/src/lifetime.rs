#![forbid(unsafe_code)]

//! Lifetimes: an ownership and cancellation tree.
//!
//! A [`Lifetime`] scopes everything that must be torn down together: child
//! lifetimes, subscriptions, and arbitrary cleanup callbacks. Disposing a
//! lifetime cascades depth-first through its children and then runs its own
//! callbacks in reverse registration order.
//!
//! # Design
//!
//! All lifetimes of one tree live in a shared arena (`Rc<RefCell<..>>`)
//! addressed by [`LifetimeId`]. Parent/child links are stored as ids, so
//! there are no mutually-owning references between nodes. A [`Lifetime`]
//! value is only a handle: cloning it is cheap and dropping it does **not**
//! dispose anything. Disposal is always explicit.
//!
//! A lifetime may have more than one owner (see [`Lifetime::add_child`]).
//! It is disposed as soon as any owner is, and is unlinked from the rest.
//!
//! # Invariants
//!
//! 1. Once disposed, a lifetime stays disposed; `dispose()` again is a no-op.
//! 2. Every child is disposed exactly once when any of its owners is.
//! 3. Every callback runs exactly once, after all children are disposed.
//! 4. A disposed lifetime rejects `new_child`, `add_child` and
//!    `add_callback` with [`LifetimeError::Disposed`].
//!
//! # Example
//!
//! ```
//! use starscape_core::Lifetime;
//!
//! let root = Lifetime::root();
//! let child = root.new_child().unwrap();
//! child.add_callback(|| println!("released")).unwrap();
//!
//! root.dispose();
//! assert!(!child.is_alive());
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::trace;

use crate::error::{LifetimeError, Result};

/// Stable identifier of a lifetime within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LifetimeId(u64);

impl LifetimeId {
    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LifetimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lifetime#{}", self.0)
    }
}

type DisposeFn = Box<dyn FnOnce()>;

struct Record {
    owners: Vec<LifetimeId>,
    children: Vec<LifetimeId>,
    callbacks: Vec<DisposeFn>,
    disposed: bool,
}

#[derive(Default)]
struct Arena {
    next_id: u64,
    /// Records are removed once their callbacks have been taken; a missing
    /// record always reads as disposed.
    records: AHashMap<LifetimeId, Record>,
}

impl Arena {
    fn insert(&mut self, owner: Option<LifetimeId>) -> LifetimeId {
        self.next_id += 1;
        let id = LifetimeId(self.next_id);
        self.records.insert(
            id,
            Record {
                owners: owner.into_iter().collect(),
                children: Vec::new(),
                callbacks: Vec::new(),
                disposed: false,
            },
        );
        id
    }

    fn live_mut(&mut self, id: LifetimeId) -> Result<&mut Record> {
        match self.records.get_mut(&id) {
            Some(record) if !record.disposed => Ok(record),
            _ => Err(LifetimeError::Disposed(id)),
        }
    }

    fn is_live(&self, id: LifetimeId) -> bool {
        self.records.get(&id).is_some_and(|r| !r.disposed)
    }
}

/// Handle to a node in the lifetime tree.
///
/// Cheaply cloneable. Two handles compare equal when they refer to the same
/// node of the same arena.
#[derive(Clone)]
pub struct Lifetime {
    arena: Rc<RefCell<Arena>>,
    id: LifetimeId,
}

impl Lifetime {
    /// Create a root lifetime in a fresh arena.
    #[must_use]
    pub fn root() -> Self {
        let arena = Rc::new(RefCell::new(Arena::default()));
        let id = arena.borrow_mut().insert(None);
        Self { arena, id }
    }

    /// Identifier of this lifetime (for tracing/logging).
    #[inline]
    #[must_use]
    pub fn id(&self) -> LifetimeId {
        self.id
    }

    /// Create a new lifetime owned by this one.
    pub fn new_child(&self) -> Result<Lifetime> {
        let mut arena = self.arena.borrow_mut();
        arena.live_mut(self.id)?;
        let child = arena.insert(Some(self.id));
        arena.live_mut(self.id)?.children.push(child);
        Ok(Lifetime {
            arena: Rc::clone(&self.arena),
            id: child,
        })
    }

    /// Make this lifetime an owner of an already-created lifetime.
    ///
    /// `child` keeps its existing owners; it is disposed when any of them is.
    /// Adding the same child twice is a no-op.
    pub fn add_child(&self, child: &Lifetime) -> Result<()> {
        if !Rc::ptr_eq(&self.arena, &child.arena) {
            return Err(LifetimeError::ForeignArena);
        }
        let mut arena = self.arena.borrow_mut();
        arena.live_mut(self.id)?;
        let record = arena.live_mut(child.id)?;
        if record.owners.contains(&self.id) {
            return Ok(());
        }
        record.owners.push(self.id);
        arena.live_mut(self.id)?.children.push(child.id);
        Ok(())
    }

    /// Register cleanup to run when this lifetime is disposed.
    ///
    /// Callbacks run in reverse registration order.
    pub fn add_callback(&self, callback: impl FnOnce() + 'static) -> Result<()> {
        self.arena
            .borrow_mut()
            .live_mut(self.id)?
            .callbacks
            .push(Box::new(callback));
        Ok(())
    }

    /// Whether this lifetime has not been disposed yet.
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.arena.borrow().is_live(self.id)
    }

    /// Return `Err` if this lifetime has been disposed.
    ///
    /// ```ignore
    /// lifetime.verify_alive()?;
    /// ```
    pub fn verify_alive(&self) -> Result<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(LifetimeError::Disposed(self.id))
        }
    }

    /// Dispose this lifetime, all of its descendants, and run callbacks.
    ///
    /// Idempotent. Callbacks run with no internal borrow held, so they may
    /// freely create, link or dispose other lifetimes.
    pub fn dispose(&self) {
        dispose_record(&self.arena, self.id);
    }

    /// Number of live lifetimes in this handle's arena.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.arena
            .borrow()
            .records
            .values()
            .filter(|r| !r.disposed)
            .count()
    }

    /// Number of lifetimes currently owned by this one.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.arena
            .borrow()
            .records
            .get(&self.id)
            .map_or(0, |r| r.children.len())
    }
}

fn dispose_record(arena: &Rc<RefCell<Arena>>, id: LifetimeId) {
    // Mark first so nothing can be attached while children unwind.
    let children = {
        let mut arena = arena.borrow_mut();
        let Some(record) = arena.records.get_mut(&id) else {
            return;
        };
        if record.disposed {
            return;
        }
        record.disposed = true;
        std::mem::take(&mut record.children)
    };

    for child in children {
        dispose_record(arena, child);
    }

    let callbacks = {
        let mut arena = arena.borrow_mut();
        let Some(record) = arena.records.remove(&id) else {
            return;
        };
        for owner in &record.owners {
            if let Some(owner) = arena.records.get_mut(owner) {
                owner.children.retain(|c| *c != id);
            }
        }
        record.callbacks
    };

    trace!(lifetime = %id, callbacks = callbacks.len(), "lifetime disposed");
    for callback in callbacks.into_iter().rev() {
        callback();
    }
}

impl PartialEq for Lifetime {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.arena, &other.arena) && self.id == other.id
    }
}

impl Eq for Lifetime {}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifetime")
            .field("id", &self.id.0)
            .field("alive", &self.is_alive())
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
