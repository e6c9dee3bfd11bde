#![forbid(unsafe_code)]

//! Shared plumbing between remote handles and the transport.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use starscape_core::Lifetime;
use starscape_runtime::{Conduit, SubscriptionHooks};
use tracing::{debug, trace, warn};

use crate::error::ProtocolError;
use crate::report::ErrorReporter;
use crate::transport::Transport;
use crate::value::{ObjectId, Value};

/// Per-connection context every remote handle holds.
///
/// The transport is held weakly; the connection owns it.
pub(crate) struct Link {
    transport: Weak<dyn Transport>,
    reporter: Rc<dyn ErrorReporter>,
    pub(crate) strict_shapes: bool,
}

impl Link {
    pub(crate) fn new(
        transport: &Rc<dyn Transport>,
        reporter: Rc<dyn ErrorReporter>,
        strict_shapes: bool,
    ) -> Self {
        Self {
            transport: Rc::downgrade(transport),
            reporter,
            strict_shapes,
        }
    }

    pub(crate) fn send(
        &self,
        request: &'static str,
        object: ObjectId,
        name: &str,
        f: impl FnOnce(&dyn Transport),
    ) {
        match self.transport.upgrade() {
            Some(transport) => {
                trace!(%object, name, request, "outbound");
                f(&*transport);
            }
            None => warn!(%object, name, request, "transport gone, request dropped"),
        }
    }

    pub(crate) fn report(&self, error: &ProtocolError) {
        self.reporter.report(error);
    }
}

/// Server-side subscription state for one named member of an object.
///
/// Installed as the hooks of a property's or event's conduit: the first
/// continuous subscriber subscribes on the server, the last one
/// unsubscribes. Nothing is sent once the object is gone.
pub(crate) struct Binding {
    pub(crate) object: ObjectId,
    pub(crate) name: String,
    pub(crate) lifetime: Lifetime,
    pub(crate) link: Rc<Link>,
    subscribed: Cell<bool>,
    clears_cache: bool,
}

impl Binding {
    pub(crate) fn new(
        object: ObjectId,
        name: &str,
        lifetime: &Lifetime,
        link: &Rc<Link>,
        clears_cache: bool,
    ) -> Self {
        Self {
            object,
            name: name.to_owned(),
            lifetime: lifetime.clone(),
            link: Rc::clone(link),
            subscribed: Cell::new(false),
            clears_cache,
        }
    }

    pub(crate) fn is_subscribed(&self) -> bool {
        self.subscribed.get()
    }

    pub(crate) fn reset(&self) {
        self.subscribed.set(false);
    }
}

impl SubscriptionHooks<Value> for Binding {
    fn first_subscribed(&self, _conduit: &Conduit<Value>) {
        self.subscribed.set(true);
        if self.lifetime.is_alive() {
            debug!(object = %self.object, name = %self.name, "subscribing");
            self.link.send("subscribe", self.object, &self.name, |t| {
                t.subscribe_to(self.object, &self.name);
            });
        }
    }

    fn last_unsubscribed(&self, conduit: &Conduit<Value>) {
        self.subscribed.set(false);
        if self.clears_cache {
            conduit.clear();
        }
        if self.lifetime.is_alive() {
            debug!(object = %self.object, name = %self.name, "unsubscribing");
            self.link.send("unsubscribe", self.object, &self.name, |t| {
                t.unsubscribe_from(self.object, &self.name);
            });
        }
    }
}
