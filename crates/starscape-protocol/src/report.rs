#![forbid(unsafe_code)]

//! Injected sink for non-fatal protocol violations.

use tracing::error;

use crate::error::ProtocolError;

/// Receives protocol violations the client recovered from.
///
/// Implemented for any `Fn(&ProtocolError)`.
pub trait ErrorReporter {
    fn report(&self, error: &ProtocolError);
}

impl<F: Fn(&ProtocolError)> ErrorReporter for F {
    fn report(&self, error: &ProtocolError) {
        self(error);
    }
}

/// Default reporter: emits an `ERROR`-level tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &ProtocolError) {
        error!(%error, "protocol violation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectId;
    use std::cell::RefCell;

    #[test]
    fn closures_are_reporters() {
        let seen = RefCell::new(Vec::new());
        let reporter = |e: &ProtocolError| seen.borrow_mut().push(e.clone());
        let err = ProtocolError::NotAList {
            object: ObjectId(1),
            property: "bodies".into(),
            value: "5".into(),
        };
        reporter.report(&err);
        assert_eq!(*seen.borrow(), vec![err]);
    }

    #[test]
    fn tracing_reporter_does_not_panic() {
        TracingReporter.report(&ProtocolError::UnknownVariant {
            object: ObjectId(2),
            property: "class".into(),
            value: "\"comet\"".into(),
        });
    }
}
