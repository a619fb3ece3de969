//! Handler middleware
//!
//! A middleware wraps a handler and returns a handler of the same shape.
//! One middleware value decorates handlers of every payload type, so a
//! single [`Telemetry`] or [`Monitor`] instance can be layered around the
//! tick, bar, scalar, position, and order handlers of one router; per-kind
//! behavior comes from the kind given at wrap time.

mod audit;
mod monitor;
mod performance;
mod telemetry;


pub use audit::Audit;
pub use monitor::{Monitor, MonitorMask};
pub use performance::Performance;
pub use telemetry::Telemetry;

use crate::events::{EventKind, Handler, Payload};

/// A decorator for handlers of payload type `T`.
///
/// Implementations are pass-through: they forward the payload unchanged and
/// return the inner handler's error verbatim.
pub trait Middleware<T: Payload> {
    fn wrap(&self, kind: EventKind, inner: Handler<T>) -> Handler<T>;
}

/// Compose `layers` around `inner`, right-to-left, so the first listed layer
/// is outermost on invocation:
///
/// `compose(kind, &[w1, w2, w3], h)` behaves as `w1(w2(w3(h)))`.
///
/// An empty layer list is the identity.
pub fn compose<T: Payload>(
    kind: EventKind,
    layers: &[&dyn Middleware<T>],
    inner: Handler<T>,
) -> Handler<T> {
    layers
        .iter()
        .rev()
        .fold(inner, |handler, layer| layer.wrap(kind, handler))
}
