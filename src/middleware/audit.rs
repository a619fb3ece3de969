//! Debug audit-trail middleware

use super::Middleware;
use crate::events::{EventKind, Handler, Payload};
use tracing::debug;

/// Emits a debug log of every payload before forwarding it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Audit;

impl Audit {
    pub fn new() -> Self {
        Self
    }
}

impl<T: Payload> Middleware<T> for Audit {
    fn wrap(&self, kind: EventKind, mut inner: Handler<T>) -> Handler<T> {
        Box::new(move |payload| {
            debug!(kind = %kind, payload = ?payload, "audit");
            inner(payload)
        })
    }
}
