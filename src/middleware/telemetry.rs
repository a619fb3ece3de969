//! Per-kind event counting middleware

use super::Middleware;
use crate::events::{EventKind, Handler, Payload};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Counts events per kind before forwarding them.
///
/// Counters are shared through the instance's clones, so the caller keeps a
/// clone, wraps handlers with another, and reads the totals after the router
/// is done. Counters are atomic; reads while the loop is still running are
/// allowed.
#[derive(Clone)]
pub struct Telemetry {
    counts: Arc<[AtomicU64; EventKind::COUNT]>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            counts: Arc::new(std::array::from_fn(|_| AtomicU64::new(0))),
        }
    }

    /// Events seen for `kind`.
    pub fn count(&self, kind: EventKind) -> u64 {
        self.counts[kind.index()].load(Ordering::Relaxed)
    }

    /// Log the counter of every kind.
    pub fn print_statistics(&self) {
        for kind in EventKind::ALL {
            info!(kind = %kind, count = self.count(kind), "telemetry");
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Payload> Middleware<T> for Telemetry {
    fn wrap(&self, kind: EventKind, mut inner: Handler<T>) -> Handler<T> {
        let counts = Arc::clone(&self.counts);
        let index = kind.index();
        Box::new(move |payload| {
            counts[index].fetch_add(1, Ordering::Relaxed);
            inner(payload)
        })
    }
}
