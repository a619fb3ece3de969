//! Handler wall-time measurement middleware

use super::Middleware;
use crate::events::{EventKind, Handler, Payload};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Default)]
struct KindTimings {
    count: AtomicU64,
    total_ns: AtomicU64,
}

/// Measures the wall time of the inner handler call, accumulated per kind.
#[derive(Clone)]
pub struct Performance {
    timings: Arc<[KindTimings; EventKind::COUNT]>,
}

impl Default for Performance {
    fn default() -> Self {
        Self::new()
    }
}

impl Performance {
    pub fn new() -> Self {
        Self {
            timings: Arc::new(std::array::from_fn(|_| KindTimings::default())),
        }
    }

    /// Invocations measured for `kind`.
    pub fn count(&self, kind: EventKind) -> u64 {
        self.timings[kind.index()].count.load(Ordering::Relaxed)
    }

    /// Accumulated inner-handler wall time for `kind`.
    pub fn total(&self, kind: EventKind) -> Duration {
        Duration::from_nanos(self.timings[kind.index()].total_ns.load(Ordering::Relaxed))
    }

    /// Log count, total, and mean duration for every kind with at least one
    /// invocation.
    pub fn print_statistics(&self) {
        for kind in EventKind::ALL {
            let count = self.count(kind);
            if count == 0 {
                continue;
            }
            let total = self.total(kind);
            let mean = total / count as u32;
            info!(kind = %kind, count, total = ?total, mean = ?mean, "performance");
        }
    }
}

impl<T: Payload> Middleware<T> for Performance {
    fn wrap(&self, kind: EventKind, mut inner: Handler<T>) -> Handler<T> {
        let timings = Arc::clone(&self.timings);
        let index = kind.index();
        Box::new(move |payload| {
            let started = Instant::now();
            let result = inner(payload);
            let elapsed = started.elapsed();
            timings[index].count.fetch_add(1, Ordering::Relaxed);
            timings[index]
                .total_ns
                .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
            result
        })
    }
}
