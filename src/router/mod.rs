//! Event router: bounded ingress queue, handler table, dispatch loop
//!
//! One worker consumes the queue and invokes handlers; any number of
//! producers post concurrently through [`RouterHandle`]. When the queue is
//! empty the worker advances the configured [`ExecutorLoop`] one bounded step
//! instead of blocking, which is what lets a replay source be pumped one
//! record per idle cycle.

mod executor;


pub use executor::{ExecutorLoop, Idle};

use crate::error::{Result, RuntimeError};
use crate::events::{Event, EventKind, Handler, HandlerFn};
use crate::types::{Bar, Order, Position, Tick};
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::warn;

/// Snapshot of the router's monotonic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Successful `post` calls.
    pub posted: u64,
    /// Rejected `post` calls (queue full or router stopped).
    pub post_fails: u64,
    /// Events removed from the queue.
    pub dispatched: u64,
    /// Dispatches that found no handler or whose handler errored.
    pub dispatch_fails: u64,
    /// Idle cycles, i.e. executor-loop invocations.
    pub loop_cycles: u64,
    /// Accumulated wall time spent inside `run`.
    pub run_time: Duration,
}

#[derive(Default)]
struct Counters {
    posted: AtomicU64,
    post_fails: AtomicU64,
    dispatched: AtomicU64,
    dispatch_fails: AtomicU64,
    loop_cycles: AtomicU64,
    run_time_ns: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> RouterStats {
        RouterStats {
            posted: self.posted.load(Ordering::Relaxed),
            post_fails: self.post_fails.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dispatch_fails: self.dispatch_fails.load(Ordering::Relaxed),
            loop_cycles: self.loop_cycles.load(Ordering::Relaxed),
            run_time: Duration::from_nanos(self.run_time_ns.load(Ordering::Relaxed)),
        }
    }
}

struct Shared {
    counters: Counters,
    done: watch::Sender<Option<RuntimeError>>,
}

/// Cloneable producer-side handle: post events, read counters, await the
/// terminal cause.
#[derive(Clone)]
pub struct RouterHandle {
    tx: Sender<Event>,
    shared: Arc<Shared>,
}

impl RouterHandle {
    /// Non-blocking enqueue.
    ///
    /// Returns [`RuntimeError::QueueFull`] when the queue is at capacity and
    /// [`RuntimeError::Closed`] once the dispatch loop has exited; both are
    /// counted in `post_fails`. Safe to call from any thread, including from
    /// inside a handler (the event lands behind everything already queued).
    pub fn post(&self, event: Event) -> Result<()> {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.shared.counters.posted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.shared.counters.post_fails.fetch_add(1, Ordering::Relaxed);
                Err(RuntimeError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.shared.counters.post_fails.fetch_add(1, Ordering::Relaxed);
                Err(RuntimeError::Closed)
            }
        }
    }

    /// Counter snapshot.
    pub fn stats(&self) -> RouterStats {
        self.shared.counters.snapshot()
    }

    /// The terminal cause, once the loop has exited.
    pub fn terminal(&self) -> Option<RuntimeError> {
        self.shared.done.borrow().clone()
    }

    /// Wait for the dispatch loop to exit and return its terminal cause.
    pub async fn done(&self) -> RuntimeError {
        let mut rx = self.shared.done.subscribe();
        loop {
            if let Some(cause) = rx.borrow_and_update().clone() {
                return cause;
            }
            if rx.changed().await.is_err() {
                return RuntimeError::Internal("router dropped before running".into());
            }
        }
    }
}

/// One nullable slot per event kind.
///
/// The `Event` sum type routes each payload to the slot of its own shape, so
/// a payload/handler mismatch cannot occur at dispatch time; the residual
/// failure is an empty slot.
#[derive(Default)]
struct HandlerTable {
    tick: Option<Handler<Tick>>,
    bar: Option<Handler<Bar>>,
    equity: Option<Handler<Decimal>>,
    balance: Option<Handler<Decimal>>,
    position_opened: Option<Handler<Position>>,
    position_closed: Option<Handler<Position>>,
    position_pnl: Option<Handler<Position>>,
    order: Option<Handler<Order>>,
}

impl HandlerTable {
    fn install(&mut self, kind: EventKind, handler: HandlerFn) -> Result<()> {
        match (kind, handler) {
            (EventKind::Tick, HandlerFn::Tick(h)) => self.tick = Some(h),
            (EventKind::Bar, HandlerFn::Bar(h)) => self.bar = Some(h),
            (EventKind::Equity, HandlerFn::Scalar(h)) => self.equity = Some(h),
            (EventKind::Balance, HandlerFn::Scalar(h)) => self.balance = Some(h),
            (EventKind::PositionOpened, HandlerFn::Position(h)) => self.position_opened = Some(h),
            (EventKind::PositionClosed, HandlerFn::Position(h)) => self.position_closed = Some(h),
            (EventKind::PositionPnlUpdated, HandlerFn::Position(h)) => self.position_pnl = Some(h),
            (EventKind::Order, HandlerFn::Order(h)) => self.order = Some(h),
            (kind, handler) => {
                return Err(RuntimeError::HandlerShape {
                    kind,
                    handler: handler.shape(),
                })
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, event: Event) -> Result<()> {
        let kind = event.kind();
        match event {
            Event::Tick(tick) => Self::invoke(&mut self.tick, kind, tick),
            Event::Bar(bar) => Self::invoke(&mut self.bar, kind, bar),
            Event::Equity(value) => Self::invoke(&mut self.equity, kind, value),
            Event::Balance(value) => Self::invoke(&mut self.balance, kind, value),
            Event::PositionOpened(p) => Self::invoke(&mut self.position_opened, kind, p),
            Event::PositionClosed(p) => Self::invoke(&mut self.position_closed, kind, p),
            Event::PositionPnlUpdated(p) => Self::invoke(&mut self.position_pnl, kind, p),
            Event::Order(order) => Self::invoke(&mut self.order, kind, order),
        }
    }

    fn invoke<T>(slot: &mut Option<Handler<T>>, kind: EventKind, payload: T) -> Result<()> {
        match slot {
            Some(handler) => handler(payload),
            None => Err(RuntimeError::NoHandler(kind)),
        }
    }
}

/// The event bus: ingress queue plus handler table plus dispatch worker.
pub struct Router {
    rx: Receiver<Event>,
    table: HandlerTable,
    handle: RouterHandle,
}

impl Router {
    /// Create a router with a fixed queue capacity.
    ///
    /// Capacity 0 is legal and makes every `post` fail, which the boundary
    /// tests rely on.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let (done, _) = watch::channel(None);
        let shared = Arc::new(Shared {
            counters: Counters::default(),
            done,
        });
        Self {
            rx,
            table: HandlerTable::default(),
            handle: RouterHandle { tx, shared },
        }
    }

    /// A producer handle; clone freely.
    pub fn handle(&self) -> RouterHandle {
        self.handle.clone()
    }

    /// Install (or replace) the handler for `kind`.
    ///
    /// A handler whose payload shape does not match the kind is rejected
    /// here, never at dispatch time. `run` consumes the router, so the table
    /// is complete before the first event is dispatched.
    pub fn install(&mut self, kind: EventKind, handler: HandlerFn) -> Result<()> {
        self.table.install(kind, handler)
    }

    /// Counter snapshot.
    pub fn stats(&self) -> RouterStats {
        self.handle.stats()
    }

    /// Run the dispatch loop until cancellation fires or the executor loop
    /// fails; the terminal cause is returned and published on the done
    /// channel.
    ///
    /// Each iteration makes a strict-priority, non-blocking choice:
    /// cancellation first, then one queued event, otherwise one executor
    /// step. Handler errors are counted and logged, never terminal. Counters
    /// are not reset on entry; events posted before `run` are dispatched
    /// first-in first-out like any others.
    pub async fn run(
        mut self,
        cancel: watch::Receiver<bool>,
        mut executor: impl ExecutorLoop,
    ) -> RuntimeError {
        let shared = Arc::clone(&self.handle.shared);
        let counters = &shared.counters;
        let started = Instant::now();

        let cause = loop {
            if *cancel.borrow() {
                break RuntimeError::Cancelled;
            }
            match self.rx.try_recv() {
                Ok(event) => {
                    counters.dispatched.fetch_add(1, Ordering::Relaxed);
                    if let Err(err) = self.table.dispatch(event) {
                        counters.dispatch_fails.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %err, "event dispatch failed");
                    }
                }
                Err(TryRecvError::Empty) => {
                    counters.loop_cycles.fetch_add(1, Ordering::Relaxed);
                    if let Err(err) = executor.step(&cancel).await {
                        break err;
                    }
                    // Let producer tasks on the same runtime make progress.
                    tokio::task::yield_now().await;
                }
                Err(TryRecvError::Disconnected) => {
                    break RuntimeError::Internal("ingress queue disconnected".into());
                }
            }
        };

        counters
            .run_time_ns
            .fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);

        // Receiver goes away first so posting reports Closed, then the
        // terminal cause fires; no handler runs after done is observable.
        drop(self.rx);
        drop(self.table);
        shared.done.send_replace(Some(cause.clone()));
        cause
    }
}
