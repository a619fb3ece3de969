//! Event-driven runtime for market data and trading pipelines
//!
//! Ticks from a live feed or a replayed recording flow through a
//! single-threaded dispatch loop into typed handlers, which middleware can
//! wrap for monitoring, telemetry, timing, and auditing.

pub mod config;
pub mod error;
pub mod events;
pub mod middleware;
pub mod replay;
pub mod router;
pub mod strategy;
pub mod types;
