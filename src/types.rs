//! Core value types carried by events
//!
//! All prices, volumes, and profits use fixed-decimal arithmetic; timestamps
//! are nanoseconds since the Unix epoch as they appear in tick recordings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Nanoseconds since the Unix epoch.
pub type UnixNanos = i64;

/// A bid/ask price snapshot.
///
/// Timestamps within one stream are monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: UnixNanos,
    pub bid: Decimal,
    pub ask: Decimal,
    pub bid_volume: Decimal,
    pub ask_volume: Decimal,
}

impl Tick {
    /// Mid price between bid and ask.
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Timestamp as a UTC datetime, for display.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.timestamp)
    }
}

/// A fixed-duration aggregation of ticks.
///
/// `timestamp` is the period-aligned start of the window; the OHLC fields
/// satisfy `low <= open, close <= high` and `volume >= 0` for every bar the
/// aggregator emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub period: Duration,
    pub timestamp: UnixNanos,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// Timestamp as a UTC datetime, for display.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.timestamp)
    }
}

/// Position lifecycle states.
///
/// The derived ordering is the lifecycle order: a position only ever advances
/// `PendingOpen -> Opened -> PendingClose -> Closed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PositionState {
    PendingOpen,
    Opened,
    PendingClose,
    Closed,
}

impl std::fmt::Display for PositionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingOpen => write!(f, "pending-open"),
            Self::Opened => write!(f, "opened"),
            Self::PendingClose => write!(f, "pending-close"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// A position record as published on the bus.
///
/// Lifecycle events carry the full record; consumers reconcile against their
/// own copy keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: u64,
    pub state: PositionState,
    pub open_time: UnixNanos,
    pub close_time: Option<UnixNanos>,
    pub open_price: Decimal,
    pub close_price: Option<Decimal>,
    pub size: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub gross_profit: Decimal,
    pub net_profit: Decimal,
}

impl Position {
    /// Check the close-field invariant: `close_time` and `close_price` are
    /// set iff the position is `Closed`.
    pub fn validate(&self) -> crate::error::Result<()> {
        let closed = self.state == PositionState::Closed;
        if closed != self.close_time.is_some() || closed != self.close_price.is_some() {
            return Err(crate::error::RuntimeError::Strategy(format!(
                "position {} is {} but close fields are {}",
                self.id,
                self.state,
                if self.close_time.is_some() { "set" } else { "unset" },
            )));
        }
        Ok(())
    }

    /// Whether `next` is a legal lifecycle successor of the current state.
    pub fn can_advance_to(&self, next: PositionState) -> bool {
        self.state <= next
    }
}

/// What an order asks the execution venue to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    Open,
    Close,
    Modify,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

/// A trade command published by strategy code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub command: OrderCommand,
    pub order_type: OrderType,
    /// Target position, for `Close`/`Modify`/`Remove`.
    pub position_id: u64,
    pub price: Decimal,
    pub size: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}
