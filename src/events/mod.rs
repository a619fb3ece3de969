//! Event kinds, payloads, and handler shapes
//!
//! The bus carries a closed set of event kinds. Each kind is paired at
//! compile time with exactly one payload type and one handler signature:
//! `Event` is the tagged payload, `EventKind` the fieldless tag, and
//! `HandlerFn` the shape-tagged installable handler. A wrong-shape handler is
//! rejected when it is installed, not when an event is dispatched.

use crate::error::Result;
use crate::types::{Bar, Order, Position, Tick};
use rust_decimal::Decimal;
use std::fmt;

/// A payload tagged with its event kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Tick(Tick),
    Bar(Bar),
    Equity(Decimal),
    Balance(Decimal),
    PositionOpened(Position),
    PositionClosed(Position),
    PositionPnlUpdated(Position),
    Order(Order),
}

impl Event {
    /// The kind tag of this payload.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Tick(_) => EventKind::Tick,
            Event::Bar(_) => EventKind::Bar,
            Event::Equity(_) => EventKind::Equity,
            Event::Balance(_) => EventKind::Balance,
            Event::PositionOpened(_) => EventKind::PositionOpened,
            Event::PositionClosed(_) => EventKind::PositionClosed,
            Event::PositionPnlUpdated(_) => EventKind::PositionPnlUpdated,
            Event::Order(_) => EventKind::Order,
        }
    }
}

/// The closed enumeration of event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Tick,
    Bar,
    Equity,
    Balance,
    PositionOpened,
    PositionClosed,
    PositionPnlUpdated,
    Order,
}

impl EventKind {
    /// Number of kinds; sizes per-kind counter tables.
    pub const COUNT: usize = 8;

    /// Every kind, in declaration order.
    pub const ALL: [EventKind; Self::COUNT] = [
        EventKind::Tick,
        EventKind::Bar,
        EventKind::Equity,
        EventKind::Balance,
        EventKind::PositionOpened,
        EventKind::PositionClosed,
        EventKind::PositionPnlUpdated,
        EventKind::Order,
    ];

    /// Stable index into per-kind tables.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Tick => "tick",
            EventKind::Bar => "bar",
            EventKind::Equity => "equity",
            EventKind::Balance => "balance",
            EventKind::PositionOpened => "position-opened",
            EventKind::PositionClosed => "position-closed",
            EventKind::PositionPnlUpdated => "position-pnl-updated",
            EventKind::Order => "order",
        };
        write!(f, "{}", name)
    }
}

/// Payload types that can flow through middleware.
pub trait Payload: fmt::Debug + Send + 'static {}

impl Payload for Tick {}
impl Payload for Bar {}
impl Payload for Decimal {}
impl Payload for Position {}
impl Payload for Order {}

/// A handler for payloads of type `T`.
///
/// Handlers run synchronously on the dispatch thread and must not block on
/// long-running I/O; an error return is logged and counted, never fatal.
pub type Handler<T> = Box<dyn FnMut(T) -> Result<()> + Send>;

/// An installable handler, tagged with the payload shape it accepts.
///
/// `Scalar` serves both the `Equity` and `Balance` kinds; `Position` serves
/// all three position-lifecycle kinds.
pub enum HandlerFn {
    Tick(Handler<Tick>),
    Bar(Handler<Bar>),
    Scalar(Handler<Decimal>),
    Position(Handler<Position>),
    Order(Handler<Order>),
}

impl HandlerFn {
    pub fn tick(f: impl FnMut(Tick) -> Result<()> + Send + 'static) -> Self {
        Self::Tick(Box::new(f))
    }

    pub fn bar(f: impl FnMut(Bar) -> Result<()> + Send + 'static) -> Self {
        Self::Bar(Box::new(f))
    }

    pub fn scalar(f: impl FnMut(Decimal) -> Result<()> + Send + 'static) -> Self {
        Self::Scalar(Box::new(f))
    }

    pub fn position(f: impl FnMut(Position) -> Result<()> + Send + 'static) -> Self {
        Self::Position(Box::new(f))
    }

    pub fn order(f: impl FnMut(Order) -> Result<()> + Send + 'static) -> Self {
        Self::Order(Box::new(f))
    }

    /// The payload shape, for install-time diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Tick(_) => "tick",
            Self::Bar(_) => "bar",
            Self::Scalar(_) => "scalar",
            Self::Position(_) => "position",
            Self::Order(_) => "order",
        }
    }
}

impl fmt::Debug for HandlerFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerFn::{}", self.shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn event_kind_of_payload() {
        let tick = Tick {
            timestamp: 0,
            bid: dec!(1),
            ask: dec!(2),
            bid_volume: dec!(1),
            ask_volume: dec!(1),
        };
        assert_eq!(Event::Tick(tick).kind(), EventKind::Tick);
        assert_eq!(Event::Equity(dec!(100)).kind(), EventKind::Equity);
    }

    #[test]
    fn kind_indices_are_dense_and_stable() {
        for (i, kind) in EventKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn handler_shape_names() {
        assert_eq!(HandlerFn::scalar(|_| Ok(())).shape(), "scalar");
        assert_eq!(HandlerFn::position(|_| Ok(())).shape(), "position");
    }
}
