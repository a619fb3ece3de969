//! Position bookkeeping
//!
//! Terminal consumer for the position-lifecycle and account-scalar kinds.
//! The book reconciles each event against its own copy of the position and
//! rejects records that violate the lifecycle (rejections are ordinary
//! handler errors: logged and counted by the router, never fatal).

use crate::error::{Result, RuntimeError};
use crate::events::{EventKind, HandlerFn};
use crate::router::Router;
use crate::types::{Position, PositionState};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct PositionBook {
    open: HashMap<u64, Position>,
    balance: Decimal,
    equity: Decimal,
    closed_count: u64,
    realized_gross: Decimal,
    realized_net: Decimal,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly announced position.
    pub fn apply_opened(&mut self, position: Position) -> Result<()> {
        position.validate()?;
        if position.state > PositionState::Opened {
            return Err(RuntimeError::Strategy(format!(
                "position {} announced in state {}",
                position.id, position.state
            )));
        }
        if self.open.contains_key(&position.id) {
            return Err(RuntimeError::Strategy(format!(
                "position {} is already tracked",
                position.id
            )));
        }
        self.open.insert(position.id, position);
        Ok(())
    }

    /// Reconcile a profit update against the tracked record.
    pub fn apply_pnl(&mut self, position: Position) -> Result<()> {
        position.validate()?;
        let tracked = self.open.get_mut(&position.id).ok_or_else(|| {
            RuntimeError::Strategy(format!("pnl update for unknown position {}", position.id))
        })?;
        if !tracked.can_advance_to(position.state) {
            return Err(RuntimeError::Strategy(format!(
                "position {} cannot move {} -> {}",
                position.id, tracked.state, position.state
            )));
        }
        *tracked = position;
        Ok(())
    }

    /// Retire a closed position and accumulate its realized profit.
    pub fn apply_closed(&mut self, position: Position) -> Result<()> {
        position.validate()?;
        if position.state != PositionState::Closed {
            return Err(RuntimeError::Strategy(format!(
                "position {} closed event in state {}",
                position.id, position.state
            )));
        }
        self.open.remove(&position.id).ok_or_else(|| {
            RuntimeError::Strategy(format!("close event for unknown position {}", position.id))
        })?;
        self.closed_count += 1;
        self.realized_gross += position.gross_profit;
        self.realized_net += position.net_profit;
        Ok(())
    }

    pub fn apply_balance(&mut self, value: Decimal) {
        self.balance = value;
    }

    pub fn apply_equity(&mut self, value: Decimal) {
        self.equity = value;
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn position(&self, id: u64) -> Option<&Position> {
        self.open.get(&id)
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn equity(&self) -> Decimal {
        self.equity
    }

    pub fn closed_count(&self) -> u64 {
        self.closed_count
    }

    pub fn realized_gross(&self) -> Decimal {
        self.realized_gross
    }

    pub fn realized_net(&self) -> Decimal {
        self.realized_net
    }

    /// Net profit currently carried by open positions.
    pub fn open_net_profit(&self) -> Decimal {
        self.open.values().map(|p| p.net_profit).sum()
    }

    /// Install the book's five handlers (three position kinds plus the
    /// account scalars) on `router`.
    pub fn install(book: &Arc<RwLock<Self>>, router: &mut Router) -> Result<()> {
        let opened = Arc::clone(book);
        router.install(
            EventKind::PositionOpened,
            HandlerFn::position(move |p| opened.write().apply_opened(p)),
        )?;

        let pnl = Arc::clone(book);
        router.install(
            EventKind::PositionPnlUpdated,
            HandlerFn::position(move |p| pnl.write().apply_pnl(p)),
        )?;

        let closed = Arc::clone(book);
        router.install(
            EventKind::PositionClosed,
            HandlerFn::position(move |p| closed.write().apply_closed(p)),
        )?;

        let balance = Arc::clone(book);
        router.install(
            EventKind::Balance,
            HandlerFn::scalar(move |v| {
                balance.write().apply_balance(v);
                Ok(())
            }),
        )?;

        let equity = Arc::clone(book);
        router.install(
            EventKind::Equity,
            HandlerFn::scalar(move |v| {
                equity.write().apply_equity(v);
                Ok(())
            }),
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use rust_decimal_macros::dec;
    use tokio::sync::watch;

    fn position(id: u64, state: PositionState) -> Position {
        let closed = state == PositionState::Closed;
        Position {
            id,
            state,
            open_time: 1_000,
            close_time: closed.then_some(9_000),
            open_price: dec!(1.10),
            close_price: closed.then_some(dec!(1.15)),
            size: dec!(100),
            stop_loss: Some(dec!(1.05)),
            take_profit: None,
            gross_profit: dec!(5),
            net_profit: dec!(4),
        }
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut book = PositionBook::new();
        book.apply_opened(position(1, PositionState::Opened)).unwrap();
        assert_eq!(book.open_count(), 1);

        let mut updated = position(1, PositionState::Opened);
        updated.net_profit = dec!(7);
        book.apply_pnl(updated).unwrap();
        assert_eq!(book.position(1).unwrap().net_profit, dec!(7));
        assert_eq!(book.open_net_profit(), dec!(7));

        book.apply_closed(position(1, PositionState::Closed)).unwrap();
        assert_eq!(book.open_count(), 0);
        assert_eq!(book.closed_count(), 1);
        assert_eq!(book.realized_gross(), dec!(5));
        assert_eq!(book.realized_net(), dec!(4));
    }

    #[test]
    fn backwards_transition_is_rejected() {
        let mut book = PositionBook::new();
        book.apply_opened(position(1, PositionState::Opened)).unwrap();
        book.apply_pnl(position(1, PositionState::PendingClose))
            .unwrap();

        let err = book
            .apply_pnl(position(1, PositionState::Opened))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Strategy(_)));
        assert_eq!(book.position(1).unwrap().state, PositionState::PendingClose);
    }

    #[test]
    fn inconsistent_records_are_rejected() {
        let mut book = PositionBook::new();

        // Announcing a position that is already past its open.
        assert!(book
            .apply_opened(position(1, PositionState::PendingClose))
            .is_err());

        book.apply_opened(position(2, PositionState::Opened)).unwrap();
        assert!(book.apply_opened(position(2, PositionState::Opened)).is_err());

        // Updates for positions the book never saw.
        assert!(book.apply_pnl(position(9, PositionState::Opened)).is_err());
        assert!(book.apply_closed(position(9, PositionState::Closed)).is_err());

        // A close event must carry a closed record.
        assert!(book.apply_closed(position(2, PositionState::Opened)).is_err());
        assert_eq!(book.open_count(), 1);
    }

    #[tokio::test]
    async fn book_tracks_events_from_the_bus() {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut router = Router::new(16);
        let book = Arc::new(RwLock::new(PositionBook::new()));
        PositionBook::install(&book, &mut router).unwrap();

        let handle = router.handle();
        handle
            .post(Event::PositionOpened(position(1, PositionState::Opened)))
            .unwrap();
        handle
            .post(Event::PositionPnlUpdated(position(1, PositionState::Opened)))
            .unwrap();
        handle
            .post(Event::PositionClosed(position(1, PositionState::Closed)))
            .unwrap();
        handle.post(Event::Balance(dec!(10_000))).unwrap();
        handle.post(Event::Equity(dec!(10_004))).unwrap();

        let executor = move |_: &watch::Receiver<bool>| -> crate::error::Result<()> {
            cancel_tx.send(true).ok();
            Ok(())
        };
        router.run(cancel_rx, executor).await;

        let book = book.read();
        assert_eq!(book.open_count(), 0);
        assert_eq!(book.closed_count(), 1);
        assert_eq!(book.realized_net(), dec!(4));
        assert_eq!(book.balance(), dec!(10_000));
        assert_eq!(book.equity(), dec!(10_004));
    }
}
