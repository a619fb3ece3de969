//! Tick-to-bar aggregation

use crate::error::{Result, RuntimeError};
use crate::events::{Event, HandlerFn};
use crate::router::RouterHandle;
use crate::types::{Bar, Tick, UnixNanos};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Aggregates ticks into fixed-period bars and posts each finished bar back
/// onto the bus.
///
/// One bar is under construction at a time, keyed by its period-aligned
/// start timestamp. A tick belonging to a later window first posts the
/// current bar, then opens a fresh one; gaps in the tick stream produce no
/// synthetic bars.
pub struct BarAggregator {
    period: Duration,
    period_ns: i64,
    handle: RouterHandle,
    current: Option<Bar>,
}

impl BarAggregator {
    pub fn new(period: Duration, handle: RouterHandle) -> Result<Self> {
        let period_ns = i64::try_from(period.as_nanos())
            .map_err(|_| RuntimeError::Config("bar period too large".into()))?;
        if period_ns == 0 {
            return Err(RuntimeError::Config("bar period must be positive".into()));
        }
        Ok(Self {
            period,
            period_ns,
            handle,
            current: None,
        })
    }

    /// Absorb one tick, posting the previous bar if this tick starts a new
    /// window.
    pub fn on_tick(&mut self, tick: &Tick) -> Result<()> {
        let price = tick.mid();
        let volume = tick.bid_volume + tick.ask_volume;
        let window = self.align(tick.timestamp);

        if let Some(bar) = self.current.take() {
            if bar.timestamp == window {
                let mut bar = bar;
                bar.high = bar.high.max(price);
                bar.low = bar.low.min(price);
                bar.close = price;
                bar.volume += volume;
                self.current = Some(bar);
                return Ok(());
            }
            self.handle.post(Event::Bar(bar))?;
        }

        self.current = Some(Bar {
            period: self.period,
            timestamp: window,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        });
        Ok(())
    }

    /// Post and clear the in-construction bar, if any. Called at shutdown or
    /// stream end.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(bar) = self.current.take() {
            self.handle.post(Event::Bar(bar))?;
        }
        Ok(())
    }

    /// The bar currently under construction.
    pub fn current(&self) -> Option<&Bar> {
        self.current.as_ref()
    }

    fn align(&self, timestamp: UnixNanos) -> UnixNanos {
        timestamp - timestamp.rem_euclid(self.period_ns)
    }

    /// A tick handler feeding the shared aggregator, for installation on a
    /// router.
    pub fn handler(aggregator: &Arc<Mutex<Self>>) -> HandlerFn {
        let aggregator = Arc::clone(aggregator);
        HandlerFn::tick(move |tick| aggregator.lock().on_tick(&tick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::router::Router;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const SECOND: i64 = 1_000_000_000;

    fn tick(seconds: i64, price: Decimal, volume: Decimal) -> Tick {
        Tick {
            timestamp: seconds * SECOND,
            bid: price,
            ask: price,
            bid_volume: volume,
            ask_volume: Decimal::ZERO,
        }
    }

    fn aggregator(capacity: usize) -> (BarAggregator, RouterHandle, Router) {
        let router = Router::new(capacity);
        let handle = router.handle();
        let agg = BarAggregator::new(Duration::from_secs(60), handle.clone()).unwrap();
        (agg, handle, router)
    }

    #[test]
    fn minute_bar_aggregation() {
        let (mut agg, _handle, router) = aggregator(8);

        agg.on_tick(&tick(0, dec!(10), dec!(1))).unwrap();
        agg.on_tick(&tick(30, dec!(12), dec!(2))).unwrap();
        agg.on_tick(&tick(61, dec!(9), dec!(1))).unwrap();

        // First window emitted when the 61s tick crossed the boundary.
        assert_eq!(router.stats().posted, 1);
        let current = agg.current().unwrap();
        assert_eq!(current.timestamp, 60 * SECOND);
        assert_eq!(current.open, dec!(9));
        assert_eq!(current.high, dec!(9));
        assert_eq!(current.low, dec!(9));
        assert_eq!(current.close, dec!(9));
        assert_eq!(current.volume, dec!(1));
    }

    #[tokio::test]
    async fn emitted_bars_satisfy_ohlc_invariants() {
        let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
        let mut router = Router::new(16);
        let handle = router.handle();

        let agg = Arc::new(Mutex::new(
            BarAggregator::new(Duration::from_secs(60), handle.clone()).unwrap(),
        ));
        router
            .install(EventKind::Tick, BarAggregator::handler(&agg))
            .unwrap();

        let bars = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&bars);
        router
            .install(
                EventKind::Bar,
                HandlerFn::bar(move |bar| {
                    sink.lock().push(bar);
                    Ok(())
                }),
            )
            .unwrap();

        for (s, price, volume) in [
            (0, dec!(10), dec!(1)),
            (30, dec!(12), dec!(2)),
            (61, dec!(9), dec!(1)),
            (200, dec!(11), dec!(4)),
        ] {
            handle.post(Event::Tick(tick(s, price, volume))).unwrap();
        }

        let executor = move |_: &tokio::sync::watch::Receiver<bool>| -> crate::error::Result<()> {
            cancel_tx.send(true).ok();
            Ok(())
        };
        router.run(cancel_rx, executor).await;

        let bars = bars.lock();
        // 0s and 60s windows closed; the 180s window is still open.
        assert_eq!(bars.len(), 2);
        let first = &bars[0];
        assert_eq!(first.timestamp, 0);
        assert_eq!(first.open, dec!(10));
        assert_eq!(first.high, dec!(12));
        assert_eq!(first.low, dec!(10));
        assert_eq!(first.close, dec!(12));
        assert_eq!(first.volume, dec!(3));
        for bar in bars.iter() {
            assert!(bar.low <= bar.open && bar.open <= bar.high);
            assert!(bar.low <= bar.close && bar.close <= bar.high);
            assert!(bar.volume >= Decimal::ZERO);
            assert_eq!(bar.timestamp.rem_euclid(60 * SECOND), 0);
        }
    }

    #[test]
    fn flush_emits_and_clears() {
        let (mut agg, _handle, router) = aggregator(8);
        agg.on_tick(&tick(5, dec!(10), dec!(1))).unwrap();

        agg.flush().unwrap();
        assert!(agg.current().is_none());
        assert_eq!(router.stats().posted, 1);

        // Nothing under construction: flush is a no-op.
        agg.flush().unwrap();
        assert_eq!(router.stats().posted, 1);
    }

    #[test]
    fn zero_period_is_rejected() {
        let router = Router::new(1);
        assert!(BarAggregator::new(Duration::ZERO, router.handle()).is_err());
    }

    #[test]
    fn gaps_produce_no_synthetic_bars() {
        let (mut agg, _handle, router) = aggregator(8);
        agg.on_tick(&tick(0, dec!(10), dec!(1))).unwrap();
        // Several empty windows pass before the next tick.
        agg.on_tick(&tick(600, dec!(11), dec!(1))).unwrap();
        assert_eq!(router.stats().posted, 1);
        assert_eq!(agg.current().unwrap().timestamp, 600 * SECOND);
    }
}
