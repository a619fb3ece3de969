//! Bar-derived indicators

use crate::types::Bar;
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Simple moving average over bar closes.
pub struct MovingAverage {
    window: usize,
    values: VecDeque<Decimal>,
    sum: Decimal,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            values: VecDeque::new(),
            sum: Decimal::ZERO,
        }
    }

    /// Absorb one bar; returns the average once the window is full.
    pub fn update(&mut self, bar: &Bar) -> Option<Decimal> {
        self.values.push_back(bar.close);
        self.sum += bar.close;
        if self.values.len() > self.window {
            if let Some(evicted) = self.values.pop_front() {
                self.sum -= evicted;
            }
        }
        self.value()
    }

    /// The current average, if the window is full.
    pub fn value(&self) -> Option<Decimal> {
        if self.values.len() == self.window {
            Some(self.sum / Decimal::from(self.window as u64))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn bar(close: Decimal) -> Bar {
        Bar {
            period: Duration::from_secs(60),
            timestamp: 0,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
        }
    }

    #[test]
    fn warms_up_then_slides() {
        let mut ma = MovingAverage::new(3);
        assert_eq!(ma.update(&bar(dec!(10))), None);
        assert_eq!(ma.update(&bar(dec!(20))), None);
        assert_eq!(ma.update(&bar(dec!(30))), Some(dec!(20)));
        assert_eq!(ma.update(&bar(dec!(40))), Some(dec!(30)));
    }

    #[test]
    fn window_is_at_least_one() {
        let mut ma = MovingAverage::new(0);
        assert_eq!(ma.update(&bar(dec!(5))), Some(dec!(5)));
    }
}
