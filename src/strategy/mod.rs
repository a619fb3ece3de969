//! Strategy and tooling handlers
//!
//! Terminal consumers wired onto the bus: the bar aggregator (which also
//! re-publishes derived bar events), the position book, and bar-derived
//! indicators.

mod bars;
mod indicators;
mod positions;

pub use bars::BarAggregator;
pub use indicators::MovingAverage;
pub use positions::PositionBook;
