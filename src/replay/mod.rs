//! Tick recordings and replay
//!
//! A recording is a flat sequence of fixed-size little-endian records
//! `(timestamp i64-ns, bid f64, ask f64, bid_volume f64, ask_volume f64)`.
//! The file is memory-mapped and addressed by record index; a trailing
//! partial record counts as end of stream.

use crate::error::{Result, RuntimeError};
use crate::events::Event;
use crate::router::{ExecutorLoop, RouterHandle};
use crate::types::{Tick, UnixNanos};
use async_trait::async_trait;
use memmap2::Mmap;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::fs::File;
use std::path::Path;
use tokio::sync::watch;

/// Size of one on-disk tick record in bytes.
pub const RECORD_SIZE: usize = 40;

fn read_i64(bytes: &[u8], offset: usize) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    i64::from_le_bytes(buf)
}

fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_le_bytes(buf)
}

/// Encode one tick as an on-disk record.
pub fn encode(tick: &Tick) -> [u8; RECORD_SIZE] {
    fn put(buf: &mut [u8; RECORD_SIZE], offset: usize, value: Decimal) {
        let raw = value.to_f64().unwrap_or(0.0);
        buf[offset..offset + 8].copy_from_slice(&raw.to_le_bytes());
    }

    let mut buf = [0u8; RECORD_SIZE];
    buf[0..8].copy_from_slice(&tick.timestamp.to_le_bytes());
    put(&mut buf, 8, tick.bid);
    put(&mut buf, 16, tick.ask);
    put(&mut buf, 24, tick.bid_volume);
    put(&mut buf, 32, tick.ask_volume);
    buf
}

/// A memory-mapped tick recording with indexed access.
pub struct TickFile {
    map: Mmap,
    records: usize,
}

impl TickFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: mapped read-only; recordings are immutable once written.
        let map = unsafe { Mmap::map(&file)? };
        let records = map.len() / RECORD_SIZE;
        Ok(Self { map, records })
    }

    /// Number of whole records in the file.
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Decode the record at `index`.
    ///
    /// Past-the-end indices report `EndOfStream`; non-finite prices or
    /// volumes report `MalformedRecord`.
    pub fn record(&self, index: usize) -> Result<Tick> {
        if index >= self.records {
            return Err(RuntimeError::EndOfStream);
        }
        let base = index * RECORD_SIZE;
        let bytes = &self.map[base..base + RECORD_SIZE];
        let decimal = |value: f64| {
            Decimal::from_f64(value).ok_or(RuntimeError::MalformedRecord(index))
        };
        Ok(Tick {
            timestamp: read_i64(bytes, 0),
            bid: decimal(read_f64(bytes, 8))?,
            ask: decimal(read_f64(bytes, 16))?,
            bid_volume: decimal(read_f64(bytes, 24))?,
            ask_volume: decimal(read_f64(bytes, 32))?,
        })
    }
}

/// Pumps a tick recording into a router, one record per idle cycle.
///
/// Records before the configured start are skipped; the first record past
/// the configured end, or the end of the file, terminates the bus with
/// `EndOfStream` (a clean shutdown for consumers of the done signal). Ticks
/// are delivered through `post`, so bars and other derived events re-posted
/// by handlers can never overtake the ticks that caused them.
pub struct ReplayExecutor {
    file: TickFile,
    handle: RouterHandle,
    cursor: usize,
    start: UnixNanos,
    end: UnixNanos,
}

impl ReplayExecutor {
    pub fn new(file: TickFile, handle: RouterHandle) -> Self {
        Self {
            file,
            handle,
            cursor: 0,
            start: UnixNanos::MIN,
            end: UnixNanos::MAX,
        }
    }

    /// Skip records with timestamps below `start`.
    pub fn with_start(mut self, start: UnixNanos) -> Self {
        self.start = start;
        self
    }

    /// Stop at the first record with a timestamp above `end`.
    pub fn with_end(mut self, end: UnixNanos) -> Self {
        self.end = end;
        self
    }
}

#[async_trait]
impl ExecutorLoop for ReplayExecutor {
    async fn step(&mut self, _cancel: &watch::Receiver<bool>) -> Result<()> {
        if self.cursor >= self.file.len() {
            return Err(RuntimeError::EndOfStream);
        }
        let tick = self.file.record(self.cursor)?;
        if tick.timestamp < self.start {
            self.cursor += 1;
            return Ok(());
        }
        if tick.timestamp > self.end {
            return Err(RuntimeError::EndOfStream);
        }
        match self.handle.post(Event::Tick(tick)) {
            Ok(()) => {
                self.cursor += 1;
                Ok(())
            }
            // Queue has no room this cycle; the record retries next time.
            Err(RuntimeError::QueueFull) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, HandlerFn};
    use crate::router::Router;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use std::sync::Arc;

    fn tick(timestamp: UnixNanos, price: Decimal) -> Tick {
        Tick {
            timestamp,
            bid: price,
            ask: price,
            bid_volume: dec!(1),
            ask_volume: dec!(1),
        }
    }

    fn write_recording(ticks: &[Tick], trailing: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for t in ticks {
            file.write_all(&encode(t)).unwrap();
        }
        file.write_all(trailing).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn encode_decode_round_trip() {
        let ticks = vec![tick(1_000, dec!(1.5)), tick(2_000, dec!(2.25))];
        let file = write_recording(&ticks, &[]);

        let recording = TickFile::open(file.path()).unwrap();
        assert_eq!(recording.len(), 2);
        assert_eq!(recording.record(0).unwrap(), ticks[0]);
        assert_eq!(recording.record(1).unwrap(), ticks[1]);
        assert_eq!(recording.record(2), Err(RuntimeError::EndOfStream));
    }

    #[test]
    fn trailing_partial_record_is_end_of_stream() {
        let file = write_recording(&[tick(1, dec!(1))], &[0xAB; 17]);
        let recording = TickFile::open(file.path()).unwrap();
        assert_eq!(recording.len(), 1);
        assert_eq!(recording.record(1), Err(RuntimeError::EndOfStream));
    }

    #[test]
    fn non_finite_price_is_malformed() {
        let mut bytes = encode(&tick(1, dec!(1)));
        bytes[8..16].copy_from_slice(&f64::NAN.to_le_bytes());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let recording = TickFile::open(file.path()).unwrap();
        assert_eq!(recording.record(0), Err(RuntimeError::MalformedRecord(0)));
    }

    #[tokio::test]
    async fn replay_respects_bounds_and_terminates_cleanly() {
        let ticks = vec![
            tick(100, dec!(1)),
            tick(200, dec!(2)),
            tick(300, dec!(3)),
            tick(400, dec!(4)),
        ];
        let file = write_recording(&ticks, &[]);

        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let mut router = Router::new(16);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        router
            .install(
                EventKind::Tick,
                HandlerFn::tick(move |t| {
                    sink.lock().push(t.timestamp);
                    Ok(())
                }),
            )
            .unwrap();

        let handle = router.handle();
        let executor = ReplayExecutor::new(TickFile::open(file.path()).unwrap(), handle.clone())
            .with_start(200)
            .with_end(300);

        let cause = router.run(cancel_rx, executor).await;
        assert_eq!(cause, RuntimeError::EndOfStream);
        assert_eq!(*seen.lock(), vec![200, 300]);
        assert_eq!(handle.terminal(), Some(RuntimeError::EndOfStream));
    }

    #[tokio::test]
    async fn replay_of_exhausted_file_ends_immediately() {
        // Shorter than one record: zero whole records.
        let file = write_recording(&[], &[0u8; 10]);
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let router = Router::new(4);
        let handle = router.handle();
        let executor = ReplayExecutor::new(TickFile::open(file.path()).unwrap(), handle.clone());

        let cause = router.run(cancel_rx, executor).await;
        assert_eq!(cause, RuntimeError::EndOfStream);
        assert_eq!(handle.stats().dispatched, 0);
        assert_eq!(handle.stats().loop_cycles, 1);
    }
}
