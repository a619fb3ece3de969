//! Executor-loop contract
//!
//! The router calls its executor once per idle cycle instead of blocking on
//! the queue. Each call performs one bounded step of work; an error return is
//! terminal for the whole bus.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;

/// A cooperative data-source driver.
///
/// `step` is invoked at most once per idle router cycle and must do a bounded
/// amount of work (typically: read one record, decide, post, return). A call
/// that needs to wait must observe `cancel` and return promptly once it
/// fires. Returning `Err` stops the router and becomes its terminal cause.
#[async_trait]
pub trait ExecutorLoop: Send {
    async fn step(&mut self, cancel: &watch::Receiver<bool>) -> Result<()>;
}

/// Plain closures are executors, which keeps simple drivers and tests terse.
#[async_trait]
impl<F> ExecutorLoop for F
where
    F: FnMut(&watch::Receiver<bool>) -> Result<()> + Send,
{
    async fn step(&mut self, cancel: &watch::Receiver<bool>) -> Result<()> {
        (self)(cancel)
    }
}

/// Executor for routers fed entirely by external producers.
///
/// Sleeps one interval per idle cycle so the loop does not spin, waking early
/// when cancellation fires.
pub struct Idle {
    interval: Duration,
}

impl Idle {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl ExecutorLoop for Idle {
    async fn step(&mut self, cancel: &watch::Receiver<bool>) -> Result<()> {
        let mut cancel = cancel.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.interval) => {}
            _ = cancel.changed() => {}
        }
        Ok(())
    }
}
