//! # Receiver Runtime
//!
//! Hosts a [`PollLoop`] on its own thread and calls `poll_once` at a fixed
//! cadence:
//!
//! ```text
//! loop:
//! ┌──────────────────────────────────────────────┐
//! │ 1. shutdown set?  ──▶ stop, return stats     │
//! │ 2. lock, poll_once, unlock                   │
//! │ 3. sleep the rest of the tick                │
//! │    (overrun: warn, start next tick at once)  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The loop sits behind a `parking_lot::Mutex` so game logic on other
//! threads can mark milestones and read counters between ticks. The lock is
//! never held across the sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use shardlink_core::{
    DiagnosticSink, LinkConfig, LinkResult, PollLoop, PollOutcome, ReceiverState, RegisterDiagnostics,
    RegisterRegion,
};

/// Totals for one runtime thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Ticks run.
    pub ticks: u64,
    /// Messages drained.
    pub delivered: u64,
    /// Snapshots written to the mirror.
    pub published: u64,
    /// Ticks that ran past the interval.
    pub overruns: u64,
}

impl RuntimeStats {
    fn record(&mut self, outcome: &PollOutcome) {
        self.ticks += 1;
        if outcome.delivered.is_some() {
            self.delivered += 1;
        }
        if outcome.published.is_some() {
            self.published += 1;
        }
    }
}

/// Fixed-cadence driver for a receiver poll loop.
#[derive(Debug)]
pub struct ReceiverRuntime<R, D = RegisterDiagnostics> {
    poll: Arc<Mutex<PollLoop<R, D>>>,
    interval: Duration,
}

impl<R, D> Clone for ReceiverRuntime<R, D> {
    fn clone(&self) -> Self {
        Self {
            poll: Arc::clone(&self.poll),
            interval: self.interval,
        }
    }
}

impl<R: RegisterRegion> ReceiverRuntime<R, RegisterDiagnostics> {
    /// Builds the poll loop from `config` and uses its tick interval.
    ///
    /// The loop writes the heartbeat and last-item words every tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn from_config(region: R, config: &LinkConfig) -> LinkResult<Self> {
        let poll = PollLoop::from_config(region, config)?;
        Ok(Self::new(poll, config.tick_interval()))
    }
}

impl<R: RegisterRegion, D: DiagnosticSink> ReceiverRuntime<R, D> {
    /// Wraps `poll`, ticking every `interval`.
    #[must_use]
    pub fn new(poll: PollLoop<R, D>, interval: Duration) -> Self {
        Self {
            poll: Arc::new(Mutex::new(poll)),
            interval,
        }
    }

    /// Tick period.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one tick on the calling thread.
    pub fn tick(&self) -> PollOutcome {
        self.poll.lock().poll_once()
    }

    /// Game-logic trigger: records milestone `index` as reached.
    pub fn mark_reached(&self, index: usize) -> bool {
        self.poll.lock().mark_reached(index)
    }

    /// Runs `f` against the receiver state between ticks.
    pub fn with_state<T>(&self, f: impl FnOnce(&mut ReceiverState) -> T) -> T {
        f(self.poll.lock().state_mut())
    }

    /// Runs `f` against the whole poll loop between ticks.
    pub fn with_poll<T>(&self, f: impl FnOnce(&mut PollLoop<R, D>) -> T) -> T {
        f(&mut *self.poll.lock())
    }

    /// Ticks on the calling thread until `shutdown` is set.
    pub fn run(&self, shutdown: &AtomicBool) -> RuntimeStats {
        let mut stats = RuntimeStats::default();
        info!(interval = ?self.interval, "receiver runtime started");

        while !shutdown.load(Ordering::Acquire) {
            let start = Instant::now();
            let outcome = self.tick();
            stats.record(&outcome);

            let elapsed = start.elapsed();
            if let Some(remaining) = self.interval.checked_sub(elapsed) {
                thread::sleep(remaining);
            } else {
                stats.overruns += 1;
                warn!(?elapsed, interval = ?self.interval, "receiver tick overran");
            }
        }

        info!(
            ticks = stats.ticks,
            delivered = stats.delivered,
            published = stats.published,
            overruns = stats.overruns,
            "receiver runtime stopped"
        );
        stats
    }
}

impl<R, D> ReceiverRuntime<R, D>
where
    R: RegisterRegion + Send + 'static,
    D: DiagnosticSink + Send + 'static,
{
    /// Starts [`Self::run`] on a named thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(&self, shutdown: Arc<AtomicBool>) -> std::io::Result<JoinHandle<RuntimeStats>> {
        let runtime = self.clone();
        debug!("spawning receiver thread");
        thread::Builder::new()
            .name("shardlink-receiver".to_string())
            .spawn(move || runtime.run(&shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardlink_core::{MailboxSender, SharedRegisterBlock};

    #[test]
    fn test_manual_tick_drains_mailbox() {
        let config = LinkConfig::default();
        let block = SharedRegisterBlock::shared();
        let runtime = ReceiverRuntime::from_config(Arc::clone(&block), &config).unwrap();
        assert_eq!(runtime.interval(), Duration::from_millis(16));

        let tx = MailboxSender::new(&*block);
        assert!(tx.try_send(config.milestone_item_id(5).unwrap(), 0));
        let outcome = runtime.tick();
        assert!(outcome.delivered.is_some());
        assert!(runtime.with_state(|state| state.progress.is_reached(5)));
        assert!(block.progress_mirror().contains(5));
    }

    #[test]
    fn test_spawned_runtime_publishes_game_logic_marks() {
        let config = LinkConfig::default().with_tick_interval_ms(1);
        let block = SharedRegisterBlock::shared();
        let runtime = ReceiverRuntime::from_config(Arc::clone(&block), &config).unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = runtime.spawn(Arc::clone(&shutdown)).unwrap();

        assert!(runtime.mark_reached(2));
        while !block.progress_mirror().contains(2) {
            thread::yield_now();
        }
        shutdown.store(true, Ordering::Release);

        let stats = handle.join().unwrap();
        assert!(stats.ticks >= 1);
        assert_eq!(u64::from(block.snapshot().diag_heartbeat), stats.ticks);
        assert!(stats.published >= 1);
        assert_eq!(stats.delivered, 0);
    }

    #[test]
    fn test_with_poll_reaches_counters() {
        let block = SharedRegisterBlock::new();
        let runtime = ReceiverRuntime::from_config(&block, &LinkConfig::default()).unwrap();
        let ticks = runtime.with_poll(|poll| {
            poll.poll_once();
            poll.ticks()
        });
        assert_eq!(ticks, 1);
        assert_eq!(block.snapshot().diag_heartbeat, 1);
        let lives = runtime.with_state(|state| state.counters.find("extra_lives"));
        assert!(lives.is_some());
    }
}
