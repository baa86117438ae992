//! # Sender Bridge
//!
//! One bridge tick mirrors one receiver tick from the other side of the
//! block:
//!
//! ```text
//!  tick()
//!    ├─ pump the head of the item queue into the mailbox (if empty)
//!    └─ read the register block
//!         ├─ progress mirror ──▶ ProgressWatcher ──▶ LocationCheck*
//!         └─ heartbeat      ──▶ BridgeReport
//! ```
//!
//! [`BridgeDriver`] runs ticks on a fixed interval and talks to the
//! controller over crossbeam channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, info};

use shardlink_core::{LinkConfig, MailboxMessage, MailboxSender, RegisterRegion};

use crate::error::{BridgeError, BridgeResult};
use crate::queue::ItemQueue;
use crate::watcher::{LocationCheck, LocationMap, ProgressWatcher};

/// What one bridge tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BridgeReport {
    /// Item posted to the mailbox this tick.
    pub delivered: Option<MailboxMessage>,
    /// Milestones newly seen in the mirror.
    pub checks: Vec<LocationCheck>,
    /// Receiver heartbeat read this tick.
    pub heartbeat: u32,
}

/// Sender-side collaborator: item queue plus progress watcher.
#[derive(Debug)]
pub struct Bridge<R> {
    sender: MailboxSender<R>,
    queue: ItemQueue,
    watcher: ProgressWatcher,
}

impl<R: RegisterRegion> Bridge<R> {
    /// Attaches a bridge to `region`.
    #[must_use]
    pub fn new(region: R, locations: LocationMap) -> Self {
        Self {
            sender: MailboxSender::new(region),
            queue: ItemQueue::new(),
            watcher: ProgressWatcher::new(locations),
        }
    }

    /// Attaches a bridge with locations derived from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the location map cannot be built.
    pub fn from_config(region: R, config: &LinkConfig) -> BridgeResult<Self> {
        Ok(Self::new(region, LocationMap::from_config(config)?))
    }

    /// Runs one tick: delivery first, then progress observation.
    pub fn tick(&mut self) -> BridgeReport {
        let delivered = self.queue.pump(&self.sender);
        let snapshot = self.sender.region().block().snapshot();
        let checks = self.watcher.observe(snapshot.progress());
        BridgeReport {
            delivered,
            checks,
            heartbeat: snapshot.diag_heartbeat,
        }
    }

    /// Pending items.
    #[must_use]
    pub fn queue(&self) -> &ItemQueue {
        &self.queue
    }

    /// Pending items, for feeding.
    pub fn queue_mut(&mut self) -> &mut ItemQueue {
        &mut self.queue
    }

    /// The progress watcher.
    #[must_use]
    pub fn watcher(&self) -> &ProgressWatcher {
        &self.watcher
    }

    /// The mailbox endpoint.
    #[must_use]
    pub fn sender(&self) -> &MailboxSender<R> {
        &self.sender
    }
}

/// Totals for one driver run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeSummary {
    /// Ticks run.
    pub ticks: u64,
    /// Items posted to the mailbox.
    pub delivered: u64,
    /// Location checks emitted.
    pub checks: u64,
    /// Last receiver heartbeat seen.
    pub last_heartbeat: u32,
}

/// Runs a [`Bridge`] at a fixed cadence until told to stop.
#[derive(Debug)]
pub struct BridgeDriver<R> {
    bridge: Bridge<R>,
    interval: Duration,
}

impl<R: RegisterRegion> BridgeDriver<R> {
    /// Wraps `bridge`, ticking every `interval`.
    #[must_use]
    pub fn new(bridge: Bridge<R>, interval: Duration) -> Self {
        Self { bridge, interval }
    }

    /// Ticks until `shutdown` is set.
    ///
    /// Each tick first moves everything waiting on `items` into the queue,
    /// then runs [`Bridge::tick`] and forwards its checks to `checks`. A
    /// closed `items` channel is not an error: the bridge keeps draining its
    /// queue and watching progress.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Disconnected`] if `checks` has no receiver.
    pub fn run(
        mut self,
        items: &Receiver<MailboxMessage>,
        checks: &Sender<LocationCheck>,
        shutdown: &AtomicBool,
    ) -> BridgeResult<(Bridge<R>, BridgeSummary)> {
        let ticker = crossbeam_channel::tick(self.interval);
        let mut summary = BridgeSummary::default();
        let mut items_open = true;

        info!(interval = ?self.interval, "bridge driver started");
        while !shutdown.load(Ordering::Acquire) {
            ticker
                .recv()
                .map_err(|_| BridgeError::Disconnected("ticker"))?;

            while items_open {
                match items.try_recv() {
                    Ok(message) => self.bridge.queue_mut().push(message),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        debug!("item channel closed");
                        items_open = false;
                    }
                }
            }

            let report = self.bridge.tick();
            summary.ticks += 1;
            summary.last_heartbeat = report.heartbeat;
            if report.delivered.is_some() {
                summary.delivered += 1;
            }
            for check in report.checks {
                checks
                    .send(check)
                    .map_err(|_| BridgeError::Disconnected("location check"))?;
                summary.checks += 1;
            }
        }

        info!(
            ticks = summary.ticks,
            delivered = summary.delivered,
            checks = summary.checks,
            "bridge driver stopped"
        );
        Ok((self.bridge, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardlink_core::{PollLoop, ProgressMask, SharedRegisterBlock};
    use std::sync::Arc;

    const BASE: u32 = 3_860_000;

    #[test]
    fn test_tick_delivers_then_observes() {
        let config = LinkConfig::default();
        let block = SharedRegisterBlock::new();
        let mut bridge = Bridge::from_config(&block, &config).unwrap();
        let mut receiver = PollLoop::from_config(&block, &config).unwrap();

        bridge
            .queue_mut()
            .sync_received(&[MailboxMessage::new(BASE + 3, 0), MailboxMessage::new(BASE + 5, 1)]);

        // Baseline taken before anything was reached.
        let report = bridge.tick();
        assert_eq!(report.delivered, Some(MailboxMessage::new(BASE + 3, 0)));
        assert!(report.checks.is_empty());

        receiver.poll_once();
        let report = bridge.tick();
        assert_eq!(report.delivered, Some(MailboxMessage::new(BASE + 5, 1)));
        assert_eq!(
            report.checks,
            vec![LocationCheck {
                bit: 2,
                location_id: BASE + 100_002
            }]
        );
        assert_eq!(report.heartbeat, 1);

        receiver.poll_once();
        let report = bridge.tick();
        assert!(report.delivered.is_none());
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.checks[0].bit, 4);
        assert_eq!(report.heartbeat, 2);
        assert!(bridge.queue().is_idle());
        assert_eq!(
            bridge.watcher().checked(),
            Some(ProgressMask::from_bits(0b1_0100))
        );
    }

    #[test]
    fn test_driver_stops_on_shutdown() {
        let block = SharedRegisterBlock::shared();
        let bridge = Bridge::from_config(Arc::clone(&block), &LinkConfig::default()).unwrap();
        let driver = BridgeDriver::new(bridge, Duration::from_millis(1));

        let (item_tx, item_rx) = crossbeam_channel::unbounded();
        let (check_tx, _check_rx) = crossbeam_channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        item_tx.send(MailboxMessage::new(BASE + 1, 7)).unwrap();
        drop(item_tx);

        let stop = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || driver.run(&item_rx, &check_tx, &stop));
        while block.snapshot().mailbox_full == 0 {
            std::thread::yield_now();
        }
        shutdown.store(true, Ordering::Release);

        let (bridge, summary) = handle.join().unwrap().unwrap();
        assert_eq!(summary.delivered, 1);
        assert!(bridge.queue().is_idle());
        assert_eq!(block.snapshot().mailbox_item_id, BASE + 1);
    }

    #[test]
    fn test_driver_reports_dropped_check_receiver() {
        let block = SharedRegisterBlock::new();
        let config = LinkConfig::default();
        let mut bridge = Bridge::from_config(&block, &config).unwrap();
        let mut receiver = PollLoop::from_config(&block, &config).unwrap();
        receiver.mark_reached(0);

        let (_item_tx, item_rx) = crossbeam_channel::unbounded();
        let (check_tx, check_rx) = crossbeam_channel::unbounded();
        drop(check_rx);

        // Baseline is empty; the mark only lands in the mirror afterwards.
        bridge.tick();
        receiver.publish();

        let shutdown = AtomicBool::new(false);
        let result = BridgeDriver::new(bridge, Duration::from_millis(1)).run(
            &item_rx,
            &check_tx,
            &shutdown,
        );
        assert!(matches!(result, Err(BridgeError::Disconnected(_))));
    }
}
