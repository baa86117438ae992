//! # Poll Loop
//!
//! The receiver's entry point, called once per tick by whatever runtime
//! hosts it. Each call:
//!
//! 1. drains at most one mailbox message and applies its effect,
//! 2. publishes the progress snapshot into the mirror if it changed,
//! 3. returns. Nothing blocks, nothing is retried within the tick.
//!
//! The loop owns no thread and no timer. Cadence belongs to the caller.

use tracing::debug;

use crate::config::LinkConfig;
use crate::diagnostics::{DiagnosticSink, RegisterDiagnostics};
use crate::effects::{ApplyOutcome, ItemEffectApplier};
use crate::error::LinkResult;
use crate::layout::RegisterRegion;
use crate::mailbox::{MailboxMessage, MailboxReceiver};
use crate::progress::ProgressMask;
use crate::state::ReceiverState;

/// A message drained during a tick and what applying it did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// The drained message.
    pub message: MailboxMessage,
    /// Result of applying its item.
    pub outcome: ApplyOutcome,
}

/// Everything observable that happened during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Message consumed this tick, if any.
    pub delivered: Option<Delivery>,
    /// Snapshot written to the mirror this tick, if any.
    pub published: Option<ProgressMask>,
}

impl PollOutcome {
    /// True if the tick neither drained nor published anything.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.delivered.is_none() && self.published.is_none()
    }
}

/// Receiver-side tick driver.
///
/// Game logic running on the same thread (or serialized with the loop)
/// reaches the state through [`Self::state_mut`] or [`Self::mark_reached`]
/// between ticks.
///
/// Loops start with [`RegisterDiagnostics`], so the heartbeat and last-item
/// words advance on every tick. Pass [`crate::NoDiagnostics`] to
/// [`Self::with_diagnostics`] to leave them untouched.
#[derive(Debug)]
pub struct PollLoop<R, D = RegisterDiagnostics> {
    mailbox: MailboxReceiver<R>,
    applier: ItemEffectApplier,
    state: ReceiverState,
    diagnostics: D,
    last_published: Option<ProgressMask>,
    ticks: u32,
}

impl<R: RegisterRegion> PollLoop<R, RegisterDiagnostics> {
    /// Creates a loop over `region` that writes diagnostics into it.
    #[must_use]
    pub fn new(region: R, applier: ItemEffectApplier, state: ReceiverState) -> Self {
        Self {
            mailbox: MailboxReceiver::new(region),
            applier,
            state,
            diagnostics: RegisterDiagnostics,
            last_published: None,
            ticks: 0,
        }
    }

    /// Creates a loop from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn from_config(region: R, config: &LinkConfig) -> LinkResult<Self> {
        let (applier, state) = config.build_receiver()?;
        Ok(Self::new(region, applier, state))
    }
}

impl<R: RegisterRegion, D: DiagnosticSink> PollLoop<R, D> {
    /// Replaces the diagnostic sink.
    #[must_use]
    pub fn with_diagnostics<D2: DiagnosticSink>(self, diagnostics: D2) -> PollLoop<R, D2> {
        PollLoop {
            mailbox: self.mailbox,
            applier: self.applier,
            state: self.state,
            diagnostics,
            last_published: self.last_published,
            ticks: self.ticks,
        }
    }

    /// Runs one tick.
    pub fn poll_once(&mut self) -> PollOutcome {
        self.ticks = self.ticks.wrapping_add(1);
        self.diagnostics.heartbeat(self.mailbox.region().block(), self.ticks);

        let delivered = if let Some(message) = self.mailbox.try_receive() {
            self.diagnostics.delivered(self.mailbox.region().block(), &message);
            let outcome = self.applier.apply(message.item_id, &mut self.state);
            debug!(
                item_id = message.item_id,
                sender_ref = message.sender_ref,
                ?outcome,
                "mailbox drained"
            );
            Some(Delivery { message, outcome })
        } else {
            None
        };

        let published = self.publish();
        PollOutcome { delivered, published }
    }

    /// Mirrors the current progress snapshot if it changed since the last
    /// publish. Returns the snapshot written, or `None` if nothing changed.
    ///
    /// Called by [`Self::poll_once`]; game logic may also call it right
    /// after marking a milestone instead of waiting for the next tick.
    pub fn publish(&mut self) -> Option<ProgressMask> {
        let snapshot = self.state.progress.snapshot();
        if self.last_published == Some(snapshot) {
            return None;
        }
        let mirror = self.mailbox.region().block().merge_progress(snapshot.bits());
        self.last_published = Some(snapshot);
        debug!(bits = snapshot.bits(), mirror, "progress published");
        Some(snapshot)
    }

    /// Game-logic trigger: records milestone `index` as reached.
    ///
    /// The mirror picks it up on the next [`Self::publish`] or tick.
    pub fn mark_reached(&mut self, index: usize) -> bool {
        self.state.progress.mark_reached(index)
    }

    /// Receiver state.
    #[must_use]
    pub fn state(&self) -> &ReceiverState {
        &self.state
    }

    /// Mutable receiver state for game logic.
    pub fn state_mut(&mut self) -> &mut ReceiverState {
        &mut self.state
    }

    /// The item dispatcher.
    #[must_use]
    pub fn applier(&self) -> &ItemEffectApplier {
        &self.applier
    }

    /// The diagnostic sink.
    #[must_use]
    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    /// Region the loop reads and publishes to.
    #[must_use]
    pub fn region(&self) -> &R {
        self.mailbox.region()
    }

    /// Ticks run so far (wrapping).
    #[must_use]
    pub fn ticks(&self) -> u32 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NoDiagnostics;
    use crate::layout::{Register, SharedRegisterBlock};
    use crate::mailbox::MailboxSender;

    const BASE: u32 = 3_860_000;

    fn config() -> LinkConfig {
        LinkConfig::default()
    }

    #[test]
    fn test_idle_tick_publishes_once() {
        let block = SharedRegisterBlock::new();
        let mut poll = PollLoop::from_config(&block, &config()).unwrap();

        // First tick publishes the (empty) initial snapshot.
        let first = poll.poll_once();
        assert_eq!(first.published, Some(ProgressMask::EMPTY));
        assert!(first.delivered.is_none());

        let second = poll.poll_once();
        assert!(second.is_idle());
        assert_eq!(poll.ticks(), 2);
    }

    #[test]
    fn test_scenario_milestone_delivery() {
        let block = SharedRegisterBlock::new();
        let tx = MailboxSender::new(&block);
        let mut poll = PollLoop::from_config(&block, &config()).unwrap();
        poll.poll_once();

        assert!(!poll.state().progress.is_reached(3));
        assert!(tx.try_send(BASE + 1 + 3, 1));

        let outcome = poll.poll_once();
        let delivery = outcome.delivered.unwrap();
        assert_eq!(delivery.message, MailboxMessage::new(BASE + 4, 1));
        assert_eq!(delivery.outcome, ApplyOutcome::MilestoneReached(3));
        assert_eq!(outcome.published, Some(ProgressMask::from_bits(0b1000)));

        assert!(poll.state().progress.is_reached(3));
        assert!(block.progress_mirror().contains(3));
        assert_eq!(block.read(Register::MailboxFull), 0);
    }

    #[test]
    fn test_scenario_full_slot_send() {
        let block = SharedRegisterBlock::new();
        let tx = MailboxSender::new(&block);
        let mut poll = PollLoop::from_config(&block, &config()).unwrap();

        assert!(tx.try_send(BASE + 1, 0));
        assert!(!tx.try_send(BASE + 2, 0));

        let outcome = poll.poll_once();
        assert_eq!(outcome.delivered.unwrap().outcome, ApplyOutcome::MilestoneReached(0));
        assert!(!poll.state().progress.is_reached(1));

        let outcome = poll.poll_once();
        assert!(outcome.delivered.is_none());
        assert_eq!(poll.state().progress.snapshot().bits(), 0b1);
    }

    #[test]
    fn test_game_logic_trigger_is_mirrored() {
        let block = SharedRegisterBlock::new();
        let mut poll = PollLoop::from_config(&block, &config()).unwrap();
        poll.poll_once();

        assert!(poll.mark_reached(6));
        // Not visible until published.
        assert!(!block.progress_mirror().contains(6));
        assert_eq!(poll.publish(), Some(ProgressMask::from_bits(1 << 6)));
        assert!(block.progress_mirror().contains(6));
        assert_eq!(poll.publish(), None);
    }

    #[test]
    fn test_mirror_never_ahead_of_tracker() {
        let block = SharedRegisterBlock::new();
        let tx = MailboxSender::new(&block);
        let mut poll = PollLoop::from_config(&block, &config()).unwrap();

        for bit in [2u32, 5, 2, 7] {
            assert!(tx.try_send(BASE + 1 + bit, 0));
            poll.poll_once();
            let mirror = block.progress_mirror();
            let tracker = poll.state().progress.snapshot();
            assert!(mirror.newly_set_since(tracker).is_empty());
        }
    }

    #[test]
    fn test_register_diagnostics_track_ticks_and_items() {
        let block = SharedRegisterBlock::new();
        let tx = MailboxSender::new(&block);
        let mut poll = PollLoop::from_config(&block, &config()).unwrap();

        poll.poll_once();
        assert!(tx.try_send(999_999, 4));
        let outcome = poll.poll_once();
        assert_eq!(outcome.delivered.unwrap().outcome, ApplyOutcome::Ignored);

        let snap = block.snapshot();
        assert_eq!(snap.diag_heartbeat, 2);
        assert_eq!(snap.diag_last_item_id, 999_999);
        assert_eq!(snap.diag_last_sender_ref, 4);
        assert_eq!(snap.mailbox_full, 0);
        assert_eq!(snap.progress_mirror, 0);
    }

    #[test]
    fn test_default_loop_advances_heartbeat_every_tick() {
        let block = SharedRegisterBlock::new();
        let tx = MailboxSender::new(&block);
        let mut poll = PollLoop::from_config(&block, &config()).unwrap();

        assert!(tx.try_send(BASE + 2, 11));
        for _ in 0..3 {
            poll.poll_once();
        }

        let snap = block.snapshot();
        assert_eq!(snap.diag_heartbeat, 3);
        assert_eq!(snap.diag_last_item_id, BASE + 2);
        assert_eq!(snap.diag_last_sender_ref, 11);
    }

    #[test]
    fn test_no_diagnostics_opt_out_keeps_diag_words_zero() {
        let block = SharedRegisterBlock::new();
        let tx = MailboxSender::new(&block);
        let mut poll = PollLoop::from_config(&block, &config())
            .unwrap()
            .with_diagnostics(NoDiagnostics);

        assert!(tx.try_send(BASE + 2, 11));
        poll.poll_once();
        poll.poll_once();

        assert!(poll.state().progress.is_reached(1));
        let snap = block.snapshot();
        assert_eq!(snap.diag_heartbeat, 0);
        assert_eq!(snap.diag_last_item_id, 0);
        assert_eq!(snap.diag_last_sender_ref, 0);
    }
}
