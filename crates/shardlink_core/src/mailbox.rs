//! # Single-Slot Mailbox
//!
//! A half-duplex handshake over three words of the register block. The
//! `mailbox_full` flag is the only synchronization between the two sides.
//!
//! ```text
//!            sender                                  receiver
//!   ┌───────────────────────┐               ┌───────────────────────┐
//!   │ full == 0 ?  (acquire)│               │ full == 1 ?  (acquire)│
//!   │ write item_id         │               │ read item_id          │
//!   │ write sender_ref      │   ───────▶    │ read sender_ref       │
//!   │ full = 1     (release)│   ◀───────    │ full = 0     (release)│
//!   └───────────────────────┘               └───────────────────────┘
//! ```
//!
//! The flag store is always the last effect on each side, so the receiver
//! never sees a half-written message and the sender never overwrites one
//! still being read.
//!
//! Only one [`MailboxSender`] and one [`MailboxReceiver`] may be attached to
//! a block. This is a single-producer, single-consumer slot, not a ring.

use std::sync::atomic::Ordering;

use crate::layout::{Register, RegisterRegion};

/// Flag value for an empty slot.
pub const SLOT_EMPTY: u32 = 0;

/// Flag value for a slot holding an undrained message.
pub const SLOT_FULL: u32 = 1;

/// One item in flight from sender to receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MailboxMessage {
    /// Opaque item identifier.
    pub item_id: u32,
    /// Informational origin tag.
    pub sender_ref: u32,
}

impl MailboxMessage {
    /// Creates a message.
    #[inline]
    #[must_use]
    pub const fn new(item_id: u32, sender_ref: u32) -> Self {
        Self { item_id, sender_ref }
    }
}

/// Producer end of the mailbox.
#[derive(Debug)]
pub struct MailboxSender<R> {
    region: R,
}

impl<R: RegisterRegion> MailboxSender<R> {
    /// Attaches a sender to `region`.
    #[must_use]
    pub fn new(region: R) -> Self {
        Self { region }
    }

    /// The region this endpoint writes to.
    #[must_use]
    pub fn region(&self) -> &R {
        &self.region
    }

    /// True while a message is waiting to be drained.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.region.block().load(Register::MailboxFull, Ordering::Acquire) != SLOT_EMPTY
    }

    /// Posts one message if the slot is empty.
    ///
    /// Returns `false` without touching the block if a message is still
    /// pending. The caller retries on a later tick.
    #[must_use]
    pub fn try_send(&self, item_id: u32, sender_ref: u32) -> bool {
        let block = self.region.block();
        if block.load(Register::MailboxFull, Ordering::Acquire) != SLOT_EMPTY {
            return false;
        }
        block.store(Register::MailboxItemId, item_id, Ordering::Relaxed);
        block.store(Register::MailboxSenderRef, sender_ref, Ordering::Relaxed);
        block.store(Register::MailboxFull, SLOT_FULL, Ordering::Release);
        true
    }

    /// [`Self::try_send`] for a prepared message.
    #[inline]
    #[must_use]
    pub fn try_send_message(&self, message: MailboxMessage) -> bool {
        self.try_send(message.item_id, message.sender_ref)
    }
}

/// Consumer end of the mailbox.
#[derive(Debug)]
pub struct MailboxReceiver<R> {
    region: R,
}

impl<R: RegisterRegion> MailboxReceiver<R> {
    /// Attaches a receiver to `region`.
    #[must_use]
    pub fn new(region: R) -> Self {
        Self { region }
    }

    /// The region this endpoint reads from.
    #[must_use]
    pub fn region(&self) -> &R {
        &self.region
    }

    /// True while a message is waiting to be drained.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.region.block().load(Register::MailboxFull, Ordering::Acquire) == SLOT_FULL
    }

    /// Drains the pending message, if any.
    ///
    /// At most one message per call. The flag is cleared only after both
    /// payload words have been read.
    #[must_use]
    pub fn try_receive(&self) -> Option<MailboxMessage> {
        let block = self.region.block();
        if block.load(Register::MailboxFull, Ordering::Acquire) != SLOT_FULL {
            return None;
        }
        let item_id = block.load(Register::MailboxItemId, Ordering::Relaxed);
        let sender_ref = block.load(Register::MailboxSenderRef, Ordering::Relaxed);
        block.store(Register::MailboxFull, SLOT_EMPTY, Ordering::Release);
        Some(MailboxMessage { item_id, sender_ref })
    }
}
