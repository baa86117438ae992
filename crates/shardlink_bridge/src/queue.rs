//! # Pending Item Queue
//!
//! The controller keeps a running list of every item it has received for
//! this receiver. The list only grows, and it may be replayed in full (on
//! reconnect, for example), so the queue remembers how far into it it has
//! read and never queues the same index twice.
//!
//! Items leave the queue one at a time, and only once the mailbox took
//! them.

use std::collections::VecDeque;

use tracing::{debug, warn};

use shardlink_core::{MailboxMessage, MailboxSender, RegisterRegion};

/// FIFO of items waiting for the mailbox.
#[derive(Debug, Default)]
pub struct ItemQueue {
    pending: VecDeque<MailboxMessage>,
    /// Prefix of the received-items list already queued.
    synced: usize,
    delivered: u64,
}

impl ItemQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catches up with the controller's received-items list.
    ///
    /// Queues the entries past the last synced index and returns how many
    /// were added. A list shorter than what was already synced is logged
    /// and ignored.
    pub fn sync_received(&mut self, received: &[MailboxMessage]) -> usize {
        if received.len() < self.synced {
            warn!(
                len = received.len(),
                synced = self.synced,
                "received-items list shrank, ignoring"
            );
            return 0;
        }
        let fresh = &received[self.synced..];
        self.pending.extend(fresh.iter().copied());
        self.synced = received.len();
        if !fresh.is_empty() {
            debug!(added = fresh.len(), pending = self.pending.len(), "items queued");
        }
        fresh.len()
    }

    /// Queues one item outside the received-items list.
    pub fn push(&mut self, message: MailboxMessage) {
        self.pending.push_back(message);
    }

    /// Tries to post the head of the queue.
    ///
    /// Returns the message handed to the mailbox, or `None` if the queue is
    /// empty or the slot is still occupied. A rejected item stays at the
    /// head.
    pub fn pump<R: RegisterRegion>(&mut self, sender: &MailboxSender<R>) -> Option<MailboxMessage> {
        let head = *self.pending.front()?;
        if !sender.try_send_message(head) {
            return None;
        }
        self.pending.pop_front();
        self.delivered += 1;
        debug!(
            item_id = head.item_id,
            sender_ref = head.sender_ref,
            pending = self.pending.len(),
            "item posted"
        );
        Some(head)
    }

    /// Items still waiting.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Next item to be posted.
    #[must_use]
    pub fn peek(&self) -> Option<&MailboxMessage> {
        self.pending.front()
    }

    /// Length of the received-items prefix already queued.
    #[must_use]
    pub fn synced(&self) -> usize {
        self.synced
    }

    /// Items handed to the mailbox so far.
    #[must_use]
    pub fn delivered_count(&self) -> u64 {
        self.delivered
    }

    /// True if nothing is waiting.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}
