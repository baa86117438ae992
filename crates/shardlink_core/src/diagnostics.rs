//! # Diagnostic Sink
//!
//! Advisory observability for the poll loop. Nothing in the protocol reads
//! these values back; they exist so a sender (or a human with a memory
//! viewer) can tell the receiver is alive and what it last consumed.

use std::sync::atomic::Ordering;

use crate::layout::{Register, SharedRegisterBlock};
use crate::mailbox::MailboxMessage;

/// Receives per-tick diagnostics from [`crate::PollLoop`].
///
/// Each call gets the block the loop polls, so a sink that writes the
/// `diag_*` words needs no region of its own.
pub trait DiagnosticSink {
    /// Called once at the start of every tick with the running tick count.
    fn heartbeat(&mut self, block: &SharedRegisterBlock, tick: u32);

    /// Called after a message has been drained from the mailbox.
    fn delivered(&mut self, block: &SharedRegisterBlock, message: &MailboxMessage);
}

/// Discards all diagnostics. The `diag_*` words stay as they are.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDiagnostics;

impl DiagnosticSink for NoDiagnostics {
    #[inline]
    fn heartbeat(&mut self, _block: &SharedRegisterBlock, _tick: u32) {}

    #[inline]
    fn delivered(&mut self, _block: &SharedRegisterBlock, _message: &MailboxMessage) {}
}

/// Writes diagnostics into the `diag_*` words of the polled block.
///
/// The default sink of [`crate::PollLoop`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RegisterDiagnostics;

impl DiagnosticSink for RegisterDiagnostics {
    #[inline]
    fn heartbeat(&mut self, block: &SharedRegisterBlock, tick: u32) {
        block.store(Register::DiagHeartbeat, tick, Ordering::Relaxed);
    }

    fn delivered(&mut self, block: &SharedRegisterBlock, message: &MailboxMessage) {
        block.store(Register::DiagLastItemId, message.item_id, Ordering::Relaxed);
        block.store(Register::DiagLastSenderRef, message.sender_ref, Ordering::Relaxed);
    }
}

impl<D: DiagnosticSink + ?Sized> DiagnosticSink for &mut D {
    fn heartbeat(&mut self, block: &SharedRegisterBlock, tick: u32) {
        (**self).heartbeat(block, tick);
    }

    fn delivered(&mut self, block: &SharedRegisterBlock, message: &MailboxMessage) {
        (**self).delivered(block, message);
    }
}
