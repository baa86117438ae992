//! # Shared Register Block
//!
//! The only channel between sender and receiver: a fixed run of 32-bit
//! little-endian words.
//!
//! ```text
//! +0x00  progress_mirror       receiver -> sender   bit N = milestone N reached
//! +0x04  mailbox_full          sender sets, receiver clears
//! +0x08  mailbox_item_id       sender -> receiver
//! +0x0C  mailbox_sender_ref    sender -> receiver
//! +0x10  diag_heartbeat        receiver -> sender   advisory
//! +0x14  diag_last_item_id     receiver -> sender   advisory
//! +0x18  diag_last_sender_ref  receiver -> sender   advisory
//! ```
//!
//! Words are stored little-endian whatever the host order, so a block dumped
//! from one side can be decoded by the other with [`RegisterSnapshot::from_le_bytes`].
//!
//! Writes are crate-private. Outside this crate the block can only be
//! mutated through [`crate::MailboxSender`], [`crate::MailboxReceiver`],
//! [`crate::PollLoop`] and [`crate::RegisterDiagnostics`], which carry the
//! ordering rules of the protocol.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::progress::ProgressMask;

/// Size of the register block in bytes.
pub const BLOCK_SIZE: usize = 0x1C;

/// Number of 32-bit words in the register block.
pub const BLOCK_WORDS: usize = BLOCK_SIZE / 4;

/// A named word of the register block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Register {
    /// Mirrored milestone bit-vector. Receiver writes, sender reads.
    ProgressMirror = 0x00,
    /// Slot occupancy flag: 0 = empty, 1 = full.
    MailboxFull = 0x04,
    /// Pending item identifier. Sender writes, receiver reads.
    MailboxItemId = 0x08,
    /// Pending sender reference. Sender writes, receiver reads.
    MailboxSenderRef = 0x0C,
    /// Incremented once per receiver tick.
    DiagHeartbeat = 0x10,
    /// Last item identifier drained by the receiver.
    DiagLastItemId = 0x14,
    /// Last sender reference drained by the receiver.
    DiagLastSenderRef = 0x18,
}

impl Register {
    /// Every register, in layout order.
    pub const ALL: [Self; BLOCK_WORDS] = [
        Self::ProgressMirror,
        Self::MailboxFull,
        Self::MailboxItemId,
        Self::MailboxSenderRef,
        Self::DiagHeartbeat,
        Self::DiagLastItemId,
        Self::DiagLastSenderRef,
    ];

    /// Byte offset from the block base.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> usize {
        self as usize
    }

    /// Field name as it appears in the layout table.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ProgressMirror => "progress_mirror",
            Self::MailboxFull => "mailbox_full",
            Self::MailboxItemId => "mailbox_item_id",
            Self::MailboxSenderRef => "mailbox_sender_ref",
            Self::DiagHeartbeat => "diag_heartbeat",
            Self::DiagLastItemId => "diag_last_item_id",
            Self::DiagLastSenderRef => "diag_last_sender_ref",
        }
    }
}

/// The register block as it sits in shared memory.
///
/// `#[repr(C)]` over `AtomicU32` gives exactly the byte layout in the module
/// docs, so the same type can overlay a file-backed mapping
/// (see [`crate::MappedRegion`]).
#[repr(C)]
#[derive(Debug, Default)]
pub struct SharedRegisterBlock {
    progress_mirror: AtomicU32,
    mailbox_full: AtomicU32,
    mailbox_item_id: AtomicU32,
    mailbox_sender_ref: AtomicU32,
    diag_heartbeat: AtomicU32,
    diag_last_item_id: AtomicU32,
    diag_last_sender_ref: AtomicU32,
}

const _: () = assert!(std::mem::size_of::<SharedRegisterBlock>() == BLOCK_SIZE);
const _: () = assert!(std::mem::align_of::<SharedRegisterBlock>() == 4);

impl SharedRegisterBlock {
    /// Creates a zeroed block (empty mailbox, no milestones).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a zeroed block behind an `Arc`, ready to hand to both sides.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    #[inline]
    fn word(&self, register: Register) -> &AtomicU32 {
        match register {
            Register::ProgressMirror => &self.progress_mirror,
            Register::MailboxFull => &self.mailbox_full,
            Register::MailboxItemId => &self.mailbox_item_id,
            Register::MailboxSenderRef => &self.mailbox_sender_ref,
            Register::DiagHeartbeat => &self.diag_heartbeat,
            Register::DiagLastItemId => &self.diag_last_item_id,
            Register::DiagLastSenderRef => &self.diag_last_sender_ref,
        }
    }

    #[inline]
    pub(crate) fn load(&self, register: Register, order: Ordering) -> u32 {
        u32::from_le(self.word(register).load(order))
    }

    #[inline]
    pub(crate) fn store(&self, register: Register, value: u32, order: Ordering) {
        self.word(register).store(value.to_le(), order);
    }

    /// ORs `bits` into the progress mirror. Returns the mirror after the merge.
    ///
    /// Bits already present are never cleared, so the mirror stays monotonic
    /// even if a publisher hands in an older snapshot.
    #[inline]
    pub(crate) fn merge_progress(&self, bits: u32) -> u32 {
        let previous = u32::from_le(self.progress_mirror.fetch_or(bits.to_le(), Ordering::Release));
        previous | bits
    }

    /// Reads one register with acquire ordering.
    #[inline]
    #[must_use]
    pub fn read(&self, register: Register) -> u32 {
        self.load(register, Ordering::Acquire)
    }

    /// Reads the mirrored milestone bit-vector.
    #[inline]
    #[must_use]
    pub fn progress_mirror(&self) -> ProgressMask {
        ProgressMask::from_bits(self.read(Register::ProgressMirror))
    }

    /// Copies every register into a plain value.
    ///
    /// Each word is read independently; the copy is not atomic as a whole.
    #[must_use]
    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            progress_mirror: self.read(Register::ProgressMirror),
            mailbox_full: self.read(Register::MailboxFull),
            mailbox_item_id: self.read(Register::MailboxItemId),
            mailbox_sender_ref: self.read(Register::MailboxSenderRef),
            diag_heartbeat: self.read(Register::DiagHeartbeat),
            diag_last_item_id: self.read(Register::DiagLastItemId),
            diag_last_sender_ref: self.read(Register::DiagLastSenderRef),
        }
    }

    /// Zeroes every register.
    ///
    /// Only valid on a full restart of the receiver, when no sender is
    /// mid-write. Clearing the mirror at any other time breaks monotonicity.
    pub fn reset(&self) {
        for register in Register::ALL {
            self.store(register, 0, Ordering::Release);
        }
    }
}

/// Plain copy of the register block.
///
/// Fields hold host-order values. Use [`Self::to_le_bytes`] and
/// [`Self::from_le_bytes`] to move a snapshot through a raw byte dump.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct RegisterSnapshot {
    /// Mirrored milestone bits.
    pub progress_mirror: u32,
    /// Slot occupancy flag.
    pub mailbox_full: u32,
    /// Pending item identifier.
    pub mailbox_item_id: u32,
    /// Pending sender reference.
    pub mailbox_sender_ref: u32,
    /// Receiver tick counter.
    pub diag_heartbeat: u32,
    /// Last drained item identifier.
    pub diag_last_item_id: u32,
    /// Last drained sender reference.
    pub diag_last_sender_ref: u32,
}

impl RegisterSnapshot {
    fn map_words(self, f: fn(u32) -> u32) -> Self {
        Self {
            progress_mirror: f(self.progress_mirror),
            mailbox_full: f(self.mailbox_full),
            mailbox_item_id: f(self.mailbox_item_id),
            mailbox_sender_ref: f(self.mailbox_sender_ref),
            diag_heartbeat: f(self.diag_heartbeat),
            diag_last_item_id: f(self.diag_last_item_id),
            diag_last_sender_ref: f(self.diag_last_sender_ref),
        }
    }

    /// Encodes the snapshot in the little-endian wire layout.
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; BLOCK_SIZE] {
        let le = self.map_words(u32::to_le);
        let mut out = [0u8; BLOCK_SIZE];
        out.copy_from_slice(bytemuck::bytes_of(&le));
        out
    }

    /// Decodes a little-endian dump of the block.
    ///
    /// Returns `None` if fewer than [`BLOCK_SIZE`] bytes are supplied.
    /// Trailing bytes are ignored.
    #[must_use]
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        let raw: Self = bytemuck::try_pod_read_unaligned(bytes.get(..BLOCK_SIZE)?).ok()?;
        Some(raw.map_words(u32::from_le))
    }

    /// Milestone bits as a mask.
    #[inline]
    #[must_use]
    pub const fn progress(&self) -> ProgressMask {
        ProgressMask::from_bits(self.progress_mirror)
    }
}

/// Anything that can lend out a [`SharedRegisterBlock`].
///
/// Implemented for the block itself, references, `Arc`s and
/// [`crate::MappedRegion`], so endpoints work the same whether the block
/// lives in process memory or in a shared mapping.
pub trait RegisterRegion {
    /// Returns the register block.
    fn block(&self) -> &SharedRegisterBlock;
}

impl RegisterRegion for SharedRegisterBlock {
    #[inline]
    fn block(&self) -> &SharedRegisterBlock {
        self
    }
}

impl<T: RegisterRegion + ?Sized> RegisterRegion for &T {
    #[inline]
    fn block(&self) -> &SharedRegisterBlock {
        (**self).block()
    }
}

impl<T: RegisterRegion + ?Sized> RegisterRegion for Arc<T> {
    #[inline]
    fn block(&self) -> &SharedRegisterBlock {
        (**self).block()
    }
}
