//! # SHARDLINK Core
//!
//! Shared-memory mailbox between an external controller (the sender) and an
//! embedded runtime (the receiver) that cannot call into each other.
//!
//! ```text
//!  ┌──────────────┐   try_send    ┌────────────────────────┐   poll_once   ┌──────────────┐
//!  │    Sender    │ ────────────▶ │  SharedRegisterBlock   │ ◀──────────── │   PollLoop   │
//!  │  (bridge)    │               │  +00 progress_mirror   │               │              │
//!  │              │ ◀──────────── │  +04 mailbox_full      │ ────────────▶ │ ItemEffect-  │
//!  └──────────────┘  read mirror  │  +08 mailbox_item_id   │   publish     │ Applier      │
//!                                 │  +0C mailbox_sender_ref│               │ Progress-    │
//!                                 │  +10.. diagnostics     │               │ Tracker      │
//!                                 └────────────────────────┘               └──────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. **One flag, one slot** - `mailbox_full` is the only synchronization
//! 2. **Flag last** - each side writes the flag after the payload
//! 3. **Milestones are monotonic** - no bit ever goes back to zero
//! 4. **Everything is total** - unknown items, saturated counters and
//!    repeated milestones are no-ops, not errors
//!
//! ## Example
//!
//! ```rust
//! use shardlink_core::{LinkConfig, MailboxSender, PollLoop, SharedRegisterBlock};
//!
//! let config = LinkConfig::default();
//! let block = SharedRegisterBlock::new();
//! let sender = MailboxSender::new(&block);
//! let mut receiver = PollLoop::from_config(&block, &config).unwrap();
//!
//! let shard_3 = config.milestone_item_id(3).unwrap();
//! assert!(sender.try_send(shard_3, 1));
//! receiver.poll_once();
//! assert!(block.progress_mirror().contains(3));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod counters;
pub mod diagnostics;
pub mod effects;
pub mod error;
pub mod layout;
pub mod mailbox;
pub mod mapped;
pub mod poll;
pub mod progress;
pub mod state;

pub use config::{CounterConfig, LinkConfig, DEFAULT_ITEM_BASE};
pub use counters::{BoundedCounter, CounterBank, CounterId, CounterStep};
pub use diagnostics::{DiagnosticSink, NoDiagnostics, RegisterDiagnostics};
pub use effects::{ApplyOutcome, EffectClass, ItemEffect, ItemEffectApplier, ItemRange, ItemRangeTable};
pub use error::{LinkError, LinkResult};
pub use layout::{Register, RegisterRegion, RegisterSnapshot, SharedRegisterBlock, BLOCK_SIZE, BLOCK_WORDS};
pub use mailbox::{MailboxMessage, MailboxReceiver, MailboxSender, SLOT_EMPTY, SLOT_FULL};
pub use mapped::MappedRegion;
pub use poll::{Delivery, PollLoop, PollOutcome};
pub use progress::{ProgressMask, ProgressTracker, MAX_MILESTONES, MILESTONE_COUNT};
pub use state::ReceiverState;
