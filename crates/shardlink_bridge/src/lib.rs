//! # SHARDLINK Bridge
//!
//! The sender half of the link. The controller feeds received items in and
//! gets location checks back; the bridge turns that into mailbox traffic
//! and mirror reads against a shared register block.
//!
//! ```rust
//! use shardlink_bridge::Bridge;
//! use shardlink_core::{LinkConfig, MailboxMessage, PollLoop, SharedRegisterBlock};
//!
//! let config = LinkConfig::default();
//! let block = SharedRegisterBlock::new();
//! let mut bridge = Bridge::from_config(&block, &config).unwrap();
//! let mut receiver = PollLoop::from_config(&block, &config).unwrap();
//!
//! let shard = config.milestone_item_id(0).unwrap();
//! bridge.queue_mut().sync_received(&[MailboxMessage::new(shard, 0)]);
//! bridge.tick();
//! receiver.poll_once();
//!
//! let report = bridge.tick();
//! assert_eq!(report.checks[0].location_id, config.location_id(0).unwrap());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod bridge;
pub mod error;
pub mod queue;
pub mod watcher;

pub use bridge::{Bridge, BridgeDriver, BridgeReport, BridgeSummary};
pub use error::{BridgeError, BridgeResult};
pub use queue::ItemQueue;
pub use watcher::{LocationCheck, LocationMap, ProgressWatcher};
