//! # SHARDLINK
//!
//! Item delivery between an external controller and an embedded runtime
//! through one shared register block.
//!
//! ```text
//! ┌────────────────┐        ┌──────────────────────┐        ┌────────────────────┐
//! │  controller    │ items  │  shardlink_bridge    │        │  ReceiverRuntime   │
//! │                │──────> │  ItemQueue ──────────┼─ mail ─┼─> PollLoop         │
//! │                │ <──────│  ProgressWatcher <───┼─ mirror┼── ProgressTracker  │
//! └────────────────┘ checks └──────────────────────┘        └────────────────────┘
//!                                    shardlink_core: SharedRegisterBlock
//! ```
//!
//! ## Modules
//!
//! - `runtime`: fixed-cadence receiver thread

pub mod runtime;

// Re-export the halves
pub use shardlink_bridge as bridge;
pub use shardlink_core as core;

pub use runtime::{ReceiverRuntime, RuntimeStats};
