//! # Link Error Types
//!
//! The mailbox protocol itself has no failure path. These errors only
//! surface while setting a link up: loading configuration, building the
//! item range table, or mapping a register region.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring or mapping a link.
#[derive(Error, Debug)]
pub enum LinkError {
    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two item ranges claim the same identifier.
    #[error("item range {start}..={end} overlaps existing range {other_start}..={other_end}")]
    OverlappingRanges {
        /// First identifier of the rejected range.
        start: u32,
        /// Last identifier of the rejected range.
        end: u32,
        /// First identifier of the range already in the table.
        other_start: u32,
        /// Last identifier of the range already in the table.
        other_end: u32,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be rendered back to TOML.
    #[error("failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Filesystem failure on a config file or register region.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Mapped region cannot hold a full register block.
    #[error("register region too small: {len} bytes, need {required}")]
    RegionTooSmall {
        /// Length of the mapping.
        len: usize,
        /// Bytes required by the register layout.
        required: usize,
    },

    /// Mapped region does not start on a word boundary.
    #[error("register region at {address:#x} is not {align}-byte aligned")]
    RegionMisaligned {
        /// Base address of the mapping.
        address: usize,
        /// Required alignment.
        align: usize,
    },
}

impl LinkError {
    /// Wraps an I/O error with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for link setup operations.
pub type LinkResult<T> = Result<T, LinkError>;
