//! # Bridge Error Types

use thiserror::Error;

use shardlink_core::LinkError;

/// Errors raised by the sender bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Link setup failed.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// A bridge channel lost its other end.
    #[error("{0} channel disconnected")]
    Disconnected(&'static str),

    /// A worker thread could not be started.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// A worker thread panicked before returning.
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_spawn_error_keeps_its_cause() {
        let cause = io::Error::new(io::ErrorKind::WouldBlock, "thread limit reached");
        let err: BridgeError = cause.into();

        assert!(matches!(err, BridgeError::Spawn(_)));
        assert_eq!(err.to_string(), "failed to spawn thread: thread limit reached");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "thread limit reached");
    }

    #[test]
    fn test_panic_and_disconnect_name_the_side() {
        assert_eq!(
            BridgeError::ThreadPanicked("receiver").to_string(),
            "receiver thread panicked"
        );
        assert_eq!(
            BridgeError::Disconnected("item").to_string(),
            "item channel disconnected"
        );
    }
}
