// crates/playdeck-core/src/error.rs
//
// Error taxonomy shared across the engine. Per-tick code never propagates
// these out of the render or display loops — they are logged and the loop
// continues; the variants exist so handlers can map failures to the right
// protocol reply class and the channel can tell a recoverable producer
// fault from a fatal device fault.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayoutError {
    /// Bad channel/layer index or malformed parameter. Reported to the
    /// caller synchronously; state unchanged.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Media file missing or unreadable at load time. State unchanged.
    #[error("media not found: {0}")]
    MediaNotFound(String),

    /// Producer runtime failure. Caught inside the layer; the producer is
    /// replaced with the empty producer.
    #[error("producer failed: {0}")]
    Producer(String),

    /// Consumer runtime failure. The consumer is removed from the channel.
    #[error("consumer failed: {0}")]
    Consumer(String),

    /// Graphics device failure. Fatal for the channel.
    #[error("graphics device failed: {0}")]
    Device(String),

    /// The producer does not implement the requested capability
    /// (e.g. `call` on a non-template producer).
    #[error("operation not supported")]
    Unsupported,

    /// Queue sentinel observed while shutting down.
    #[error("shutting down")]
    ShuttingDown,
}

impl PlayoutError {
    /// True when the channel should keep running after logging this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PlayoutError::Device(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_are_fatal() {
        assert!(!PlayoutError::Device("context lost".into()).is_recoverable());
        assert!(PlayoutError::Producer("decode".into()).is_recoverable());
    }
}
