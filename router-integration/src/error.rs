use thiserror::Error;

/// Errors raised by the low-level integration primitives: checkpoint I/O,
/// clock/schedule misconfiguration, and tick-size snapping.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("failed to read checkpoint file {path}: {source}")]
    CheckpointRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write checkpoint file {path}: {source}")]
    CheckpointWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize checkpoint file {path}: {source}")]
    CheckpointSerde {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("price must be positive to snap to a tick, got {0}")]
    NonPositivePrice(rust_decimal::Decimal),
}
