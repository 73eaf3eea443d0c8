//! Error types for rnet-bridge.

use thiserror::Error;

use crate::param::ExtraParam;

/// Main error type for rnet-bridge operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Frame missing its start or end delimiter, or truncated.
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),

    /// A decoded frame matched no known packet rule.
    #[error("unrecognized packet (message type {message_type:#04x})")]
    UnrecognizedPacket { message_type: u8 },

    /// Volume outside the 0-100 range.
    #[error("volume {0} out of range")]
    InvalidVolume(u8),

    /// Parameter value outside its declared range.
    #[error("value out of range for parameter {0:?}")]
    InvalidParameter(ExtraParam),

    /// Zone is not present in the zone grid.
    #[error("unknown zone {controller_id}-{zone_id}")]
    UnknownZone { controller_id: u8, zone_id: u8 },

    /// Source is not present in the source array.
    #[error("unknown source {0}")]
    UnknownSource(u8),

    /// Operation requires a connected transport.
    #[error("not connected")]
    NotConnected,

    /// Bridge task has shut down.
    #[error("connection closed")]
    ConnectionClosed,

    /// Configuration store failure.
    #[error("configuration store error: {0}")]
    ConfigStore(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
