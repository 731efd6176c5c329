//! Wire-codec-specific errors.

use flux_types::FluxError;
use thiserror::Error;

/// Errors specific to decoding a byte sequence into a [`crate::Message`].
#[derive(Debug, Error)]
pub enum WireError {
    #[error("truncated frame: wanted {wanted} bytes, had {had}")]
    Truncated { wanted: usize, had: usize },

    #[error("unknown message type discriminant: {0:#x}")]
    BadDiscriminant(u8),

    #[error("route stack missing nil delimiter")]
    MissingRouteDelimiter,

    #[error("topic string is not valid utf-8")]
    BadTopicUtf8(#[source] std::str::Utf8Error),

    #[error("json payload error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<WireError> for FluxError {
    fn from(e: WireError) -> Self {
        FluxError::Protocol(e.to_string())
    }
}
