#![forbid(unsafe_code)]

use thiserror::Error;

/// Host capability errors.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("rejected by host: {0}")]
    Rejected(String),

    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("unrecognized init data kind: {0}")]
    UnknownInitDataKind(String),

    #[error("session closed")]
    SessionClosed,
}
