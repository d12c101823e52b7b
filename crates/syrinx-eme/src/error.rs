#![forbid(unsafe_code)]

use thiserror::Error;

/// Negotiation pipeline errors.
///
/// Each pipeline stage maps host rejection to exactly one kind. All kinds are
/// terminal for the current negotiation attempt; none is retried internally.
#[derive(Debug, Error)]
pub enum EmeError {
    #[error("no key system access: {0}")]
    NoKeySystemAccess(String),

    #[error("media keys unavailable: {0}")]
    NoKeys(String),

    #[error("license request generation failed: {0}")]
    GenerateRequestFailed(String),

    #[error("license request failed: {0}")]
    LicenseRequestFailed(String),

    #[error("license update failed: {0}")]
    LicenseUpdateFailed(String),

    #[error("no initialization data: {0}")]
    NoInitData(String),

    #[error("media not attached")]
    MediaNotAttached,

    #[error("callback not configured: {0}")]
    NotConfigured(&'static str),
}

pub type EmeResult<T> = Result<T, EmeError>;
