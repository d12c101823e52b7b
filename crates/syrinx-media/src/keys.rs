#![forbid(unsafe_code)]

//! The host decryption capability triad.
//!
//! `KeySystemAccess` derives `MediaKeys`, which creates `KeySession`s. All
//! three are opaque externally-owned resources; callers only sequence
//! operations against them and never construct them directly.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;

use crate::{InitData, InitDataKind, MediaError};

/// One codec a key-system configuration asks the host to support.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecCapability {
    /// Full MIME content type, e.g. `video/mp4;codecs="avc1.42E01E"`.
    pub content_type: String,
}

/// Candidate key-system configuration derived from playback codecs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeySystemConfig {
    pub init_data_kinds: Vec<InitDataKind>,
    pub audio_capabilities: Vec<CodecCapability>,
    pub video_capabilities: Vec<CodecCapability>,
}

/// Result of a successful key-system access request.
#[async_trait]
pub trait KeySystemAccess: Send + Sync {
    /// Identifier of the granted key system.
    fn key_system(&self) -> &str;

    /// Derive the media-keys handle. Used at most once per negotiation.
    async fn create_media_keys(&self) -> Result<Arc<dyn MediaKeys>, MediaError>;
}

/// Granted decryption capability, shared by every session on one sink.
#[async_trait]
pub trait MediaKeys: Send + Sync {
    /// Create a new decryption session.
    async fn create_session(&self) -> Result<Arc<dyn KeySession>, MediaError>;
}

/// A single decryption context that issues a license request and is updated
/// with a license.
#[async_trait]
pub trait KeySession: Send + Sync {
    /// Outgoing license-request messages.
    ///
    /// Subscribe before calling [`generate_request`](Self::generate_request),
    /// otherwise the message may fire before a listener exists.
    fn messages(&self) -> broadcast::Receiver<Bytes>;

    /// Ask the host to produce a license request from initialization data.
    async fn generate_request(&self, init_data: &InitData) -> Result<(), MediaError>;

    /// Apply license bytes to the session.
    async fn update(&self, license: &Bytes) -> Result<(), MediaError>;

    /// Close the session and release host resources.
    async fn close(&self) -> Result<(), MediaError>;
}
