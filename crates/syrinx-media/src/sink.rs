#![forbid(unsafe_code)]

//! Media sink: where provisioned media keys attach and where the host
//! reports that encrypted content was encountered.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;

use crate::{InitDataKind, MediaError, keys::MediaKeys};

/// Host detection that content is encrypted, carrying the embedded
/// initialization data.
#[derive(Clone, Debug)]
pub struct EncryptedSignal {
    pub kind: InitDataKind,
    pub data: Bytes,
}

/// The playback target media keys are attached to.
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Media keys currently attached to this sink, if any.
    fn media_keys(&self) -> Option<Arc<dyn MediaKeys>>;

    /// Attach media keys to this sink.
    async fn set_media_keys(&self, keys: Arc<dyn MediaKeys>) -> Result<(), MediaError>;

    /// Subscribe to "encrypted content detected" signals.
    fn encrypted_signals(&self) -> broadcast::Receiver<EncryptedSignal>;
}
