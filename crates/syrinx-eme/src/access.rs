#![forbid(unsafe_code)]

//! Key-system access: the first stage of the negotiation pipeline.

use std::sync::Arc;

use syrinx_media::{CodecCapability, InitDataKind, KeySystemAccess, KeySystemConfig};
use tracing::debug;

use crate::{
    EmeError, EmeResult,
    config::EmeConfig,
    context::{EncryptionContext, TrackKind},
};

/// Requests access to a content-decryption key system.
pub struct AccessProvider {
    config: EmeConfig,
}

impl AccessProvider {
    pub fn new(config: EmeConfig) -> Self {
        Self { config }
    }

    /// Candidate configurations derived from every known context's codecs.
    ///
    /// A single aggregated configuration is produced: the host picks a key
    /// system able to handle all renditions at once.
    pub fn candidate_configurations(contexts: &[EncryptionContext]) -> Vec<KeySystemConfig> {
        let mut candidate = KeySystemConfig {
            init_data_kinds: vec![InitDataKind::Cenc, InitDataKind::Keyids, InitDataKind::Webm],
            ..KeySystemConfig::default()
        };

        for context in contexts {
            let capability = CodecCapability {
                content_type: context.content_type(),
            };
            match context.kind {
                TrackKind::Video => candidate.video_capabilities.push(capability),
                TrackKind::Audio => candidate.audio_capabilities.push(capability),
            }
        }

        vec![candidate]
    }

    /// Request key-system access for the given contexts.
    ///
    /// Not retried internally; rejection surfaces immediately as
    /// [`EmeError::NoKeySystemAccess`].
    pub async fn request_access(
        &self,
        contexts: &[EncryptionContext],
    ) -> EmeResult<Arc<dyn KeySystemAccess>> {
        let request = self.config.request_key_system_access_fn()?;
        let candidates = Self::candidate_configurations(contexts);

        debug!(
            contexts = contexts.len(),
            candidates = candidates.len(),
            "syrinx-eme requesting key system access"
        );

        let access = request(candidates)
            .await
            .map_err(|e| EmeError::NoKeySystemAccess(e.to_string()))?;

        debug!(
            key_system = access.key_system(),
            "syrinx-eme key system access granted"
        );
        Ok(access)
    }
}
