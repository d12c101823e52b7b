#![forbid(unsafe_code)]

//! Key session fan-out: one session per encryption context, or a single
//! shared session under the license-reuse policy.

use std::sync::Arc;

use syrinx_media::MediaKeys;
use tracing::debug;

use crate::{
    EmeError, EmeResult,
    context::{EncryptionContext, TrackKind},
    registry::{SessionContext, SessionRegistry},
};

/// Creates decryption sessions and tracks every one of them for teardown.
pub struct SessionFactory {
    registry: SessionRegistry,
    reuse_license: bool,
}

impl SessionFactory {
    pub fn new(registry: SessionRegistry, reuse_license: bool) -> Self {
        Self {
            registry,
            reuse_license,
        }
    }

    /// Contexts that get a session of their own: video first, then audio.
    ///
    /// Under license reuse only the first planned context is kept; its
    /// session and license are shared by every rendition.
    fn plan<'a>(&self, contexts: &'a [EncryptionContext]) -> Vec<&'a EncryptionContext> {
        let mut ordered: Vec<&EncryptionContext> = contexts
            .iter()
            .filter(|c| c.kind == TrackKind::Video)
            .collect();
        ordered.extend(contexts.iter().filter(|c| c.kind == TrackKind::Audio));

        if self.reuse_license {
            ordered.truncate(1);
        }
        ordered
    }

    /// Create one session per planned context, sequentially.
    ///
    /// Every session is registered the moment it exists, before the next
    /// creation is attempted, so a failure mid-fan-out leaves the earlier
    /// sessions reachable for the detach path.
    pub async fn create_sessions(
        &self,
        keys: &Arc<dyn MediaKeys>,
        contexts: &[EncryptionContext],
    ) -> EmeResult<Vec<SessionContext>> {
        let planned = self.plan(contexts);
        let mut created = Vec::with_capacity(planned.len());

        for context in planned {
            let session = keys
                .create_session()
                .await
                .map_err(|e| EmeError::NoKeys(e.to_string()))?;

            let entry = SessionContext {
                session,
                context: context.clone(),
            };
            self.registry.register(entry.clone()).await;

            debug!(
                kind = context.kind.as_str(),
                codec = %context.codec,
                "syrinx-eme key session created"
            );
            created.push(entry);
        }

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syrinx_media::fake::{FakeHostOptions, FakeMediaKeys};

    fn contexts() -> Vec<EncryptionContext> {
        vec![
            EncryptionContext::audio("mp4a.40.2"),
            EncryptionContext::video("avc1.42E01E"),
            EncryptionContext::video("hvc1.1.6.L93.B0"),
        ]
    }

    fn media_keys(options: FakeHostOptions) -> (Arc<FakeMediaKeys>, Arc<dyn MediaKeys>) {
        let fake = Arc::new(FakeMediaKeys::new(options));
        let keys: Arc<dyn MediaKeys> = Arc::clone(&fake) as _;
        (fake, keys)
    }

    #[tokio::test]
    async fn test_one_session_per_context_video_first() {
        let (fake, keys) = media_keys(FakeHostOptions::default());
        let registry = SessionRegistry::new();
        let factory = SessionFactory::new(registry.clone(), false);

        let created = factory.create_sessions(&keys, &contexts()).await.unwrap();

        assert_eq!(created.len(), 3);
        assert_eq!(fake.session_count(), 3);
        assert_eq!(registry.len().await, 3);

        // Video contexts come first, audio last, distinct pairings.
        assert_eq!(created[0].context.codec, "avc1.42E01E");
        assert_eq!(created[1].context.codec, "hvc1.1.6.L93.B0");
        assert_eq!(created[2].context.codec, "mp4a.40.2");
    }

    #[tokio::test]
    async fn test_reuse_license_collapses_to_first_context() {
        let (fake, keys) = media_keys(FakeHostOptions::default());
        let factory = SessionFactory::new(SessionRegistry::new(), true);

        let created = factory.create_sessions(&keys, &contexts()).await.unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(fake.session_count(), 1);
        assert_eq!(created[0].context.codec, "avc1.42E01E");
    }

    #[tokio::test]
    async fn test_failed_fan_out_keeps_earlier_sessions_registered() {
        let (_fake, keys) = media_keys(FakeHostOptions {
            fail_create_session_after: Some(1),
            ..FakeHostOptions::default()
        });
        let registry = SessionRegistry::new();
        let factory = SessionFactory::new(registry.clone(), false);

        let result = factory.create_sessions(&keys, &contexts()).await;

        assert!(matches!(result, Err(EmeError::NoKeys(_))));
        assert_eq!(registry.len().await, 1);
    }
}
