#![forbid(unsafe_code)]

use std::sync::Arc;

use syrinx_media::KeySession;
use tokio::sync::Mutex;

use crate::context::EncryptionContext;

/// A session paired with the context it was created for.
#[derive(Clone)]
pub struct SessionContext {
    pub session: Arc<dyn KeySession>,
    pub context: EncryptionContext,
}

/// Append-only registry of every created session.
///
/// Sessions are appended at creation and removed only by the detach drain, so
/// a partially failed negotiation can still be torn down later.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<Vec<SessionContext>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, entry: SessionContext) {
        self.inner.lock().await.push(entry);
    }

    /// Remove and return every tracked session.
    pub async fn drain(&self) -> Vec<SessionContext> {
        let mut sessions = self.inner.lock().await;
        sessions.drain(..).collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syrinx_media::fake::{FakeHostOptions, FakeMediaKeys};
    use syrinx_media::keys::MediaKeys;

    #[tokio::test]
    async fn test_register_and_drain() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty().await);

        let keys = FakeMediaKeys::new(FakeHostOptions::default());
        let session = keys.create_session().await.unwrap();
        registry
            .register(SessionContext {
                session,
                context: EncryptionContext::video("avc1.42E01E"),
            })
            .await;

        assert_eq!(registry.len().await, 1);

        let drained = registry.drain().await;
        assert_eq!(drained.len(), 1);
        assert!(registry.is_empty().await);
    }
}
