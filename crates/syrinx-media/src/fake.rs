#![forbid(unsafe_code)]

//! In-memory host capability fakes.
//!
//! Scripted stand-ins for the capability triad and the media sink, with
//! failure switches and call counters. Used by unit and integration tests
//! across the workspace; nothing here touches a real host.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;

use crate::{
    EncryptedSignal, InitData, MediaError,
    keys::{KeySession, KeySystemAccess, MediaKeys},
    sink::MediaSink,
};

/// Failure switches and scripted payloads for the fake host.
#[derive(Clone, Debug)]
pub struct FakeHostOptions {
    pub fail_create_media_keys: bool,
    /// Fail session creation once this many sessions exist. `Some(0)` fails
    /// immediately, `None` never fails.
    pub fail_create_session_after: Option<usize>,
    pub fail_generate_request: bool,
    pub fail_set_media_keys: bool,
    pub fail_update: bool,
    /// Outgoing message every fake session emits after `generate_request`.
    pub message: Bytes,
}

impl Default for FakeHostOptions {
    fn default() -> Self {
        Self {
            fail_create_media_keys: false,
            fail_create_session_after: None,
            fail_generate_request: false,
            fail_set_media_keys: false,
            fail_update: false,
            message: Bytes::from_static(b"fake-license-request"),
        }
    }
}

/// Fake key-system access handle.
pub struct FakeKeySystemAccess {
    options: FakeHostOptions,
    created: Mutex<Option<Arc<FakeMediaKeys>>>,
    create_calls: AtomicUsize,
}

impl FakeKeySystemAccess {
    pub fn new(options: FakeHostOptions) -> Self {
        Self {
            options,
            created: Mutex::new(None),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Media keys created through this handle, if any.
    pub fn created_media_keys(&self) -> Option<Arc<FakeMediaKeys>> {
        self.created.lock().unwrap().clone()
    }

    pub fn create_media_keys_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySystemAccess for FakeKeySystemAccess {
    fn key_system(&self) -> &str {
        "com.example.fakedrm"
    }

    async fn create_media_keys(&self) -> Result<Arc<dyn MediaKeys>, MediaError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.options.fail_create_media_keys {
            return Err(MediaError::Rejected("media keys creation disabled".into()));
        }

        let keys = Arc::new(FakeMediaKeys::new(self.options.clone()));
        *self.created.lock().unwrap() = Some(Arc::clone(&keys));
        Ok(keys)
    }
}

/// Fake media keys tracking every session they create.
pub struct FakeMediaKeys {
    options: FakeHostOptions,
    sessions: Mutex<Vec<Arc<FakeKeySession>>>,
}

impl FakeMediaKeys {
    pub fn new(options: FakeHostOptions) -> Self {
        Self {
            options,
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn sessions(&self) -> Vec<Arc<FakeKeySession>> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaKeys for FakeMediaKeys {
    async fn create_session(&self) -> Result<Arc<dyn KeySession>, MediaError> {
        let existing = self.session_count();
        if let Some(limit) = self.options.fail_create_session_after {
            if existing >= limit {
                return Err(MediaError::Rejected(format!(
                    "session creation disabled after {limit}"
                )));
            }
        }

        let session = Arc::new(FakeKeySession::new(self.options.clone()));
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        Ok(session)
    }
}

/// Fake key session with a scripted outgoing message.
pub struct FakeKeySession {
    options: FakeHostOptions,
    messages_tx: broadcast::Sender<Bytes>,
    init_data: Mutex<Option<InitData>>,
    updates: Mutex<Vec<Bytes>>,
    closed: AtomicBool,
}

impl FakeKeySession {
    fn new(options: FakeHostOptions) -> Self {
        let (messages_tx, _) = broadcast::channel(8);
        Self {
            options,
            messages_tx,
            init_data: Mutex::new(None),
            updates: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Initialization data the last `generate_request` was given.
    pub fn last_init_data(&self) -> Option<InitData> {
        self.init_data.lock().unwrap().clone()
    }

    /// Licenses applied via `update`, in order.
    pub fn updates(&self) -> Vec<Bytes> {
        self.updates.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySession for FakeKeySession {
    fn messages(&self) -> broadcast::Receiver<Bytes> {
        self.messages_tx.subscribe()
    }

    async fn generate_request(&self, init_data: &InitData) -> Result<(), MediaError> {
        if self.options.fail_generate_request {
            return Err(MediaError::Rejected("request generation disabled".into()));
        }

        *self.init_data.lock().unwrap() = Some(init_data.clone());
        let _ = self.messages_tx.send(self.options.message.clone());
        Ok(())
    }

    async fn update(&self, license: &Bytes) -> Result<(), MediaError> {
        if self.is_closed() {
            return Err(MediaError::SessionClosed);
        }
        if self.options.fail_update {
            return Err(MediaError::Rejected("update disabled".into()));
        }

        self.updates.lock().unwrap().push(license.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), MediaError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Fake media sink with a broadcast channel for encrypted signals.
pub struct FakeMediaSink {
    options: FakeHostOptions,
    media_keys: Mutex<Option<Arc<dyn MediaKeys>>>,
    set_calls: AtomicUsize,
    encrypted_tx: broadcast::Sender<EncryptedSignal>,
}

impl FakeMediaSink {
    pub fn new(options: FakeHostOptions) -> Self {
        let (encrypted_tx, _) = broadcast::channel(8);
        Self {
            options,
            media_keys: Mutex::new(None),
            set_calls: AtomicUsize::new(0),
            encrypted_tx,
        }
    }

    pub fn set_media_keys_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    /// Simulate the host flagging encrypted content.
    pub fn emit_encrypted(&self, signal: EncryptedSignal) {
        let _ = self.encrypted_tx.send(signal);
    }
}

#[async_trait]
impl MediaSink for FakeMediaSink {
    fn media_keys(&self) -> Option<Arc<dyn MediaKeys>> {
        self.media_keys.lock().unwrap().clone()
    }

    async fn set_media_keys(&self, keys: Arc<dyn MediaKeys>) -> Result<(), MediaError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.options.fail_set_media_keys {
            return Err(MediaError::Rejected("media keys attachment disabled".into()));
        }

        *self.media_keys.lock().unwrap() = Some(keys);
        Ok(())
    }

    fn encrypted_signals(&self) -> broadcast::Receiver<EncryptedSignal> {
        self.encrypted_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InitDataKind;

    #[tokio::test]
    async fn test_session_emits_scripted_message_after_subscribe() {
        let keys = FakeMediaKeys::new(FakeHostOptions::default());
        let session = keys.create_session().await.unwrap();

        let mut rx = session.messages();
        let init = InitData::new(InitDataKind::Cenc, Bytes::from_static(b"pssh"));
        session.generate_request(&init).await.unwrap();

        let message = rx.try_recv().unwrap();
        assert_eq!(message, Bytes::from_static(b"fake-license-request"));
    }

    #[tokio::test]
    async fn test_session_creation_limit() {
        let options = FakeHostOptions {
            fail_create_session_after: Some(1),
            ..FakeHostOptions::default()
        };
        let keys = FakeMediaKeys::new(options);

        assert!(keys.create_session().await.is_ok());
        assert!(keys.create_session().await.is_err());
        assert_eq!(keys.session_count(), 1);
    }

    #[tokio::test]
    async fn test_sink_stores_media_keys() {
        let sink = FakeMediaSink::new(FakeHostOptions::default());
        assert!(sink.media_keys().is_none());

        let keys: Arc<dyn MediaKeys> = Arc::new(FakeMediaKeys::new(FakeHostOptions::default()));
        sink.set_media_keys(keys).await.unwrap();

        assert!(sink.media_keys().is_some());
        assert_eq!(sink.set_media_keys_calls(), 1);
    }
}
