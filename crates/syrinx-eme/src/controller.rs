#![forbid(unsafe_code)]

//! The negotiation orchestrator.
//!
//! Drives access -> provisioning -> session fan-out -> license fan-out and
//! owns all cross-call mutable state: the lifecycle state, the media
//! reference, the captured init data, and the session registry.

use std::sync::Arc;

use futures::future::join_all;
use syrinx_media::{EncryptedSignal, InitData, MediaSink};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    access::AccessProvider,
    config::EmeConfig,
    context::EncryptionContext,
    error::{EmeError, EmeResult},
    events::{EmeEvent, EventEmitter},
    license::LicenseExchange,
    provision,
    registry::SessionRegistry,
    session::SessionFactory,
    signal::PlaybackSignal,
};

/// Where the controller is in the negotiation lifecycle.
///
/// A failed attempt resets to `Idle`, so the next triggering signal starts a
/// fresh negotiation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NegotiationState {
    #[default]
    Idle,
    Configuring,
    Configured,
}

/// Drives the decryption negotiation pipeline end to end.
///
/// Inbound signals arrive over the channel behind [`signal_sender`]
/// (or through the `on_*` methods directly); lifecycle notifications go out
/// over the broadcast channel behind [`events`].
///
/// [`signal_sender`]: EmeController::signal_sender
/// [`events`]: EmeController::events
pub struct EmeController {
    config: EmeConfig,
    access: AccessProvider,
    sessions: SessionFactory,
    exchange: LicenseExchange,
    registry: SessionRegistry,
    emitter: EventEmitter,
    state: NegotiationState,
    media: Option<Arc<dyn MediaSink>>,
    contexts: Vec<EncryptionContext>,
    init_data: Option<InitData>,
    signal_tx: mpsc::Sender<PlaybackSignal>,
    signal_rx: Option<mpsc::Receiver<PlaybackSignal>>,
    encrypted_listener: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl EmeController {
    pub fn new(config: EmeConfig) -> Self {
        let emitter = match &config.events_tx {
            Some(tx) => EventEmitter::with_sender(tx.clone()),
            None => EventEmitter::new(config.events_channel_capacity),
        };
        let registry = SessionRegistry::new();
        let (signal_tx, signal_rx) = mpsc::channel(config.signal_channel_capacity);

        Self {
            access: AccessProvider::new(config.clone()),
            sessions: SessionFactory::new(registry.clone(), config.reuse_license),
            exchange: LicenseExchange::new(config.clone()),
            registry,
            emitter,
            state: NegotiationState::default(),
            media: None,
            contexts: Vec::new(),
            init_data: None,
            signal_tx,
            signal_rx: Some(signal_rx),
            encrypted_listener: None,
            cancel: CancellationToken::new(),
            config,
        }
    }

    /// Sender half of the inbound signal channel.
    pub fn signal_sender(&self) -> mpsc::Sender<PlaybackSignal> {
        self.signal_tx.clone()
    }

    /// Subscribe to lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<EmeEvent> {
        self.emitter.subscribe()
    }

    /// Token stopping the run loop and the encrypted-signal listener.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Number of tracked sessions.
    pub async fn session_count(&self) -> usize {
        self.registry.len().await
    }

    /// Consume inbound signals until the channel closes or the cancellation
    /// token fires.
    pub async fn run(mut self) {
        let Some(mut signals) = self.signal_rx.take() else {
            return;
        };
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                signal = signals.recv() => match signal {
                    Some(signal) => self.handle_signal(signal).await,
                    None => break,
                },
            }
        }

        debug!("syrinx-eme controller loop stopped");
    }

    /// Dispatch one inbound signal.
    pub async fn handle_signal(&mut self, signal: PlaybackSignal) {
        match signal {
            PlaybackSignal::MediaAttached { sink } => self.on_media_attached(sink).await,
            PlaybackSignal::MediaDetached => self.on_media_detached().await,
            PlaybackSignal::ManifestParsed { contexts } => self.on_manifest_parsed(contexts).await,
            PlaybackSignal::Encrypted(signal) => self.on_encrypted(signal).await,
        }
    }

    /// Store the sink and start forwarding its encrypted signals into the
    /// controller's own channel.
    pub async fn on_media_attached(&mut self, sink: Arc<dyn MediaSink>) {
        debug!("syrinx-eme media attached");
        self.stop_encrypted_listener();

        let mut encrypted = sink.encrypted_signals();
        let forward = self.signal_tx.clone();
        let cancel = self.cancel.child_token();

        self.encrypted_listener = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    signal = encrypted.recv() => match signal {
                        Ok(signal) => {
                            if forward.send(PlaybackSignal::Encrypted(signal)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "syrinx-eme encrypted listener lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        }));

        self.media = Some(sink);
    }

    /// Close every tracked session, then release the media reference.
    ///
    /// All closures are awaited jointly; a rejected close is logged and does
    /// not keep the rest from completing.
    pub async fn on_media_detached(&mut self) {
        self.stop_encrypted_listener();

        let sessions = self.registry.drain().await;
        let count = sessions.len();

        let closures = sessions.iter().map(|entry| entry.session.close());
        for result in join_all(closures).await {
            if let Err(e) = result {
                warn!(error = %e, "syrinx-eme session close failed");
            }
        }

        if count > 0 {
            self.emitter.emit_sessions_closed(count);
        }
        debug!(sessions = count, "syrinx-eme media detached");

        self.media = None;
        self.init_data = None;
        self.state = NegotiationState::Idle;
    }

    /// Record the manifest's encryption contexts and, unless configured to
    /// defer to the encrypted signal, start negotiating.
    pub async fn on_manifest_parsed(&mut self, contexts: Vec<EncryptionContext>) {
        if !self.config.enabled {
            return;
        }

        debug!(contexts = contexts.len(), "syrinx-eme manifest parsed");
        self.contexts = contexts;

        if self.config.init_data_in_fragments {
            // Init data travels with the fragments; the host's encrypted
            // signal starts the negotiation instead.
            return;
        }

        self.try_negotiate().await;
    }

    /// Capture host-detected init data and start negotiating.
    pub async fn on_encrypted(&mut self, signal: EncryptedSignal) {
        if !self.config.enabled {
            return;
        }

        debug!(
            kind = %signal.kind,
            bytes = signal.data.len(),
            "syrinx-eme encrypted content detected"
        );

        if self.init_data.is_none() {
            self.init_data = Some(InitData::new(signal.kind, signal.data));
        }

        self.try_negotiate().await;
    }

    /// Start a negotiation unless one is already running or done.
    async fn try_negotiate(&mut self) {
        if self.state != NegotiationState::Idle {
            debug!(state = ?self.state, "syrinx-eme negotiation trigger ignored");
            return;
        }
        if self.contexts.is_empty() {
            debug!("syrinx-eme no encryption contexts yet, negotiation deferred");
            return;
        }

        self.state = NegotiationState::Configuring;
        self.emitter.emit_negotiation_started(self.contexts.len());

        match self.negotiate().await {
            Ok(sessions) => {
                self.state = NegotiationState::Configured;
                self.emitter.emit_negotiation_completed(sessions);
                debug!(sessions, "syrinx-eme negotiation completed");
            }
            Err(e) => {
                self.state = NegotiationState::Idle;
                warn!(error = %e, "syrinx-eme negotiation failed");
                self.emitter.emit_negotiation_failed(Arc::new(e));
            }
        }
    }

    /// The pipeline: access, provisioning, session fan-out, license fan-out.
    ///
    /// Sessions are created and exchanged one at a time; a failing step
    /// aborts the chain before later items are attempted. Sessions already
    /// registered stay registered for the detach path.
    async fn negotiate(&mut self) -> EmeResult<usize> {
        let sink = self.media.clone().ok_or(EmeError::MediaNotAttached)?;

        let access = self.access.request_access(&self.contexts).await?;
        let keys = provision::ensure_media_keys(&access, &sink).await?;

        let pairs = self.sessions.create_sessions(&keys, &self.contexts).await?;
        for pair in &pairs {
            self.emitter
                .emit_session_created(pair.context.kind, &pair.context.codec);
        }

        for pair in &pairs {
            self.exchange.run(pair, self.init_data.as_ref()).await?;
        }

        Ok(pairs.len())
    }

    fn stop_encrypted_listener(&mut self) {
        if let Some(listener) = self.encrypted_listener.take() {
            listener.abort();
        }
    }
}

impl Drop for EmeController {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.stop_encrypted_listener();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use bytes::Bytes;
    use syrinx_media::fake::{FakeHostOptions, FakeKeySystemAccess, FakeMediaSink};
    use syrinx_media::{InitDataKind, KeySystemAccess, MediaError};

    use super::*;
    use crate::config::RequestKeySystemAccessFn;

    struct TestHost {
        access: Arc<FakeKeySystemAccess>,
        sink: Arc<FakeMediaSink>,
        access_requests: Arc<AtomicUsize>,
        /// Deny this many access requests before granting.
        deny_first: Arc<AtomicUsize>,
    }

    fn wire(options: FakeHostOptions, deny_first: usize) -> (EmeConfig, TestHost) {
        let access = Arc::new(FakeKeySystemAccess::new(options.clone()));
        let sink = Arc::new(FakeMediaSink::new(options));
        let access_requests = Arc::new(AtomicUsize::new(0));
        let deny = Arc::new(AtomicUsize::new(deny_first));

        let request: RequestKeySystemAccessFn = {
            let access = Arc::clone(&access);
            let requests = Arc::clone(&access_requests);
            let deny = Arc::clone(&deny);
            Arc::new(move |_configs| {
                requests.fetch_add(1, Ordering::SeqCst);
                let access = Arc::clone(&access);
                let deny = Arc::clone(&deny);
                Box::pin(async move {
                    if deny
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok()
                    {
                        Err(MediaError::Rejected("access denied".into()))
                    } else {
                        Ok(access as Arc<dyn KeySystemAccess>)
                    }
                })
            })
        };

        let config = EmeConfig::new()
            .with_request_key_system_access(request)
            .with_get_init_data(Arc::new(|_context, _known| {
                Box::pin(async {
                    Ok(InitData::new(
                        InitDataKind::Cenc,
                        Bytes::from_static(b"pssh"),
                    ))
                })
            }))
            .with_get_license(Arc::new(|_context, _message| {
                Box::pin(async { Ok(Bytes::from_static(b"license")) })
            }));

        (
            config,
            TestHost {
                access,
                sink,
                access_requests,
                deny_first: deny,
            },
        )
    }

    fn contexts() -> Vec<EncryptionContext> {
        vec![
            EncryptionContext::video("avc1.42E01E"),
            EncryptionContext::audio("mp4a.40.2"),
        ]
    }

    #[tokio::test]
    async fn test_manifest_triggers_negotiation() {
        let (config, host) = wire(FakeHostOptions::default(), 0);
        let mut controller = EmeController::new(config);

        controller.on_media_attached(Arc::clone(&host.sink) as _).await;
        controller.on_manifest_parsed(contexts()).await;

        assert_eq!(controller.state(), NegotiationState::Configured);
        assert_eq!(controller.session_count().await, 2);
        assert_eq!(host.access_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_controller_ignores_triggers() {
        let (config, host) = wire(FakeHostOptions::default(), 0);
        let mut controller = EmeController::new(config.with_enabled(false));

        controller.on_media_attached(Arc::clone(&host.sink) as _).await;
        controller.on_manifest_parsed(contexts()).await;
        controller
            .on_encrypted(EncryptedSignal {
                kind: InitDataKind::Cenc,
                data: Bytes::from_static(b"pssh"),
            })
            .await;

        assert_eq!(controller.state(), NegotiationState::Idle);
        assert_eq!(host.access_requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_negotiation_without_media_fails_and_resets() {
        let (config, host) = wire(FakeHostOptions::default(), 0);
        let mut controller = EmeController::new(config);
        let mut events = controller.events();

        controller.on_manifest_parsed(contexts()).await;

        assert_eq!(controller.state(), NegotiationState::Idle);
        assert!(matches!(
            events.try_recv(),
            Ok(EmeEvent::NegotiationStarted { contexts: 2 })
        ));
        match events.try_recv() {
            Ok(EmeEvent::NegotiationFailed { error }) => {
                assert!(matches!(*error, EmeError::MediaNotAttached));
            }
            other => panic!("expected NegotiationFailed, got {other:?}"),
        }
        // Access is requested only after the media check.
        assert_eq!(host.access_requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_triggers_ignored_while_configured() {
        let (config, host) = wire(FakeHostOptions::default(), 0);
        let mut controller = EmeController::new(config);

        controller.on_media_attached(Arc::clone(&host.sink) as _).await;
        controller.on_manifest_parsed(contexts()).await;
        assert_eq!(controller.state(), NegotiationState::Configured);

        // A second trigger while configured starts nothing.
        controller.on_manifest_parsed(contexts()).await;
        controller
            .on_encrypted(EncryptedSignal {
                kind: InitDataKind::Cenc,
                data: Bytes::from_static(b"pssh"),
            })
            .await;

        assert_eq!(host.access_requests.load(Ordering::SeqCst), 1);
        assert_eq!(controller.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_failure_resets_flags_and_next_trigger_retries() {
        let (config, host) = wire(FakeHostOptions::default(), 1);
        let mut controller = EmeController::new(config);

        controller.on_media_attached(Arc::clone(&host.sink) as _).await;
        controller.on_manifest_parsed(contexts()).await;

        assert_eq!(controller.state(), NegotiationState::Idle);
        assert_eq!(controller.session_count().await, 0);

        // The denial is spent; a fresh trigger negotiates from scratch.
        controller.on_manifest_parsed(contexts()).await;

        assert_eq!(controller.state(), NegotiationState::Configured);
        assert_eq!(host.access_requests.load(Ordering::SeqCst), 2);
        assert_eq!(host.deny_first.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_detach_with_empty_registry_succeeds() {
        let (config, host) = wire(FakeHostOptions::default(), 0);
        let mut controller = EmeController::new(config);

        controller.on_media_attached(Arc::clone(&host.sink) as _).await;
        controller.on_media_detached().await;

        assert_eq!(controller.state(), NegotiationState::Idle);
        assert_eq!(controller.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_detach_closes_tracked_sessions() {
        let (config, host) = wire(FakeHostOptions::default(), 0);
        let mut controller = EmeController::new(config);

        controller.on_media_attached(Arc::clone(&host.sink) as _).await;
        controller.on_manifest_parsed(contexts()).await;
        assert_eq!(controller.session_count().await, 2);

        controller.on_media_detached().await;

        assert_eq!(controller.session_count().await, 0);
        let keys = host.access.created_media_keys().unwrap();
        assert!(keys.sessions().iter().all(|s| s.is_closed()));
        assert_eq!(controller.state(), NegotiationState::Idle);
    }
}
