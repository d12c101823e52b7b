#![forbid(unsafe_code)]

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{context::TrackKind, error::EmeError};

/// Lifecycle notifications emitted by the negotiation controller.
#[derive(Clone, Debug)]
pub enum EmeEvent {
    NegotiationStarted {
        contexts: usize,
    },
    SessionCreated {
        kind: TrackKind,
        codec: String,
    },
    NegotiationCompleted {
        sessions: usize,
    },
    NegotiationFailed {
        error: Arc<EmeError>,
    },
    SessionsClosed {
        count: usize,
    },
}

#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<EmeEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn with_sender(tx: broadcast::Sender<EmeEvent>) -> Self {
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EmeEvent> {
        self.tx.subscribe()
    }

    pub fn emit_negotiation_started(&self, contexts: usize) {
        let _ = self.tx.send(EmeEvent::NegotiationStarted { contexts });
    }

    pub fn emit_session_created(&self, kind: TrackKind, codec: &str) {
        let _ = self.tx.send(EmeEvent::SessionCreated {
            kind,
            codec: codec.to_string(),
        });
    }

    pub fn emit_negotiation_completed(&self, sessions: usize) {
        let _ = self.tx.send(EmeEvent::NegotiationCompleted { sessions });
    }

    pub fn emit_negotiation_failed(&self, error: Arc<EmeError>) {
        let _ = self.tx.send(EmeEvent::NegotiationFailed { error });
    }

    pub fn emit_sessions_closed(&self, count: usize) {
        let _ = self.tx.send(EmeEvent::SessionsClosed { count });
    }
}
