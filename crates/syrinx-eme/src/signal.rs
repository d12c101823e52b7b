#![forbid(unsafe_code)]

//! Inbound playback signals the negotiation controller consumes.
//!
//! No global event bus is assumed: the host environment (or a forwarding
//! task) pushes these into the controller's signal channel.

use std::{fmt, sync::Arc};

use syrinx_media::{EncryptedSignal, MediaSink};

use crate::context::EncryptionContext;

pub enum PlaybackSignal {
    /// A media sink became available for key attachment.
    MediaAttached { sink: Arc<dyn MediaSink> },
    /// The media sink is going away; every tracked session is closed first.
    MediaDetached,
    /// Manifest parsing produced the encryption contexts for this playback.
    ManifestParsed { contexts: Vec<EncryptionContext> },
    /// The host detected encrypted content.
    Encrypted(EncryptedSignal),
}

impl fmt::Debug for PlaybackSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MediaAttached { .. } => f.debug_struct("MediaAttached").finish_non_exhaustive(),
            Self::MediaDetached => f.write_str("MediaDetached"),
            Self::ManifestParsed { contexts } => f
                .debug_struct("ManifestParsed")
                .field("contexts", &contexts.len())
                .finish(),
            Self::Encrypted(signal) => f.debug_tuple("Encrypted").field(signal).finish(),
        }
    }
}
