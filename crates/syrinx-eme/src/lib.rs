#![forbid(unsafe_code)]

//! Decryption-capability negotiation for encrypted media playback.
//!
//! Detects that content is encrypted, acquires a key system, provisions
//! media keys onto the sink, creates one decryption session per encryption
//! context, exchanges license requests with an injected license source, and
//! applies the licenses that unlock playback.
//!
//! The host capability triad (key-system access, media keys, key sessions)
//! lives behind the traits in `syrinx-media`; this crate owns the
//! sequencing, shared state, and failure handling around it. See
//! [`EmeController`] for the entry point.

pub mod access;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod events;
pub mod license;
pub mod provision;
pub mod registry;
pub mod session;
pub mod signal;

pub use config::{EmeConfig, GetInitDataFn, GetLicenseFn, RequestKeySystemAccessFn};
pub use context::{EncryptionContext, TrackKind};
pub use controller::{EmeController, NegotiationState};
pub use error::{EmeError, EmeResult};
pub use events::EmeEvent;
pub use registry::{SessionContext, SessionRegistry};
pub use signal::PlaybackSignal;
